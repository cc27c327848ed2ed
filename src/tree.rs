//! Hierarchical view of the engine's resources.
//!
//! [`TreeProvider`] answers "what are the children of this node" for a tree
//! rooted at a fixed set of categories.  Answers are cached per parent until
//! the next debounced [`TreeProvider::refresh`], which clears the cache and
//! the compose de-duplication ledger together and then notifies subscribers.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use log::{debug, warn};
use tokio::sync::broadcast;

use crate::compose::{self, ComposeGroup, Ledger, LedgerScope};
use crate::query;
use crate::refresh::{Debouncer, RefreshState};
use crate::report::Reporter;
use crate::runtime::{Engine, EngineError, Podman};
use crate::store::ComposePathStore;
use crate::types::{ContainerRecord, PodContainerRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Containers,
    Pods,
    Images,
    Volumes,
    Networks,
    Overview,
    Container,
    ComposeGroup,
    ComposeContainer,
    Pod,
    Image,
    ImageTag,
    Volume,
    Network,
    OverviewLine,
}

impl NodeKind {
    /// Context name, also the first half of the cache key.
    pub fn context(self) -> &'static str {
        match self {
            NodeKind::Containers => "containers",
            NodeKind::Pods => "pods",
            NodeKind::Images => "images",
            NodeKind::Volumes => "volumes",
            NodeKind::Networks => "networks",
            NodeKind::Overview => "overview",
            NodeKind::Container => "container",
            NodeKind::ComposeGroup => "compose-group",
            NodeKind::ComposeContainer => "compose-container",
            NodeKind::Pod => "pod",
            NodeKind::Image => "image",
            NodeKind::ImageTag => "image-tag",
            NodeKind::Volume => "volume",
            NodeKind::Network => "network",
            NodeKind::OverviewLine => "overview-item",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeNode {
    pub kind: NodeKind,
    pub id: String,
    pub label: String,
    pub status: Option<String>,
    pub running: Option<bool>,
    pub detail: Option<String>,
    pub compose_project: Option<String>,
    pub compose_file: Option<String>,
    pub in_use: Option<bool>,
    /// Name to pass to the engine when it differs from `id`.
    pub resource_name: Option<String>,
    /// Children known at construction time (compose groups, multi-tag images).
    pub children: Vec<TreeNode>,
}

impl TreeNode {
    pub fn new(kind: NodeKind, id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
            label: label.into(),
            status: None,
            running: None,
            detail: None,
            compose_project: None,
            compose_file: None,
            in_use: None,
            resource_name: None,
            children: Vec::new(),
        }
    }

    fn category(kind: NodeKind, label: &str) -> Self {
        Self::new(kind, kind.context(), label)
    }

    pub fn cache_key(&self) -> String {
        format!("{}-{}", self.kind.context(), self.id)
    }

    pub fn is_expandable(&self) -> bool {
        matches!(
            self.kind,
            NodeKind::Containers
                | NodeKind::Pods
                | NodeKind::Images
                | NodeKind::Volumes
                | NodeKind::Networks
                | NodeKind::Overview
                | NodeKind::Pod
                | NodeKind::ComposeGroup
        ) || !self.children.is_empty()
    }

    fn container(record: &ContainerRecord, kind: NodeKind) -> Self {
        let mut node = Self::new(kind, &record.id, format!("{} ({})", record.name, record.id));
        node.status = Some(record.status.clone());
        node.running = Some(record.is_running);
        if kind == NodeKind::ComposeContainer {
            node.compose_project = Some(record.compose_project.clone());
        }
        node
    }

    fn pod_container(record: &PodContainerRecord) -> Self {
        let mut node = Self::new(
            NodeKind::Container,
            &record.id,
            format!("{} ({})", record.name, record.id),
        );
        node.status = Some(record.status.clone());
        node.running = Some(record.is_running);
        node.detail = Some(format!("Created: {}", record.created));
        node
    }
}

/// The fixed top level of the tree.
pub fn root_items() -> Vec<TreeNode> {
    vec![
        TreeNode::category(NodeKind::Containers, "Containers"),
        TreeNode::category(NodeKind::Pods, "Pods"),
        TreeNode::category(NodeKind::Images, "Images"),
        TreeNode::category(NodeKind::Volumes, "Volumes"),
        TreeNode::category(NodeKind::Networks, "Networks"),
        TreeNode::category(NodeKind::Overview, "Overview"),
    ]
}

/// Cache and ledger, always cleared together.
#[derive(Default)]
struct TreeState {
    /// Bumped by every invalidation, so fetches that straddle one can tell.
    generation: u64,
    cache: HashMap<String, Arc<Vec<TreeNode>>>,
    ledger: Ledger,
}

impl TreeState {
    fn invalidate(&mut self) {
        if !self.ledger.is_empty() {
            debug!("Forgetting {} emitted compose containers", self.ledger.len());
        }
        self.generation += 1;
        self.cache.clear();
        self.ledger.clear();
    }
}

enum Fetched {
    Nodes(Vec<TreeNode>),
    Containers(Vec<ContainerRecord>),
}

#[derive(Debug, Clone, Copy)]
pub struct ProviderSettings {
    pub debounce: Duration,
    pub ledger_scope: LedgerScope,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(300),
            ledger_scope: LedgerScope::Refresh,
        }
    }
}

pub struct TreeProvider {
    engine: Arc<dyn Engine>,
    podman: Podman,
    reporter: Arc<dyn Reporter>,
    store: Arc<dyn ComposePathStore>,
    ledger_scope: LedgerScope,
    state: Arc<Mutex<TreeState>>,
    debouncer: Debouncer,
    changes: broadcast::Sender<()>,
}

impl TreeProvider {
    pub fn new(
        engine: Arc<dyn Engine>,
        podman: Podman,
        reporter: Arc<dyn Reporter>,
        store: Arc<dyn ComposePathStore>,
        settings: ProviderSettings,
    ) -> Self {
        let (changes, _) = broadcast::channel(16);
        Self {
            engine,
            podman,
            reporter,
            store,
            ledger_scope: settings.ledger_scope,
            state: Arc::new(Mutex::new(TreeState::default())),
            debouncer: Debouncer::new(settings.debounce),
            changes,
        }
    }

    pub fn root_items(&self) -> Vec<TreeNode> {
        root_items()
    }

    /// Fires once per completed refresh, after the cache has been cleared.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.changes.subscribe()
    }

    /// Schedule a debounced invalidation of everything cached.
    pub fn refresh(&self) {
        let state = Arc::clone(&self.state);
        let changes = self.changes.clone();
        self.debouncer.schedule(move || {
            lock(&state).invalidate();
            debug!("Tree cache invalidated");
            // No subscribers is fine.
            let _ = changes.send(());
        });
    }

    pub fn refresh_state(&self) -> RefreshState {
        self.debouncer.state()
    }

    /// Children of `parent`, from cache when possible.
    pub async fn children(&self, parent: &TreeNode) -> Arc<Vec<TreeNode>> {
        let key = parent.cache_key();
        let generation = {
            let state = lock(&self.state);
            if let Some(hit) = state.cache.get(&key) {
                return Arc::clone(hit);
            }
            state.generation
        };

        let fetched = self.fetch(parent).await;

        let mut discovered = Vec::new();
        let nodes = {
            let mut state = lock(&self.state);
            if state.generation != generation {
                debug!("{} was invalidated while fetching; not caching", key);
                let mut scratch = Ledger::default();
                Arc::new(self.finish(fetched, &mut scratch, &mut discovered))
            } else if let Some(hit) = state.cache.get(&key) {
                Arc::clone(hit)
            } else {
                if self.ledger_scope == LedgerScope::Pass {
                    state.ledger.clear();
                }
                let nodes = Arc::new(self.finish(fetched, &mut state.ledger, &mut discovered));
                state.cache.insert(key, Arc::clone(&nodes));
                nodes
            }
        };
        self.remember(&discovered);
        nodes
    }

    /// Current compose groups, as shown under the containers category.
    pub async fn compose_groups(&self) -> Vec<TreeNode> {
        let containers = TreeNode::category(NodeKind::Containers, "Containers");
        self.children(&containers)
            .await
            .iter()
            .filter(|node| node.kind == NodeKind::ComposeGroup)
            .cloned()
            .collect()
    }

    async fn fetch(&self, parent: &TreeNode) -> Fetched {
        let engine = self.engine.as_ref();
        let podman = &self.podman;
        match parent.kind {
            NodeKind::Containers => match query::containers(engine, podman).await {
                Ok(records) => Fetched::Containers(records),
                Err(e) => Fetched::Nodes(self.failed("Failed to get containers", &e)),
            },
            NodeKind::Pods => Fetched::Nodes(match query::pods(engine, podman).await {
                Ok(pods) => pods
                    .iter()
                    .map(|pod| {
                        let mut node = TreeNode::new(NodeKind::Pod, &pod.id, &pod.name);
                        node.status = Some(pod.status.clone());
                        node.running = Some(pod.is_running());
                        node.resource_name = Some(pod.name.clone());
                        node
                    })
                    .collect(),
                Err(e) => self.failed("Failed to get pods", &e),
            }),
            NodeKind::Pod => {
                Fetched::Nodes(match query::pod_containers(engine, podman, &parent.id).await {
                    Ok(records) => records.iter().map(TreeNode::pod_container).collect(),
                    Err(e) => {
                        let context = format!("Failed to get containers for pod {}", parent.label);
                        self.failed(&context, &e)
                    }
                })
            }
            NodeKind::Images => Fetched::Nodes(self.images().await),
            NodeKind::Volumes => Fetched::Nodes(match query::volumes(engine, podman).await {
                Ok(volumes) => volumes
                    .iter()
                    .map(|v| {
                        let mut node = TreeNode::new(
                            NodeKind::Volume,
                            format!("volume-{}", v.name),
                            format!("{} ({})", v.name, v.driver),
                        );
                        node.resource_name = Some(v.name.clone());
                        node
                    })
                    .collect(),
                Err(e) => self.failed("Failed to get volumes", &e),
            }),
            NodeKind::Networks => Fetched::Nodes(match query::networks(engine, podman).await {
                Ok(networks) => networks
                    .iter()
                    .map(|n| {
                        let mut node = TreeNode::new(
                            NodeKind::Network,
                            format!("network-{}", n.name),
                            format!("{} ({})", n.name, n.driver),
                        );
                        node.resource_name = Some(n.name.clone());
                        node
                    })
                    .collect(),
                Err(e) => self.failed("Failed to get networks", &e),
            }),
            NodeKind::Overview => Fetched::Nodes(match query::disk_usage(engine, podman).await {
                Ok(lines) => lines
                    .into_iter()
                    .enumerate()
                    .map(|(i, line)| {
                        TreeNode::new(NodeKind::OverviewLine, format!("overview-{i}"), line)
                    })
                    .collect(),
                Err(e) => self.failed("Failed to fetch system overview", &e),
            }),
            _ => Fetched::Nodes(parent.children.clone()),
        }
    }

    async fn images(&self) -> Vec<TreeNode> {
        let engine = self.engine.as_ref();
        let images = match query::images(engine, &self.podman).await {
            Ok(images) => images,
            Err(e) => return self.failed("Failed to get images", &e),
        };
        let used = match query::container_image_ids(engine, &self.podman).await {
            Ok(ids) => ids,
            Err(e) => {
                warn!("Could not tell which images are in use: {}", e);
                Vec::new()
            }
        };

        let mut order: Vec<String> = Vec::new();
        let mut tags: HashMap<String, Vec<String>> = HashMap::new();
        for image in images.iter().filter(|image| !image.is_dangling()) {
            tags.entry(image.id.clone())
                .or_insert_with(|| {
                    order.push(image.id.clone());
                    Vec::new()
                })
                .push(image.reference());
        }

        order
            .into_iter()
            .map(|id| {
                let names = tags.remove(&id).unwrap_or_default();
                let in_use = used
                    .iter()
                    .any(|u| !u.is_empty() && (u.starts_with(&id) || id.starts_with(u.as_str())));
                let label = match names.as_slice() {
                    [single] => format!("{single} ({id})"),
                    _ => format!("{id} ({} tags)", names.len()),
                };
                let mut node = TreeNode::new(NodeKind::Image, &id, label);
                node.in_use = Some(in_use);
                node.resource_name = Some(id.clone());
                if names.len() > 1 {
                    node.children = names
                        .iter()
                        .enumerate()
                        .map(|(i, name)| {
                            let mut tag =
                                TreeNode::new(NodeKind::ImageTag, format!("{id}-tag-{i}"), name);
                            tag.in_use = Some(in_use);
                            tag.resource_name = Some(name.clone());
                            tag
                        })
                        .collect();
                }
                node
            })
            .collect()
    }

    /// Turn a fetch into nodes.  Container listings are grouped here, with
    /// the ledger held, so concurrent expansions cannot interleave.  Compose
    /// files seen on the way are pushed to `discovered` for [`Self::remember`].
    fn finish(
        &self,
        fetched: Fetched,
        ledger: &mut Ledger,
        discovered: &mut Vec<(String, String)>,
    ) -> Vec<TreeNode> {
        let records = match fetched {
            Fetched::Nodes(nodes) => return nodes,
            Fetched::Containers(records) => records,
        };

        let grouping = compose::group(records, ledger);
        let mut nodes: Vec<TreeNode> = grouping
            .standalone
            .iter()
            .map(|record| TreeNode::container(record, NodeKind::Container))
            .collect();
        nodes.extend(
            grouping
                .groups
                .into_iter()
                .map(|group| self.group_node(group, discovered)),
        );
        nodes
    }

    fn group_node(
        &self,
        group: ComposeGroup,
        discovered: &mut Vec<(String, String)>,
    ) -> TreeNode {
        let compose_file = if group.compose_file.is_empty() {
            self.store.get(&group.project)
        } else {
            discovered.push((group.project.clone(), group.compose_file.clone()));
            Some(group.compose_file.clone())
        };

        let mut node = TreeNode::new(NodeKind::ComposeGroup, group.node_id(), &group.project);
        node.compose_project = Some(group.project.clone());
        node.compose_file = compose_file;
        node.children = group
            .containers
            .iter()
            .map(|record| TreeNode::container(record, NodeKind::ComposeContainer))
            .collect();
        node
    }

    /// Save compose files found by grouping.  Called with the tree unlocked,
    /// since a file-backed store writes to disk.
    fn remember(&self, discovered: &[(String, String)]) {
        for (project, file) in discovered {
            if let Err(e) = self.store.put(project, file) {
                warn!("Could not remember compose file for {}: {}", project, e);
            }
        }
    }

    fn failed(&self, context: &str, err: &EngineError) -> Vec<TreeNode> {
        warn!("{}: {}", context, err);
        self.reporter.engine_error(context, err);
        Vec::new()
    }
}

/// Directory a compose command should run in.
pub fn compose_dir(compose_file: &str) -> Option<&Path> {
    Path::new(compose_file)
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
}

fn lock(state: &Mutex<TreeState>) -> MutexGuard<'_, TreeState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{CONTAINER_FORMAT, DRIVER_FORMAT, IMAGE_FORMAT, IMAGE_ID_FORMAT};
    use crate::report::testing::RecordingReporter;
    use crate::runtime::testing::ScriptedEngine;
    use crate::runtime::{EngineCommand, EngineOutput};
    use crate::store::{MemoryStore, StoreError};
    use async_trait::async_trait;
    use std::collections::BTreeMap;
    use std::sync::{OnceLock, Weak};
    use tokio::time::sleep;

    const MYAPP_LABELS: &str = "com.docker.compose.project=myapp,com.docker.compose.project.working_dir=/srv/app,com.docker.compose.project.config_files=docker-compose.yml";

    fn containers_key() -> String {
        format!("container ls -a --format {CONTAINER_FORMAT}")
    }

    struct Harness {
        engine: Arc<ScriptedEngine>,
        reporter: Arc<RecordingReporter>,
        store: Arc<MemoryStore>,
        provider: Arc<TreeProvider>,
    }

    fn harness() -> Harness {
        harness_with(ProviderSettings::default())
    }

    fn harness_with(settings: ProviderSettings) -> Harness {
        let engine = Arc::new(ScriptedEngine::new());
        let reporter = Arc::new(RecordingReporter::default());
        let store = Arc::new(MemoryStore::new());
        let provider = Arc::new(TreeProvider::new(
            engine.clone(),
            Podman::default(),
            reporter.clone(),
            store.clone(),
            settings,
        ));
        Harness {
            engine,
            reporter,
            store,
            provider,
        }
    }

    /// Answers like [`ScriptedEngine`], one second late.
    #[derive(Default)]
    struct SlowEngine {
        inner: ScriptedEngine,
    }

    #[async_trait]
    impl Engine for SlowEngine {
        async fn run(&self, command: &EngineCommand) -> Result<EngineOutput, EngineError> {
            sleep(Duration::from_secs(1)).await;
            self.inner.run(command).await
        }
    }

    fn slow_provider(engine: Arc<SlowEngine>) -> Arc<TreeProvider> {
        Arc::new(TreeProvider::new(
            engine,
            Podman::default(),
            Arc::new(RecordingReporter::default()),
            Arc::new(MemoryStore::new()),
            ProviderSettings::default(),
        ))
    }

    /// Records how many cache entries were visible each time `put` ran,
    /// or `None` when the tree was locked at that moment.
    #[derive(Default)]
    struct WatchingStore {
        provider: OnceLock<Weak<TreeProvider>>,
        seen: Mutex<Vec<Option<usize>>>,
    }

    impl ComposePathStore for WatchingStore {
        fn get(&self, _project: &str) -> Option<String> {
            None
        }

        fn put(&self, _project: &str, _path: &str) -> Result<(), StoreError> {
            if let Some(provider) = self.provider.get().and_then(Weak::upgrade) {
                let cached = provider.state.try_lock().ok().map(|state| state.cache.len());
                self.seen.lock().unwrap().push(cached);
            }
            Ok(())
        }

        fn all(&self) -> BTreeMap<String, String> {
            BTreeMap::new()
        }
    }

    fn category(kind: NodeKind) -> TreeNode {
        root_items()
            .into_iter()
            .find(|node| node.kind == kind)
            .unwrap()
    }

    #[test]
    fn root_categories_in_order() {
        let labels: Vec<_> = root_items().into_iter().map(|n| n.label).collect();
        assert_eq!(
            labels,
            vec!["Containers", "Pods", "Images", "Volumes", "Networks", "Overview"]
        );
    }

    #[tokio::test]
    async fn compose_and_plain_containers() {
        let h = harness();
        h.engine.respond(
            &containers_key(),
            &format!("c1|web|Up 3 minutes|{MYAPP_LABELS}\nc2|db|Exited (0) 2 hours ago|\n"),
        );

        let nodes = h.provider.children(&category(NodeKind::Containers)).await;
        assert_eq!(nodes.len(), 2);

        assert_eq!(nodes[0].kind, NodeKind::Container);
        assert_eq!(nodes[0].id, "c2");
        assert_eq!(nodes[0].running, Some(false));

        let group = &nodes[1];
        assert_eq!(group.kind, NodeKind::ComposeGroup);
        assert_eq!(group.label, "myapp");
        assert_eq!(group.id, "compose-group-myapp");
        assert_eq!(
            group.compose_file.as_deref(),
            Some("/srv/app/docker-compose.yml")
        );
        assert_eq!(group.children.len(), 1);
        assert_eq!(group.children[0].id, "c1");
        assert_eq!(group.children[0].label, "web (c1)");
        assert_eq!(group.children[0].running, Some(true));

        let expanded = h.provider.children(group).await;
        assert_eq!(*expanded, group.children);

        assert_eq!(
            h.store.get("myapp").as_deref(),
            Some("/srv/app/docker-compose.yml")
        );
    }

    #[tokio::test]
    async fn overlapping_rows_yield_one_child() {
        let h = harness();
        h.engine.respond(
            &containers_key(),
            &format!("c1|web|Up|{MYAPP_LABELS}\nc1|web|Up|{MYAPP_LABELS}\n"),
        );
        let nodes = h.provider.children(&category(NodeKind::Containers)).await;
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].children.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn fetch_straddling_a_refresh_is_not_cached() {
        let engine = Arc::new(SlowEngine::default());
        engine
            .inner
            .respond(&containers_key(), &format!("c1|web|Up|{MYAPP_LABELS}\n"));
        let provider = slow_provider(engine.clone());
        let containers = category(NodeKind::Containers);

        let pending = {
            let provider = Arc::clone(&provider);
            let containers = containers.clone();
            tokio::spawn(async move { provider.children(&containers).await })
        };
        sleep(Duration::from_millis(10)).await;
        provider.refresh();
        sleep(Duration::from_millis(400)).await;
        assert_eq!(provider.refresh_state(), RefreshState::Idle);

        let stale = pending.await.unwrap();
        assert_eq!(stale.len(), 1);
        assert_eq!(stale[0].children.len(), 1);
        {
            let state = lock(&provider.state);
            assert!(state.cache.is_empty());
            assert!(state.ledger.is_empty());
        }

        let fresh = provider.children(&containers).await;
        assert_eq!(fresh[0].children.len(), 1);
        assert_eq!(engine.inner.count(&containers_key()), 2);
        assert_eq!(lock(&provider.state).cache.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_expansions_share_one_entry() {
        let engine = Arc::new(SlowEngine::default());
        engine
            .inner
            .respond(&containers_key(), &format!("c1|web|Up|{MYAPP_LABELS}\n"));
        let provider = slow_provider(engine.clone());
        let containers = category(NodeKind::Containers);

        let (first, second) = tokio::join!(
            provider.children(&containers),
            provider.children(&containers)
        );

        assert_eq!(engine.inner.count(&containers_key()), 2);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first[0].children.len(), 1);
        let state = lock(&provider.state);
        assert_eq!(state.cache.len(), 1);
        assert_eq!(state.ledger.len(), 1);
    }

    #[tokio::test]
    async fn pass_scope_resets_ledger_before_grouping() {
        let h = harness_with(ProviderSettings {
            ledger_scope: LedgerScope::Pass,
            ..ProviderSettings::default()
        });
        h.engine
            .respond(&containers_key(), &format!("c2|api|Up|{MYAPP_LABELS}\n"));
        {
            let mut state = lock(&h.provider.state);
            state.ledger.register("myapp", "c2");
            state.ledger.register("other", "x9");
        }

        let nodes = h.provider.children(&category(NodeKind::Containers)).await;
        assert_eq!(nodes[0].children.len(), 1);

        let state = lock(&h.provider.state);
        assert_eq!(state.ledger.len(), 1);
        assert!(state.ledger.contains("myapp", "c2"));
        assert!(!state.ledger.contains("other", "x9"));
    }

    #[tokio::test]
    async fn refresh_scope_keeps_earlier_entries() {
        let h = harness();
        h.engine
            .respond(&containers_key(), &format!("c2|api|Up|{MYAPP_LABELS}\n"));
        lock(&h.provider.state).ledger.register("myapp", "c2");

        let nodes = h.provider.children(&category(NodeKind::Containers)).await;
        assert!(nodes[0].children.is_empty());
    }

    #[tokio::test]
    async fn compose_files_are_saved_outside_the_lock() {
        let engine = Arc::new(ScriptedEngine::new());
        engine.respond(&containers_key(), &format!("c1|web|Up|{MYAPP_LABELS}\n"));
        let store = Arc::new(WatchingStore::default());
        let provider = Arc::new(TreeProvider::new(
            engine,
            Podman::default(),
            Arc::new(RecordingReporter::default()),
            store.clone(),
            ProviderSettings::default(),
        ));
        let _ = store.provider.set(Arc::downgrade(&provider));

        provider.children(&category(NodeKind::Containers)).await;

        assert_eq!(*store.seen.lock().unwrap(), vec![Some(1)]);
    }

    #[tokio::test]
    async fn group_without_labels_file_uses_store() {
        let h = harness();
        h.store.put("shop", "/opt/shop/compose.yml").unwrap();
        h.engine.respond(
            &containers_key(),
            "s1|shop-web|Up|com.docker.compose.project=shop\n",
        );
        let groups = h.provider.compose_groups().await;
        assert_eq!(groups.len(), 1);
        assert_eq!(
            groups[0].compose_file.as_deref(),
            Some("/opt/shop/compose.yml")
        );
    }

    #[tokio::test]
    async fn cached_until_refresh_fires() {
        let h = harness();
        let containers = category(NodeKind::Containers);
        h.engine.respond(&containers_key(), "c1|one|Up|\n");

        let first = h.provider.children(&containers).await;
        let again = h.provider.children(&containers).await;
        assert!(Arc::ptr_eq(&first, &again));
        assert_eq!(h.engine.count(&containers_key()), 1);

        h.engine.respond(&containers_key(), "c1|one|Up|\nc2|two|Up|\n");
        let mut changes = h.provider.subscribe();
        h.provider.refresh();
        assert_eq!(h.provider.refresh_state(), RefreshState::PendingRefresh);
        changes.recv().await.unwrap();

        let fresh = h.provider.children(&containers).await;
        assert!(!Arc::ptr_eq(&first, &fresh));
        assert_eq!(fresh.len(), 2);
        assert_eq!(h.engine.count(&containers_key()), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn refresh_burst_notifies_once() {
        let h = harness();
        let mut changes = h.provider.subscribe();

        for _ in 0..5 {
            h.provider.refresh();
            sleep(Duration::from_millis(50)).await;
        }
        sleep(Duration::from_millis(400)).await;

        assert!(changes.try_recv().is_ok());
        assert!(changes.try_recv().is_err());
        assert_eq!(h.provider.refresh_state(), RefreshState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn ledger_is_cleared_with_the_cache() {
        let h = harness();
        let containers = category(NodeKind::Containers);
        h.engine
            .respond(&containers_key(), &format!("c1|web|Up|{MYAPP_LABELS}\n"));

        let before = h.provider.children(&containers).await;
        h.provider.refresh();
        sleep(Duration::from_millis(301)).await;
        let after = h.provider.children(&containers).await;

        assert_eq!(before, after);
        assert_eq!(after[0].children.len(), 1);
    }

    #[tokio::test]
    async fn failing_category_does_not_affect_others() {
        let h = harness();
        h.engine
            .fail(&format!("volume ls --format {DRIVER_FORMAT}"), "no storage");
        h.engine.respond(
            &format!("network ls --format {DRIVER_FORMAT}"),
            "podman|bridge\n",
        );

        let volumes = h.provider.children(&category(NodeKind::Volumes)).await;
        let networks = h.provider.children(&category(NodeKind::Networks)).await;

        assert!(volumes.is_empty());
        assert_eq!(networks.len(), 1);
        assert_eq!(networks[0].label, "podman (bridge)");
        assert_eq!(networks[0].resource_name.as_deref(), Some("podman"));

        let errors = h.reporter.errors();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("Failed to get volumes"));
        assert!(errors[0].ends_with("[podman volume ls]"));
    }

    #[tokio::test]
    async fn images_grouped_by_id() {
        let h = harness();
        h.engine.respond(
            &format!("image ls --format {IMAGE_FORMAT}"),
            "aaa111|docker.io/library/nginx|latest\naaa111|docker.io/library/nginx|1.25\nbbb222|<none>|<none>\nccc333|quay.io/app|v1\n",
        );
        h.engine.respond(
            &format!("container ls -a --format {IMAGE_ID_FORMAT}"),
            "ccc333ffffffff\n",
        );

        let images = h.provider.children(&category(NodeKind::Images)).await;
        assert_eq!(images.len(), 2);
        assert_eq!(images[0].label, "aaa111 (2 tags)");
        assert_eq!(images[0].in_use, Some(false));
        assert!(images[0].is_expandable());
        assert_eq!(images[0].children[1].label, "docker.io/library/nginx:1.25");
        assert_eq!(images[1].label, "quay.io/app:v1 (ccc333)");
        assert_eq!(images[1].in_use, Some(true));
        assert!(!images[1].is_expandable());
    }

    #[tokio::test]
    async fn pod_children_use_the_pod_filter() {
        let h = harness();
        h.engine.respond(
            "pod ls --format {{.ID}}|{{.Name}}|{{.Status}}",
            "p1|web|Running\n",
        );
        h.engine.respond(
            "ps -a --filter pod=p1 --format {{.ID}}|{{.Names}}|{{.Status}}|{{.CreatedAt}}",
            "k1|p1-infra|Up 5 minutes|2024-05-01 10:00\n",
        );

        let pods = h.provider.children(&category(NodeKind::Pods)).await;
        assert_eq!(pods[0].running, Some(true));
        let containers = h.provider.children(&pods[0]).await;
        assert_eq!(containers[0].label, "p1-infra (k1)");
        assert_eq!(containers[0].detail.as_deref(), Some("Created: 2024-05-01 10:00"));
    }

    #[test]
    fn compose_dir_of_relative_file() {
        assert_eq!(compose_dir("compose.yml"), None);
        assert_eq!(
            compose_dir("/srv/app/compose.yml"),
            Some(Path::new("/srv/app"))
        );
    }
}
