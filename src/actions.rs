//! Lifecycle commands: start/stop/remove resources and drive compose projects.
//!
//! Every action reports progress through the injected [`Reporter`] and asks
//! the tree for a refresh once the engine accepts the command.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{debug, info, warn};
use thiserror::Error;

use crate::config::{ComposeCommandStyle, Config, DEFAULT_COMPOSE_PATH};
use crate::discover;
use crate::report::{with_status, Reporter};
use crate::runtime::{Engine, EngineCommand, EngineError, EngineOutput, Podman};
use crate::store::{ComposePathStore, StoreError};
use crate::tree::{compose_dir, TreeProvider};

#[derive(Debug, Error)]
pub enum ActionError {
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error("no compose file known for project {project}")]
    ComposeFileNotFound { project: String },
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Start,
    Stop,
    Restart,
    Remove,
}

impl Lifecycle {
    fn verb(self) -> &'static str {
        match self {
            Lifecycle::Start => "start",
            Lifecycle::Stop => "stop",
            Lifecycle::Restart => "restart",
            Lifecycle::Remove => "rm",
        }
    }

    fn describe(self) -> &'static str {
        match self {
            Lifecycle::Start => "Starting",
            Lifecycle::Stop => "Stopping",
            Lifecycle::Restart => "Restarting",
            Lifecycle::Remove => "Deleting",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComposeVerb {
    Up,
    Down,
    Start,
    Stop,
    Restart,
}

impl ComposeVerb {
    fn args(self) -> &'static [&'static str] {
        match self {
            ComposeVerb::Up => &["up", "-d"],
            ComposeVerb::Down => &["down"],
            ComposeVerb::Start => &["start"],
            ComposeVerb::Stop => &["stop"],
            ComposeVerb::Restart => &["restart"],
        }
    }

    fn describe(self) -> &'static str {
        match self {
            ComposeVerb::Up => "Running compose up",
            ComposeVerb::Down => "Running compose down",
            ComposeVerb::Start => "Starting compose services",
            ComposeVerb::Stop => "Stopping compose services",
            ComposeVerb::Restart => "Restarting compose services",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prune {
    DanglingImages,
    UnusedImages,
    BuilderCache,
}

impl Prune {
    fn args(self) -> &'static [&'static str] {
        match self {
            Prune::DanglingImages => &["image", "prune", "-f"],
            Prune::UnusedImages => &["image", "prune", "-a", "-f"],
            Prune::BuilderCache => &["builder", "prune", "-a", "-f"],
        }
    }

    fn describe(self) -> &'static str {
        match self {
            Prune::DanglingImages => "Remove all dangling images",
            Prune::UnusedImages => "Remove all unused images",
            Prune::BuilderCache => "Remove builder cache",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MachineAction {
    Start,
    Stop,
}

impl MachineAction {
    fn verb(self) -> &'static str {
        match self {
            MachineAction::Start => "start",
            MachineAction::Stop => "stop",
        }
    }

    fn describe(self) -> &'static str {
        match self {
            MachineAction::Start => "Starting",
            MachineAction::Stop => "Stopping",
        }
    }
}

/// How compose commands are spelled, and where to look for compose files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposeSettings {
    pub compose_path: String,
    pub style: ComposeCommandStyle,
    /// Directory searched when a project's compose file is otherwise unknown.
    pub search_root: PathBuf,
}

impl From<&Config> for ComposeSettings {
    fn from(cfg: &Config) -> Self {
        Self {
            compose_path: cfg.compose_path.clone(),
            style: cfg.compose_command_style,
            ..Self::default()
        }
    }
}

impl Default for ComposeSettings {
    fn default() -> Self {
        Self {
            compose_path: DEFAULT_COMPOSE_PATH.to_string(),
            style: ComposeCommandStyle::Default,
            search_root: PathBuf::from("."),
        }
    }
}

/// Build the compose invocation for `project` defined in `file`.
pub fn compose_command(
    podman: &Podman,
    settings: &ComposeSettings,
    file: &str,
    project: &str,
    verb: ComposeVerb,
) -> EngineCommand {
    let tail = ["-f", file, "-p", project]
        .into_iter()
        .chain(verb.args().iter().copied());

    let custom = settings.compose_path.trim();
    if !custom.is_empty() && custom != DEFAULT_COMPOSE_PATH {
        let mut words = custom.split_whitespace();
        let program = words.next().unwrap_or(DEFAULT_COMPOSE_PATH);
        return EngineCommand::new(program).args(words).args(tail);
    }

    let remote: &[&str] = if podman.is_remote() { &["--remote"] } else { &[] };
    match settings.style {
        ComposeCommandStyle::PodmanSpaceCompose => EngineCommand::new(podman.program())
            .args(podman.leading_without_remote())
            .args(remote.iter().copied())
            .arg("compose")
            .args(tail),
        ComposeCommandStyle::Default | ComposeCommandStyle::PodmanCompose => {
            EngineCommand::new(format!("{}-compose", podman.program()))
                .args(remote.iter().copied())
                .args(tail)
        }
    }
}

pub struct Actions {
    engine: Arc<dyn Engine>,
    podman: Podman,
    compose: ComposeSettings,
    reporter: Arc<dyn Reporter>,
    store: Arc<dyn ComposePathStore>,
    tree: Arc<TreeProvider>,
}

impl Actions {
    pub fn new(
        engine: Arc<dyn Engine>,
        podman: Podman,
        compose: ComposeSettings,
        reporter: Arc<dyn Reporter>,
        store: Arc<dyn ComposePathStore>,
        tree: Arc<TreeProvider>,
    ) -> Self {
        Self {
            engine,
            podman,
            compose,
            reporter,
            store,
            tree,
        }
    }

    pub async fn container(
        &self,
        action: Lifecycle,
        id: &str,
    ) -> Result<EngineOutput, ActionError> {
        let mut args = vec!["container", action.verb()];
        if action == Lifecycle::Remove {
            args.push("-f");
        }
        args.push(id);
        let operation = format!("{} container {}", action.describe(), id);
        self.run(&operation, self.podman.command(args)).await
    }

    pub async fn pod(&self, action: Lifecycle, id: &str) -> Result<EngineOutput, ActionError> {
        let mut args = vec!["pod", action.verb()];
        if action == Lifecycle::Remove {
            args.push("-f");
        }
        args.push(id);
        let operation = format!("{} pod {}", action.describe(), id);
        self.run(&operation, self.podman.command(args)).await
    }

    /// Create an empty pod, named by the engine when `name` is `None`.
    pub async fn create_pod(&self, name: Option<&str>) -> Result<EngineOutput, ActionError> {
        let mut args = vec!["pod", "create"];
        let operation = match name {
            Some(name) => {
                args.extend(["--name", name]);
                format!("Creating pod {name}")
            }
            None => "Creating pod".to_string(),
        };
        self.run(&operation, self.podman.command(args)).await
    }

    /// Build `dockerfile` into an image tagged `tag`, using the Dockerfile's
    /// directory as the build context.
    pub async fn build_image(
        &self,
        tag: &str,
        dockerfile: &Path,
    ) -> Result<EngineOutput, ActionError> {
        let dockerfile = absolute(dockerfile);
        let context = dockerfile
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        let file = dockerfile.to_string_lossy().into_owned();
        let context = context.to_string_lossy().into_owned();
        let operation = format!("Building image {tag}");
        let command = self
            .podman
            .command(["build", "-t", tag, "-f", file.as_str(), context.as_str()]);
        self.run(&operation, command).await
    }

    pub async fn machine(
        &self,
        action: MachineAction,
        name: &str,
    ) -> Result<EngineOutput, ActionError> {
        let operation = format!("{} Podman machine {}", action.describe(), name);
        self.run(&operation, self.podman.command(["machine", action.verb(), name]))
            .await
    }

    pub async fn remove_image(&self, id: &str) -> Result<EngineOutput, ActionError> {
        let operation = format!("Deleting image {id}");
        self.run(&operation, self.podman.command(["image", "rm", "-f", id]))
            .await
    }

    pub async fn create_volume(&self, name: &str) -> Result<EngineOutput, ActionError> {
        let operation = format!("Creating volume {name}");
        self.run(&operation, self.podman.command(["volume", "create", name]))
            .await
    }

    pub async fn remove_volume(&self, name: &str) -> Result<EngineOutput, ActionError> {
        let operation = format!("Deleting volume {name}");
        self.run(&operation, self.podman.command(["volume", "rm", "-f", name]))
            .await
    }

    pub async fn create_network(&self, name: &str) -> Result<EngineOutput, ActionError> {
        let operation = format!("Creating network {name}");
        self.run(&operation, self.podman.command(["network", "create", name]))
            .await
    }

    pub async fn remove_network(&self, name: &str) -> Result<EngineOutput, ActionError> {
        let operation = format!("Deleting network {name}");
        self.run(&operation, self.podman.command(["network", "rm", "-f", name]))
            .await
    }

    pub async fn prune(&self, what: Prune) -> Result<EngineOutput, ActionError> {
        self.run(
            what.describe(),
            self.podman.command(what.args().iter().copied()),
        )
        .await
    }

    /// Logs of one container; stderr is appended after stdout.
    pub async fn logs(&self, container: &str) -> Result<String, ActionError> {
        let command = self.podman.command(["logs", container]);
        match self.engine.run(&command).await {
            Ok(output) => {
                let mut text = output.stdout;
                text.push_str(&output.stderr);
                Ok(text)
            }
            Err(e) => {
                self.reporter
                    .engine_error(&format!("Failed to fetch logs for {container}"), &e);
                Err(e.into())
            }
        }
    }

    /// Run a compose verb for `project`.
    ///
    /// The file comes from `file` when given, otherwise from the remembered
    /// path (if it still exists), otherwise from the labels of the project's
    /// containers, otherwise from a search below the configured directory.
    /// The resolved file is remembered as an absolute path.
    pub async fn compose(
        &self,
        verb: ComposeVerb,
        project: &str,
        file: Option<&Path>,
    ) -> Result<EngineOutput, ActionError> {
        let file = match self.resolve_compose_file(project, file).await {
            Some(file) => file,
            None => {
                let err = ActionError::ComposeFileNotFound {
                    project: project.to_string(),
                };
                self.reporter.error(&err.to_string(), None);
                return Err(err);
            }
        };
        let file = absolute(&file).to_string_lossy().into_owned();
        self.store.put(project, &file)?;

        let mut command = compose_command(&self.podman, &self.compose, &file, project, verb);
        if let Some(dir) = compose_dir(&file) {
            command = command.current_dir(dir);
        }
        self.run(verb.describe(), command).await
    }

    async fn resolve_compose_file(
        &self,
        project: &str,
        explicit: Option<&Path>,
    ) -> Option<PathBuf> {
        if let Some(file) = explicit {
            return Some(file.to_path_buf());
        }
        if let Some(stored) = self.store.get(project) {
            if Path::new(&stored).exists() {
                return Some(PathBuf::from(stored));
            }
            debug!("Stored compose file {} for {} is gone", stored, project);
        }
        let labelled = self
            .tree
            .compose_groups()
            .await
            .into_iter()
            .find(|group| group.compose_project.as_deref() == Some(project))
            .and_then(|group| group.compose_file)
            .filter(|file| !file.is_empty());
        if let Some(file) = labelled {
            return Some(PathBuf::from(file));
        }

        let root = self.compose.search_root.clone();
        let name = project.to_string();
        match tokio::task::spawn_blocking(move || discover::find_compose_file(&root, &name)).await
        {
            Ok(found) => {
                if let Some(file) = &found {
                    debug!("Found compose file {} for {}", file.display(), project);
                }
                found
            }
            Err(e) => {
                warn!("Compose file search for {} failed: {}", project, e);
                None
            }
        }
    }

    async fn run(
        &self,
        operation: &str,
        command: EngineCommand,
    ) -> Result<EngineOutput, ActionError> {
        let result =
            with_status(self.reporter.as_ref(), operation, self.engine.run(&command)).await;
        match result {
            Ok(output) => {
                if !output.stderr.is_empty() {
                    let message = format!("{operation} finished with messages: {}", output.stderr);
                    self.reporter.info(&message);
                }
                info!("{} succeeded", operation);
                self.tree.refresh();
                Ok(output)
            }
            Err(e) => {
                self.reporter.engine_error(&format!("{operation} failed"), &e);
                Err(e.into())
            }
        }
    }
}

/// `path` made absolute against the current directory, unchanged if that
/// cannot be determined.
fn absolute(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}
