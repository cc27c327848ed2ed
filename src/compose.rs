//! Compose project grouping.
//!
//! The engine has no notion of "which containers came from which compose
//! file"; the only evidence is the labels each container carries.  This
//! module turns the flat container listing into standalone containers plus
//! one group per compose project, suppressing containers already emitted
//! earlier in the same refresh cycle.

use std::collections::{HashMap, HashSet};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::types::ContainerRecord;

/// How long entries survive in the [`Ledger`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum LedgerScope {
    /// Entries live until the next refresh invalidates the tree.  A container
    /// seen by any grouping pass is hidden from every later pass in the same
    /// cycle.
    #[default]
    Refresh,
    /// Entries live for a single grouping pass.
    Pass,
}

/// Containers already emitted, keyed by `(project, container id)`.
#[derive(Debug, Default)]
pub struct Ledger {
    seen: HashSet<(String, String)>,
}

impl Ledger {
    /// Record the pair, returning `false` when it was already present.
    pub fn register(&mut self, project: &str, id: &str) -> bool {
        self.seen.insert((project.to_string(), id.to_string()))
    }

    pub fn contains(&self, project: &str, id: &str) -> bool {
        self.seen.contains(&(project.to_string(), id.to_string()))
    }

    pub fn clear(&mut self) {
        self.seen.clear();
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

/// Containers belonging to one compose project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposeGroup {
    pub project: String,
    /// First non-empty compose file reported by a member, or empty.
    pub compose_file: String,
    pub containers: Vec<ContainerRecord>,
}

impl ComposeGroup {
    /// Stable node identity, so a redrawn tree can be matched to the old one.
    pub fn node_id(&self) -> String {
        format!("compose-group-{}", self.project)
    }
}

/// Result of one grouping pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Grouping {
    /// Containers without compose labels, in listing order.
    pub standalone: Vec<ContainerRecord>,
    /// One group per project, in order of first appearance.
    pub groups: Vec<ComposeGroup>,
}

/// Partition `records` into standalone containers and compose groups.
///
/// Standalone records without an id are dropped, since nothing can be done
/// with them.  A compose record whose `(project, id)` pair is already in
/// `ledger` is dropped silently; every other pair is registered.
pub fn group(records: Vec<ContainerRecord>, ledger: &mut Ledger) -> Grouping {
    let mut grouping = Grouping::default();
    let mut index: HashMap<String, usize> = HashMap::new();

    for record in records {
        if !record.is_compose {
            if !record.id.is_empty() {
                grouping.standalone.push(record);
            }
            continue;
        }

        let slot = match index.get(&record.compose_project) {
            Some(&slot) => slot,
            None => {
                let slot = grouping.groups.len();
                index.insert(record.compose_project.clone(), slot);
                grouping.groups.push(ComposeGroup {
                    project: record.compose_project.clone(),
                    compose_file: String::new(),
                    containers: Vec::new(),
                });
                slot
            }
        };
        let group = &mut grouping.groups[slot];

        if group.compose_file.is_empty() && !record.compose_file.is_empty() {
            group.compose_file = record.compose_file.clone();
        }

        if ledger.contains(&group.project, &record.id) {
            debug!(
                "Skipping duplicate container {} in compose project {}",
                record.id, group.project
            );
            continue;
        }
        ledger.register(&group.project, &record.id);
        group.containers.push(record);
    }

    grouping
}
