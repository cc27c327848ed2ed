//! Records reconstructed from engine listings.
//!
//! Every record here lives for exactly one fetch cycle: it is parsed from a
//! row of delimited engine output, handed to the grouping or node-building
//! code, and dropped.  Nothing mutates a record after construction.

use crate::labels;
use crate::parse::{Fields, Parsed};

/// Status fallback when the engine leaves the column empty.
pub const UNKNOWN_STATUS: &str = "Unknown";

/// A container row from `container ls -a`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerRecord {
    pub id: String,
    pub name: String,
    pub status: String,
    pub is_running: bool,
    /// Set when the label blob mentions a compose project at all.
    pub is_compose: bool,
    /// Empty for non-compose containers, otherwise the project or the sentinel.
    pub compose_project: String,
    pub compose_file: String,
}

impl ContainerRecord {
    pub const FIELDS: usize = 4;

    /// Build a record from an `id|name|status|labels` row.
    pub fn from_fields(fields: &Fields<'_>) -> Parsed<Self> {
        let mut missing = Vec::new();

        let id = fields.text(0, "id", &mut missing).to_string();
        let name = match fields.get(1) {
            Some(name) => name.to_string(),
            None => {
                missing.push("name");
                if id.is_empty() {
                    "unnamed".to_string()
                } else {
                    id.clone()
                }
            }
        };
        let status = match fields.get(2) {
            Some(status) => status.to_string(),
            None => {
                missing.push("status");
                UNKNOWN_STATUS.to_string()
            }
        };
        // Plenty of containers legitimately carry no labels, so an empty
        // column is not a degradation.
        let label_blob = fields.get(3).unwrap_or_default();

        let is_compose = labels::has_compose_project(label_blob);
        let (compose_project, compose_file) = if is_compose {
            (
                labels::compose_project(label_blob),
                labels::compose_file(label_blob),
            )
        } else {
            (String::new(), String::new())
        };

        let record = Self {
            is_running: is_running_status(&status),
            id,
            name,
            status,
            is_compose,
            compose_project,
            compose_file,
        };
        Parsed::new(record, missing)
    }
}

/// A pod row from `pod ls`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PodRecord {
    pub id: String,
    pub name: String,
    pub status: String,
}

impl PodRecord {
    pub const FIELDS: usize = 3;

    pub fn from_fields(fields: &Fields<'_>) -> Parsed<Self> {
        let mut missing = Vec::new();
        let id = fields.text(0, "id", &mut missing).to_string();
        let name = fields.text(1, "name", &mut missing).to_string();
        let status = match fields.get(2) {
            Some(status) => status.to_string(),
            None => {
                missing.push("status");
                UNKNOWN_STATUS.to_string()
            }
        };
        Parsed::new(Self { id, name, status }, missing)
    }

    pub fn is_running(&self) -> bool {
        self.status.to_lowercase().contains("running")
    }
}

/// A container row from the pod-filtered `ps` listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PodContainerRecord {
    pub id: String,
    pub name: String,
    pub status: String,
    pub created: String,
    pub is_running: bool,
}

impl PodContainerRecord {
    pub const FIELDS: usize = 4;

    pub fn from_fields(fields: &Fields<'_>) -> Parsed<Self> {
        let mut missing = Vec::new();
        let id = fields.text(0, "id", &mut missing).to_string();
        let name = fields.text(1, "name", &mut missing).to_string();
        let status = match fields.get(2) {
            Some(status) => status.to_string(),
            None => {
                missing.push("status");
                UNKNOWN_STATUS.to_string()
            }
        };
        let created = fields.text(3, "created", &mut missing).to_string();
        Parsed::new(
            Self {
                is_running: is_running_status(&status),
                id,
                name,
                status,
                created,
            },
            missing,
        )
    }
}

/// An image row from `image ls`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRecord {
    pub id: String,
    pub repository: String,
    pub tag: String,
}

impl ImageRecord {
    pub const FIELDS: usize = 3;

    pub fn from_fields(fields: &Fields<'_>) -> Parsed<Self> {
        let mut missing = Vec::new();
        let id = fields.text(0, "id", &mut missing).to_string();
        let repository = fields.text(1, "repository", &mut missing).to_string();
        let tag = fields.text(2, "tag", &mut missing).to_string();
        Parsed::new(
            Self {
                id,
                repository,
                tag,
            },
            missing,
        )
    }

    /// Dangling images (`<none>` repository or tag) are not worth listing.
    pub fn is_dangling(&self) -> bool {
        self.repository == "<none>" || self.tag == "<none>"
    }

    pub fn reference(&self) -> String {
        format!("{}:{}", self.repository, self.tag)
    }
}

/// A `name|driver` row, shared by the volume and network listings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverRecord {
    pub name: String,
    pub driver: String,
}

impl DriverRecord {
    pub const FIELDS: usize = 2;

    pub fn from_fields(fields: &Fields<'_>) -> Parsed<Self> {
        let mut missing = Vec::new();
        let name = fields.text(0, "name", &mut missing).to_string();
        let driver = fields.text(1, "driver", &mut missing).to_string();
        Parsed::new(Self { name, driver }, missing)
    }
}

/// Engines report running containers as `Up 3 minutes`, `Up About an hour`, ...
pub fn is_running_status(status: &str) -> bool {
    status.starts_with("Up")
}
