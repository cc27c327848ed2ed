//! Remembered compose file locations, keyed by project name.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::Mutex;

use log::{debug, warn};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("compose path store {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("compose path store {path} is not valid JSON: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

pub trait ComposePathStore: Send + Sync {
    fn get(&self, project: &str) -> Option<String>;
    fn put(&self, project: &str, path: &str) -> Result<(), StoreError>;
    fn all(&self) -> BTreeMap<String, String>;
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    paths: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ComposePathStore for MemoryStore {
    fn get(&self, project: &str) -> Option<String> {
        lock(&self.paths).get(project).cloned()
    }

    fn put(&self, project: &str, path: &str) -> Result<(), StoreError> {
        lock(&self.paths).insert(project.to_string(), path.to_string());
        Ok(())
    }

    fn all(&self) -> BTreeMap<String, String> {
        lock(&self.paths).clone()
    }
}

/// A JSON object of `project -> path` on disk, rewritten on every change.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    paths: Mutex<BTreeMap<String, String>>,
}

impl JsonFileStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let paths = match fs::read_to_string(&path) {
            Ok(text) if text.trim().is_empty() => BTreeMap::new(),
            Ok(text) => serde_json::from_str(&text).map_err(|source| StoreError::Json {
                path: path.display().to_string(),
                source,
            })?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => BTreeMap::new(),
            Err(source) => {
                return Err(StoreError::Io {
                    path: path.display().to_string(),
                    source,
                })
            }
        };
        debug!("Loaded {} compose paths from {}", paths.len(), path.display());
        Ok(Self {
            path,
            paths: Mutex::new(paths),
        })
    }

    fn persist(&self, paths: &BTreeMap<String, String>) -> Result<(), StoreError> {
        let io_err = |source| StoreError::Io {
            path: self.path.display().to_string(),
            source,
        };
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let text = serde_json::to_string_pretty(paths).map_err(|source| StoreError::Json {
            path: self.path.display().to_string(),
            source,
        })?;
        fs::write(&self.path, text).map_err(io_err)
    }
}

impl ComposePathStore for JsonFileStore {
    fn get(&self, project: &str) -> Option<String> {
        lock(&self.paths).get(project).cloned()
    }

    fn put(&self, project: &str, path: &str) -> Result<(), StoreError> {
        let mut paths = lock(&self.paths);
        if paths.get(project).map(String::as_str) == Some(path) {
            return Ok(());
        }
        paths.insert(project.to_string(), path.to_string());
        if let Err(e) = self.persist(&paths) {
            warn!("Failed to save compose path for {}: {}", project, e);
            return Err(e);
        }
        Ok(())
    }

    fn all(&self) -> BTreeMap<String, String> {
        lock(&self.paths).clone()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}
