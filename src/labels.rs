//! Compose metadata recovered from container label blobs.
//!
//! The engine prints labels as one free-text column.  Depending on the
//! engine and version that column looks like
//! `com.docker.compose.project=myapp,com.docker.compose.service=web` or
//! `map[com.docker.compose.project:myapp com.docker.compose.service:web]`.
//! Lookups here never fail: a missing or malformed label degrades to the
//! caller's default.

use std::path::Path;

pub const COMPOSE_PROJECT: &str = "com.docker.compose.project";
pub const COMPOSE_WORKING_DIR: &str = "com.docker.compose.project.working_dir";
pub const COMPOSE_CONFIG_FILES: &str = "com.docker.compose.project.config_files";

/// Project name used when a compose container carries no readable project.
pub const UNKNOWN_PROJECT: &str = "Unknown Project";

/// Split a label blob into `(key, value)` pairs.
///
/// Tokens are separated by commas or whitespace; each token splits at the
/// first `=` or `:`.  Tokens without a separator are skipped.
pub fn pairs(blob: &str) -> impl Iterator<Item = (&str, &str)> {
    blob.split(|c: char| c == ',' || c.is_whitespace())
        .map(strip_map_decoration)
        .filter(|token| !token.is_empty())
        .filter_map(|token| {
            let at = token.find(['=', ':'])?;
            Some((&token[..at], &token[at + 1..]))
        })
}

fn strip_map_decoration(token: &str) -> &str {
    let token = token.strip_prefix("map[").unwrap_or(token);
    token.strip_suffix(']').unwrap_or(token)
}

/// Value of the first label whose key is exactly `key`, or `default`.
pub fn value(blob: &str, key: &str, default: &str) -> String {
    pairs(blob)
        .find(|(k, _)| *k == key)
        .map(|(_, v)| v)
        .unwrap_or(default)
        .to_string()
}

/// Cheap pre-check used to tag a container as compose-managed.
pub fn has_compose_project(blob: &str) -> bool {
    blob.contains(COMPOSE_PROJECT)
}

pub fn compose_project(blob: &str) -> String {
    let project = value(blob, COMPOSE_PROJECT, "");
    if project.is_empty() {
        UNKNOWN_PROJECT.to_string()
    } else {
        project
    }
}

/// Compose file path from the working-dir and config-files labels.
///
/// Empty unless both labels are present.  An absolute config file path is
/// used as-is.
pub fn compose_file(blob: &str) -> String {
    let dir = value(blob, COMPOSE_WORKING_DIR, "");
    if dir.is_empty() {
        return String::new();
    }
    let file = value(blob, COMPOSE_CONFIG_FILES, "");
    if file.is_empty() {
        return String::new();
    }
    Path::new(&dir).join(file).to_string_lossy().into_owned()
}
