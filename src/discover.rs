//! Compose file lookup on disk, for projects whose containers carry no
//! usable compose labels and have no remembered path.

use std::path::{Path, PathBuf};

use walkdir::{DirEntry, WalkDir};

const COMPOSE_FILE_NAMES: [&str; 2] = ["docker-compose.yml", "docker-compose.yaml"];
const SKIPPED_DIRS: [&str; 3] = ["node_modules", ".git", "target"];

/// Find a compose file for `project` below `root`.
///
/// A file somewhere under a directory named after the project wins;
/// otherwise the first compose file found.  Entries are visited in name
/// order, so the answer is stable between runs.
pub fn find_compose_file(root: &Path, project: &str) -> Option<PathBuf> {
    let candidates: Vec<PathBuf> = WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| entry.depth() == 0 || !is_skipped(entry))
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file() && is_compose_file(entry))
        .map(DirEntry::into_path)
        .collect();

    candidates
        .iter()
        .find(|path| in_project_dir(root, path, project))
        .or_else(|| candidates.first())
        .cloned()
}

fn is_skipped(entry: &DirEntry) -> bool {
    entry.file_type().is_dir()
        && SKIPPED_DIRS
            .iter()
            .any(|name| entry.file_name() == *name)
}

fn is_compose_file(entry: &DirEntry) -> bool {
    COMPOSE_FILE_NAMES
        .iter()
        .any(|name| entry.file_name() == *name)
}

fn in_project_dir(root: &Path, path: &Path, project: &str) -> bool {
    path.strip_prefix(root)
        .ok()
        .and_then(Path::parent)
        .map(|dir| dir.components().any(|c| c.as_os_str() == project))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn touch(root: &Path, relative: &str) -> PathBuf {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "services: {}\n").unwrap();
        path
    }

    #[test]
    fn prefers_file_under_project_directory() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "alpha/docker-compose.yml");
        let wanted = touch(dir.path(), "shop/deploy/docker-compose.yaml");

        assert_eq!(find_compose_file(dir.path(), "shop"), Some(wanted));
    }

    #[test]
    fn falls_back_to_first_compose_file() {
        let dir = tempfile::tempdir().unwrap();
        let first = touch(dir.path(), "alpha/docker-compose.yml");
        touch(dir.path(), "beta/docker-compose.yml");
        touch(dir.path(), "beta/compose.txt");

        assert_eq!(find_compose_file(dir.path(), "ghost"), Some(first));
    }

    #[test]
    fn skips_dependency_directories() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "node_modules/shop/docker-compose.yml");

        assert_eq!(find_compose_file(dir.path(), "shop"), None);
    }

    #[test]
    fn project_name_must_match_a_whole_directory() {
        let dir = tempfile::tempdir().unwrap();
        let first = touch(dir.path(), "a/docker-compose.yml");
        touch(dir.path(), "shopfront/docker-compose.yml");

        assert_eq!(find_compose_file(dir.path(), "shop"), Some(first));
    }
}
