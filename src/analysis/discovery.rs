use git2::Repository;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Directory names never descended into, in addition to hidden ones.
const SKIPPED_DIRS: &[&str] = &["node_modules", "__pycache__", "venv", ".venv"];

/// Find git repositories under `directories`, at most `depth` levels deep.
///
/// A directory containing `.git` is recorded and not descended into, so
/// submodules and nested checkouts are never reported. The result is sorted
/// and free of duplicates even when the roots overlap.
pub fn discover_repos<S: AsRef<str>>(directories: &[S], depth: usize) -> Vec<PathBuf> {
    let mut found = BTreeSet::new();

    for directory in directories {
        let root = expand_home(directory.as_ref());
        let Ok(root) = root.canonicalize() else {
            debug!("skipping missing directory {}", root.display());
            continue;
        };
        if !root.is_dir() {
            continue;
        }
        walk_for_repos(&root, depth as i64, &mut found);
    }

    found.into_iter().collect()
}

fn walk_for_repos(directory: &Path, remaining_depth: i64, found: &mut BTreeSet<PathBuf>) {
    if remaining_depth < 0 {
        return;
    }

    if directory.join(".git").exists() {
        found.insert(directory.to_path_buf());
        return;
    }

    let entries = match fs::read_dir(directory) {
        Ok(entries) => entries,
        Err(e) => {
            debug!("cannot list {}: {}", directory.display(), e);
            return;
        }
    };

    let mut children: Vec<PathBuf> = entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .collect();
    children.sort();

    for child in children {
        let Some(name) = child.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if name.starts_with('.') || SKIPPED_DIRS.contains(&name) {
            continue;
        }
        walk_for_repos(&child, remaining_depth - 1, found);
    }
}

/// Expand a leading `~` to the home directory.
pub fn expand_home(path: &str) -> PathBuf {
    if path == "~" {
        return dirs::home_dir().unwrap_or_else(|| PathBuf::from(path));
    }
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

/// Root of the repository enclosing `start`, if any.
pub fn discover_current_repo(start: &Path) -> Option<PathBuf> {
    let repo = Repository::discover(start).ok()?;
    let workdir = repo.workdir()?;
    Some(workdir.canonicalize().unwrap_or_else(|_| workdir.to_path_buf()))
}
