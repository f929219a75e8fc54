//! Persisted list of "work in progress" items.
//!
//! The list lives in one JSON file that is read and rewritten whole on every
//! mutation. There is no locking: concurrent invocations may lose writes.

use chrono::Utc;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::config::wip_dir;
use crate::error::{Error, Result};
use crate::types::{ItemStatus, WorkItem};
use crate::utils::time::to_epoch_f64;

pub fn worklist_path() -> PathBuf {
    wip_dir().join("worklist.json")
}

/// Work items stored at a fixed path.
#[derive(Debug, Clone)]
pub struct WorkList {
    path: PathBuf,
}

impl Default for WorkList {
    fn default() -> Self {
        Self::new(worklist_path())
    }
}

impl WorkList {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Every stored item, for display. A missing or unreadable file is an
    /// empty list.
    pub fn load(&self) -> Vec<WorkItem> {
        self.read().unwrap_or_else(|e| {
            warn!("ignoring work list {}: {}", self.path.display(), e);
            Vec::new()
        })
    }

    /// Every stored item, failing on a file that exists but cannot be read
    /// or parsed. Mutations go through here so they never overwrite it.
    fn read(&self) -> Result<Vec<WorkItem>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let text = fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&text)?)
    }

    fn save(&self, items: &[WorkItem]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut text = serde_json::to_string_pretty(items)?;
        text.push('\n');
        fs::write(&self.path, text)?;
        debug!("wrote {} work items to {}", items.len(), self.path.display());
        Ok(())
    }

    /// Append a new open item. Ids are one more than the largest id ever
    /// stored, so ids of completed items are never reused.
    pub fn add(&self, description: &str, repo: Option<&Path>) -> Result<WorkItem> {
        let mut items = self.read()?;
        let item = WorkItem {
            id: next_id(&items),
            description: description.to_string(),
            created_at: to_epoch_f64(Utc::now()),
            status: ItemStatus::Open,
            repo: repo.map(|path| normalize(path).to_string_lossy().into_owned()),
            completed_at: None,
        };
        items.push(item.clone());
        self.save(&items)?;
        Ok(item)
    }

    /// Mark an open item done. Unknown or already-done ids are
    /// [`Error::ItemNotFound`] and leave the file untouched.
    pub fn complete(&self, id: u64) -> Result<WorkItem> {
        let mut items = self.read()?;
        let item = items
            .iter_mut()
            .find(|item| item.id == id && !item.is_done())
            .ok_or(Error::ItemNotFound(id))?;

        item.status = ItemStatus::Done;
        item.completed_at = Some(to_epoch_f64(Utc::now()));
        let done = item.clone();

        self.save(&items)?;
        Ok(done)
    }

    pub fn list(&self, include_done: bool) -> Vec<WorkItem> {
        self.load()
            .into_iter()
            .filter(|item| include_done || !item.is_done())
            .collect()
    }

    /// Items linked to the repository at `repo`, compared by resolved path.
    pub fn list_for_repo(&self, repo: &Path, include_done: bool) -> Vec<WorkItem> {
        let target = normalize(repo);
        self.list(include_done)
            .into_iter()
            .filter(|item| {
                item.repo
                    .as_deref()
                    .is_some_and(|linked| normalize(Path::new(linked)) == target)
            })
            .collect()
    }
}

fn next_id(items: &[WorkItem]) -> u64 {
    items.iter().map(|item| item.id).max().unwrap_or(0) + 1
}

fn normalize(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}
