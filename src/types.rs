//! # Common Types
//!
//! This module contains the types shared by the scanner, the work list and
//! the presentation layer. Everything here derives `Serialize` so the
//! `--json` output is just these structs dumped as-is.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::utils::time::from_epoch_f64;

/// Label reported as the current branch when HEAD points at a commit.
pub const DETACHED_HEAD: &str = "detached HEAD";

/// The state of one repository at scan time.
///
/// Built once per scan from live repository state and never mutated
/// afterwards.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RepoStatus {
    /// Canonical path of the working directory
    pub path: String,
    /// Last path component, used for display
    pub name: String,
    /// Current branch, or [`DETACHED_HEAD`]
    pub current_branch: String,
    /// Entries differing between working tree and index
    pub dirty_files: usize,
    pub untracked_files: usize,
    /// Entries differing between index and HEAD
    pub staged_files: usize,
    pub stash_count: usize,
    /// `stash@{N}: message` lines, most recent first
    pub stash_entries: Vec<String>,
    pub ahead: usize,
    pub behind: usize,
    /// Empty when the repository has no commits yet
    pub last_commit_ago: String,
    pub recent_branches: Vec<BranchInfo>,
    pub recent_commits: Vec<CommitInfo>,
    pub agent_sessions: Vec<AgentSession>,
    pub changed_files: Vec<FileChange>,
}

impl RepoStatus {
    /// Total number of uncommitted entries across all three buckets.
    pub fn dirty_total(&self) -> usize {
        self.dirty_files + self.untracked_files + self.staged_files
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty_total() > 0
    }
}

/// How a path changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Modified,
    Added,
    Deleted,
    Renamed,
    Untracked,
}

impl FileStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Modified => "modified",
            Self::Added => "added",
            Self::Deleted => "deleted",
            Self::Renamed => "renamed",
            Self::Untracked => "untracked",
        }
    }
}

impl fmt::Display for FileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which bucket a change sits in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Unstaged,
    Staged,
    Untracked,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unstaged => "unstaged",
            Self::Staged => "staged",
            Self::Untracked => "untracked",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One working-tree change. A path appears at most once per stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileChange {
    pub path: String,
    pub status: FileStatus,
    pub stage: Stage,
    /// Lines added; `None` for untracked files
    pub insertions: Option<usize>,
    /// Lines removed; `None` for untracked files
    pub deletions: Option<usize>,
}

/// A commit taken from repository history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitInfo {
    /// Abbreviated hash (7 characters)
    pub sha: String,
    /// First line of the message
    pub message: String,
    /// Remaining message lines, trimmed
    pub body: String,
    pub ago: String,
    /// Commit time in seconds since the epoch
    pub timestamp: i64,
    /// Paths touched by the commit, at most 20
    pub files: Vec<String>,
}

/// A local branch other than the current one with a recent tip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchInfo {
    pub name: String,
    pub last_commit_ago: String,
    pub timestamp: i64,
}

/// Activity classification for an agent session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// Last commit less than an hour ago
    Active,
    /// Last commit less than a day ago
    Recent,
    Stale,
}

impl SessionStatus {
    /// Classify by the age of the most recent commit.
    pub fn from_age_seconds(seconds: i64) -> Self {
        let hours = seconds as f64 / 3600.0;
        if hours < 1.0 {
            Self::Active
        } else if hours < 24.0 {
            Self::Recent
        } else {
            Self::Stale
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Recent => "recent",
            Self::Stale => "stale",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Agent-authored work on one branch, keyed by `(agent, branch)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentSession {
    pub agent: String,
    pub branch: String,
    pub commit_count: usize,
    /// Sum of files touched over all commits of the session
    pub files_changed: usize,
    pub first_commit_ago: String,
    pub last_commit_ago: String,
    pub first_timestamp: i64,
    pub last_timestamp: i64,
    pub status: SessionStatus,
}

/// Lifecycle of a work item. The only transition is `Open -> Done`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    #[default]
    Open,
    Done,
}

/// A free-text "work in progress" note, optionally linked to a repository.
///
/// Timestamps are stored as fractional epoch seconds to keep the on-disk
/// list readable by other tools.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkItem {
    pub id: u64,
    pub description: String,
    pub created_at: f64,
    #[serde(default)]
    pub status: ItemStatus,
    #[serde(default)]
    pub repo: Option<String>,
    #[serde(default)]
    pub completed_at: Option<f64>,
}

impl WorkItem {
    pub fn is_done(&self) -> bool {
        self.status == ItemStatus::Done
    }

    pub fn created(&self) -> DateTime<Utc> {
        from_epoch_f64(self.created_at)
    }
}
