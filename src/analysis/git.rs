use chrono::{DateTime, Utc};
use git2::{Branch, BranchType, Commit, Delta, Diff, Patch, Repository, Status, StatusOptions};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

use super::agents::detect_agent_sessions;
use crate::config::{AgentsConfig, Config, DEFAULT_RECENT_DAYS};
use crate::error::{Error, Result};
use crate::types::{
    BranchInfo, CommitInfo, FileChange, FileStatus, RepoStatus, Stage, DETACHED_HEAD,
};
use crate::utils::time::label_since_epoch;

/// Most commits examined when collecting today's commits.
const MAX_RECENT_COMMITS: usize = 50;
/// Window for "commits today", in seconds.
const RECENT_COMMIT_WINDOW: i64 = 86_400;
/// Paths kept per commit.
const MAX_COMMIT_FILES: usize = 20;

/// Parameters shared by every repository in one scan.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Case-insensitive author-name filter for recent commits; empty keeps all
    pub author: String,
    /// Branches whose tip is older than this many days are not reported
    pub recent_days: u32,
    pub agents: AgentsConfig,
    /// Upper bound for inspecting one repository
    pub timeout: Duration,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            author: String::new(),
            recent_days: DEFAULT_RECENT_DAYS,
            agents: AgentsConfig::default(),
            timeout: Duration::from_secs(30),
        }
    }
}

impl ScanOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            author: config.author.clone(),
            recent_days: config.recent_days,
            agents: config.agents.clone(),
            ..Self::default()
        }
    }
}

/// Inspect the repository rooted at `path` as of now.
pub fn inspect_repo(path: &Path, options: &ScanOptions) -> Result<RepoStatus> {
    inspect_repo_at(path, options, Utc::now())
}

/// Inspect the repository rooted at `path`, labelling ages relative to `now`.
///
/// Fails only when `path` is not a repository root. Every individual query
/// that fails degrades to an empty or zero value for that field.
pub fn inspect_repo_at(path: &Path, options: &ScanOptions, now: DateTime<Utc>) -> Result<RepoStatus> {
    let mut repo = Repository::open(path).map_err(|e| {
        debug!("{} is not a repository: {}", path.display(), e);
        Error::NotARepository(path.to_path_buf())
    })?;
    if repo.is_bare() {
        return Err(Error::NotARepository(path.to_path_buf()));
    }

    let canonical = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
    let name = canonical
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| canonical.to_string_lossy().into_owned());

    // Stashes need the repository mutably, so read them before anything
    // else borrows it.
    let stash_entries = fallback(&name, "stash list", stash_entries(&mut repo));

    let current_branch = current_branch(&repo).unwrap_or_else(|e| {
        debug!(repo = %name, "cannot resolve HEAD: {}", e);
        DETACHED_HEAD.to_string()
    });

    let head_time = repo
        .head()
        .and_then(|head| head.peel_to_commit())
        .map(|commit| commit.time().seconds())
        .ok();
    let has_head = head_time.is_some();

    let untracked = fallback(&name, "untracked files", untracked_paths(&repo));
    let unstaged_diff = optional(&name, "unstaged diff", repo.diff_index_to_workdir(None, None));
    let staged_diff = if has_head {
        optional(&name, "staged diff", staged_diff(&repo))
    } else {
        None
    };

    let dirty_files = unstaged_diff.as_ref().map_or(0, |diff| diff.deltas().len());
    let staged_files = staged_diff.as_ref().map_or(0, |diff| diff.deltas().len());

    let mut changed_files = Vec::new();
    if has_head {
        if let Some(diff) = &unstaged_diff {
            let stats = fallback(&name, "unstaged numstat", numstat(diff));
            collect_changes(diff, Stage::Unstaged, &stats, &mut changed_files);
        }
        if let Some(diff) = &staged_diff {
            let stats = fallback(&name, "staged numstat", numstat(diff));
            collect_changes(diff, Stage::Staged, &stats, &mut changed_files);
        }
    }
    changed_files.extend(untracked.iter().map(|path| FileChange {
        path: path.clone(),
        status: FileStatus::Untracked,
        stage: Stage::Untracked,
        insertions: None,
        deletions: None,
    }));

    let (ahead, behind) = fallback(&name, "ahead/behind", ahead_behind(&repo));

    let last_commit_ago = head_time
        .map(|seconds| label_since_epoch(now, seconds))
        .unwrap_or_default();

    let recent_branches = fallback(
        &name,
        "recent branches",
        recent_branches(&repo, &current_branch, now, options.recent_days),
    );

    let recent_commits = if has_head {
        fallback(
            &name,
            "recent commits",
            recent_commits(&repo, &options.author, now),
        )
    } else {
        Vec::new()
    };

    let agent_sessions = fallback(
        &name,
        "agent sessions",
        detect_agent_sessions(&repo, &options.agents, &options.author, now),
    );

    Ok(RepoStatus {
        path: canonical.to_string_lossy().into_owned(),
        name,
        current_branch,
        dirty_files,
        untracked_files: untracked.len(),
        staged_files,
        stash_count: stash_entries.len(),
        stash_entries,
        ahead,
        behind,
        last_commit_ago,
        recent_branches,
        recent_commits,
        agent_sessions,
        changed_files,
    })
}

/// Swallow a failed query into the field's zero value.
fn fallback<T: Default>(repo: &str, what: &str, result: std::result::Result<T, git2::Error>) -> T {
    result.unwrap_or_else(|e| {
        debug!(repo = %repo, "{} failed: {}", what, e);
        T::default()
    })
}

fn optional<T>(repo: &str, what: &str, result: std::result::Result<T, git2::Error>) -> Option<T> {
    result
        .map_err(|e| debug!(repo = %repo, "{} failed: {}", what, e))
        .ok()
}

/// Branch HEAD points at, read from the symbolic ref so that an unborn
/// branch in an empty repository still has a name.
fn current_branch(repo: &Repository) -> std::result::Result<String, git2::Error> {
    let head = repo.find_reference("HEAD")?;
    Ok(match head.symbolic_target() {
        Some(target) => target
            .strip_prefix("refs/heads/")
            .unwrap_or(target)
            .to_string(),
        None => DETACHED_HEAD.to_string(),
    })
}

fn stash_entries(repo: &mut Repository) -> std::result::Result<Vec<String>, git2::Error> {
    let mut entries = Vec::new();
    repo.stash_foreach(|index, message, _oid| {
        entries.push(format!("stash@{{{}}}: {}", index, message));
        true
    })?;
    Ok(entries)
}

fn untracked_paths(repo: &Repository) -> std::result::Result<Vec<String>, git2::Error> {
    let mut opts = StatusOptions::new();
    opts.include_untracked(true)
        .recurse_untracked_dirs(true)
        .include_ignored(false)
        .exclude_submodules(true);

    let statuses = repo.statuses(Some(&mut opts))?;
    Ok(statuses
        .iter()
        .filter(|entry| entry.status().contains(Status::WT_NEW))
        .filter_map(|entry| entry.path().map(str::to_string))
        .collect())
}

fn staged_diff(repo: &Repository) -> std::result::Result<Diff<'_>, git2::Error> {
    let tree = repo.head()?.peel_to_tree()?;
    let mut diff = repo.diff_tree_to_index(Some(&tree), None, None)?;
    diff.find_similar(None)?;
    Ok(diff)
}

fn delta_path(delta: &git2::DiffDelta<'_>) -> Option<String> {
    delta
        .new_file()
        .path()
        .or_else(|| delta.old_file().path())
        .map(|p| p.to_string_lossy().into_owned())
}

fn classify(delta: Delta) -> FileStatus {
    match delta {
        Delta::Added => FileStatus::Added,
        Delta::Deleted => FileStatus::Deleted,
        Delta::Renamed => FileStatus::Renamed,
        _ => FileStatus::Modified,
    }
}

/// Per-path insertion/deletion counts. Binary files count as 0/0.
fn numstat(diff: &Diff<'_>) -> std::result::Result<HashMap<String, (usize, usize)>, git2::Error> {
    let mut stats = HashMap::new();
    for idx in 0..diff.deltas().len() {
        let Some(path) = diff.get_delta(idx).and_then(|delta| delta_path(&delta)) else {
            continue;
        };
        let counts = match Patch::from_diff(diff, idx)? {
            Some(patch) if !patch.delta().flags().is_binary() => {
                let (_context, insertions, deletions) = patch.line_stats()?;
                (insertions, deletions)
            }
            _ => (0, 0),
        };
        stats.insert(path, counts);
    }
    Ok(stats)
}

fn collect_changes(
    diff: &Diff<'_>,
    stage: Stage,
    stats: &HashMap<String, (usize, usize)>,
    out: &mut Vec<FileChange>,
) {
    let mut seen = HashSet::new();
    for delta in diff.deltas() {
        let Some(path) = delta_path(&delta) else {
            continue;
        };
        if !seen.insert(path.clone()) {
            continue;
        }
        let (insertions, deletions) = stats.get(&path).copied().unwrap_or((0, 0));
        out.push(FileChange {
            path,
            status: classify(delta.status()),
            stage,
            insertions: Some(insertions),
            deletions: Some(deletions),
        });
    }
}

/// Commits ahead of and behind the upstream of the current branch.
fn ahead_behind(repo: &Repository) -> std::result::Result<(usize, usize), git2::Error> {
    let head = repo.head()?;
    if !head.is_branch() {
        return Ok((0, 0));
    }
    let branch = Branch::wrap(head);
    let upstream = match branch.upstream() {
        Ok(upstream) => upstream,
        Err(e) if e.code() == git2::ErrorCode::NotFound => return Ok((0, 0)),
        Err(e) => return Err(e),
    };
    let local = branch.get().peel_to_commit()?.id();
    let remote = upstream.get().peel_to_commit()?.id();
    repo.graph_ahead_behind(local, remote)
}

fn recent_branches(
    repo: &Repository,
    current: &str,
    now: DateTime<Utc>,
    recent_days: u32,
) -> std::result::Result<Vec<BranchInfo>, git2::Error> {
    let cutoff = now.timestamp() - i64::from(recent_days) * 86_400;
    let mut branches = Vec::new();

    for (branch, _) in repo.branches(Some(BranchType::Local))?.flatten() {
        let name = match branch.name() {
            Ok(Some(name)) => name.to_string(),
            _ => continue,
        };
        if name == current {
            continue;
        }
        let Ok(commit) = branch.get().peel_to_commit() else {
            continue;
        };
        let timestamp = commit.time().seconds();
        if timestamp >= cutoff {
            branches.push(BranchInfo {
                name,
                last_commit_ago: label_since_epoch(now, timestamp),
                timestamp,
            });
        }
    }

    branches.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    Ok(branches)
}

/// Commits from the last 24 hours, newest first.
///
/// History is assumed reverse-chronological: the walk ends at the first
/// commit outside the window, and at most [`MAX_RECENT_COMMITS`] commits are
/// examined whether or not they pass the author filter.
fn recent_commits(
    repo: &Repository,
    author: &str,
    now: DateTime<Utc>,
) -> std::result::Result<Vec<CommitInfo>, git2::Error> {
    let mut revwalk = repo.revwalk()?;
    revwalk.push_head()?;

    let cutoff = now.timestamp() - RECENT_COMMIT_WINDOW;
    let needle = author.to_lowercase();
    let mut commits = Vec::new();

    for oid in revwalk.take(MAX_RECENT_COMMITS) {
        let commit = match oid.and_then(|oid| repo.find_commit(oid)) {
            Ok(commit) => commit,
            Err(e) => {
                debug!("stopping commit walk: {}", e);
                break;
            }
        };
        if commit.time().seconds() < cutoff {
            break;
        }
        if !needle.is_empty() {
            let name = commit.author().name().unwrap_or_default().to_lowercase();
            if !name.contains(&needle) {
                continue;
            }
        }
        commits.push(commit_info(repo, &commit, now));
    }

    Ok(commits)
}

fn commit_info(repo: &Repository, commit: &Commit<'_>, now: DateTime<Utc>) -> CommitInfo {
    let (message, body) = split_message(commit.message().unwrap_or_default());
    let id = commit.id().to_string();
    let timestamp = commit.time().seconds();

    let files = match commit_diff(repo, commit) {
        Ok(diff) => diff
            .deltas()
            .filter_map(|delta| delta_path(&delta))
            .take(MAX_COMMIT_FILES)
            .collect(),
        Err(e) => {
            debug!("no file list for {}: {}", id, e);
            Vec::new()
        }
    };

    CommitInfo {
        sha: id.chars().take(7).collect(),
        message,
        body,
        ago: label_since_epoch(now, timestamp),
        timestamp,
        files,
    }
}

/// Split a commit message into its first line and the trimmed remainder.
fn split_message(raw: &str) -> (String, String) {
    let trimmed = raw.trim();
    match trimmed.split_once('\n') {
        Some((first, rest)) => (first.trim_end().to_string(), rest.trim().to_string()),
        None => (trimmed.to_string(), String::new()),
    }
}

/// Diff of a commit against its first parent, or against the empty tree
/// for a root commit.
pub(crate) fn commit_diff<'r>(
    repo: &'r Repository,
    commit: &Commit<'_>,
) -> std::result::Result<Diff<'r>, git2::Error> {
    let tree = commit.tree()?;
    let parent_tree = if commit.parent_count() > 0 {
        Some(commit.parent(0)?.tree()?)
    } else {
        None
    };
    repo.diff_tree_to_tree(parent_tree.as_ref(), Some(&tree), None)
}

#[cfg(test)]
mod unit_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_split_message() {
        assert_eq!(
            split_message("Fix bug\n\nLonger explanation\nsecond line\n"),
            ("Fix bug".to_string(), "Longer explanation\nsecond line".to_string())
        );
        assert_eq!(split_message("  one line  \n"), ("one line".to_string(), String::new()));
        assert_eq!(split_message(""), (String::new(), String::new()));
    }

    #[test]
    fn test_classify_defaults_to_modified() {
        assert_eq!(classify(Delta::Added), FileStatus::Added);
        assert_eq!(classify(Delta::Deleted), FileStatus::Deleted);
        assert_eq!(classify(Delta::Renamed), FileStatus::Renamed);
        assert_eq!(classify(Delta::Modified), FileStatus::Modified);
        assert_eq!(classify(Delta::Typechange), FileStatus::Modified);
        assert_eq!(classify(Delta::Copied), FileStatus::Modified);
    }
}
