//! Plain-text and JSON rendering of scan results and work items.
//!
//! Everything writes to a caller-supplied [`Write`] so commands can target
//! stdout while tests capture into a buffer.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::io::{self, Write};
use std::path::Path;

use crate::types::{RepoStatus, WorkItem};
use crate::utils::relative_time_label;

/// Branches and commits shown per repository unless verbose.
const COMPACT_LIMIT: usize = 5;
const MESSAGE_WIDTH: usize = 60;

/// Shape of the `--json` dump.
#[derive(Serialize)]
struct Report<'a> {
    repos: &'a [RepoStatus],
    worklist: &'a [WorkItem],
}

pub fn render_json<W: Write>(out: &mut W, repos: &[RepoStatus], worklist: &[WorkItem]) -> io::Result<()> {
    serde_json::to_writer_pretty(&mut *out, &Report { repos, worklist })?;
    writeln!(out)
}

/// The default briefing. `repo_items` maps a snapshot path to the open work
/// items linked to it.
pub fn render_briefing<W: Write>(
    out: &mut W,
    repos: &[RepoStatus],
    verbose: bool,
    repo_items: &HashMap<String, Vec<WorkItem>>,
    now: DateTime<Utc>,
) -> io::Result<()> {
    let count = repos.len();
    writeln!(out, "wip · {} repo{} scanned", count, plural(count, "s"))?;
    writeln!(out)?;

    for repo in repos {
        let items = repo_items.get(&repo.path).map(Vec::as_slice).unwrap_or(&[]);
        render_repo(out, repo, verbose, items, now)?;
    }
    Ok(())
}

fn render_repo<W: Write>(
    out: &mut W,
    repo: &RepoStatus,
    verbose: bool,
    items: &[WorkItem],
    now: DateTime<Utc>,
) -> io::Result<()> {
    writeln!(out, "{} ({}) {}", repo.name, repo.current_branch, status_icon(repo))?;
    writeln!(out, "  {}", status_line(repo))?;

    if repo.ahead > 0 || repo.behind > 0 {
        writeln!(out, "  {} ahead, {} behind", repo.ahead, repo.behind)?;
    }

    if verbose && !repo.changed_files.is_empty() {
        writeln!(out, "  changes:")?;
        for change in &repo.changed_files {
            write!(out, "    [{}] {} ({})", change.stage, change.path, change.status)?;
            if let (Some(insertions), Some(deletions)) = (change.insertions, change.deletions) {
                write!(out, " +{}/-{}", insertions, deletions)?;
            }
            writeln!(out)?;
        }
    }

    if !repo.recent_branches.is_empty() {
        if verbose {
            writeln!(out, "  recent:")?;
            for branch in &repo.recent_branches {
                writeln!(out, "    {} ({})", branch.name, branch.last_commit_ago)?;
            }
        } else {
            let names: Vec<String> = repo
                .recent_branches
                .iter()
                .take(COMPACT_LIMIT)
                .map(|branch| format!("{} ({})", branch.name, branch.last_commit_ago))
                .collect();
            writeln!(out, "  recent: {}", names.join(", "))?;
        }
    }

    if !repo.recent_commits.is_empty() {
        writeln!(out, "  commits today:")?;
        let limit = if verbose { repo.recent_commits.len() } else { COMPACT_LIMIT };
        for commit in repo.recent_commits.iter().take(limit) {
            let message = if verbose {
                commit.message.clone()
            } else {
                truncate(&commit.message, MESSAGE_WIDTH)
            };
            writeln!(out, "    {} {} ({})", commit.sha, message, commit.ago)?;
        }
    }

    if !repo.agent_sessions.is_empty() {
        writeln!(out, "  agents:")?;
        for session in &repo.agent_sessions {
            writeln!(
                out,
                "    {} on {}: {} commit{}, {} file{} · last {} ({})",
                session.agent,
                session.branch,
                session.commit_count,
                plural(session.commit_count, "s"),
                session.files_changed,
                plural(session.files_changed, "s"),
                session.last_commit_ago,
                session.status
            )?;
        }
    }

    if !items.is_empty() {
        writeln!(out, "  wip:")?;
        for item in items {
            writeln!(
                out,
                "    #{} {} ({})",
                item.id,
                item.description,
                relative_time_label(now, item.created())
            )?;
        }
    }

    writeln!(out)
}

/// Work items, one per line, with their age and linked repository name.
pub fn render_worklist<W: Write>(out: &mut W, items: &[WorkItem], now: DateTime<Utc>) -> io::Result<()> {
    for item in items {
        let mark = if item.is_done() { "x" } else { " " };
        write!(out, "  [{}] #{} {}", mark, item.id, item.description)?;
        if let Some(name) = item
            .repo
            .as_deref()
            .and_then(|repo| Path::new(repo).file_name())
        {
            write!(out, " ({})", name.to_string_lossy())?;
        }
        writeln!(out, " · {}", relative_time_label(now, item.created()))?;
    }
    Ok(())
}

fn status_icon(repo: &RepoStatus) -> &'static str {
    if repo.is_dirty() {
        "⚠"
    } else if repo.behind > 0 {
        "↓"
    } else {
        "✓"
    }
}

fn status_line(repo: &RepoStatus) -> String {
    let mut parts = Vec::new();
    if repo.is_dirty() {
        parts.push(format!("{} dirty", repo.dirty_total()));
    } else {
        parts.push("clean".to_string());
    }
    if repo.stash_count > 0 {
        parts.push(format!("{} stash{}", repo.stash_count, plural(repo.stash_count, "es")));
    }
    if !repo.last_commit_ago.is_empty() {
        parts.push(format!("last commit {}", repo.last_commit_ago));
    }
    parts.join(" · ")
}

fn plural(count: usize, suffix: &'static str) -> &'static str {
    if count == 1 {
        ""
    } else {
        suffix
    }
}

/// Shorten to at most `width` characters, marking the cut with `…`.
fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }
    let mut short: String = text.chars().take(width.saturating_sub(1)).collect();
    short.push('…');
    short
}
