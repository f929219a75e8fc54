//! Prompt assembly: scan snapshots and work items rendered as plain text
//! for a backend.

use std::fmt::Write;

use crate::types::{RepoStatus, WorkItem};

pub const SYSTEM_PROMPT: &str = "\
You are wip, a developer assistant that gives concise briefings.
You analyze git repository state and work-in-progress items to help developers
understand where they left off and what to focus on next.

Rules:
- Be concise and direct. No filler.
- Use plain language, not raw git output.
- When suggesting priorities, explain WHY (staleness, risk, dependencies).
- If there's nothing notable, say so briefly.
";

const BRIEFING_INTRO: &str = "\
Here is the current state of my repositories and work items.
Give me a briefing: what should I know, and what should I focus on first?";

const STANDUP_INTRO: &str = "\
Based on my git activity and work items, draft a standup update.
Use this format:
- Yesterday: (what I worked on)
- Today: (what I should focus on)
- Blockers: (anything stuck or at risk)";

const QUERY_INTRO: &str = "Here is the current state of my repositories and work items.";

const MAX_BRANCHES: usize = 5;
const MAX_COMMITS: usize = 5;
const MAX_BODY_LINES: usize = 3;
const MAX_FILES: usize = 10;

/// A system prompt paired with the user message.
pub type Prompt = (&'static str, String);

/// Work items first, then one section per repository.
pub fn build_context(repos: &[RepoStatus], items: &[WorkItem]) -> String {
    let mut out = String::new();

    if !items.is_empty() {
        out.push_str("## Work-in-progress items\n");
        for item in items {
            let status = if item.is_done() { "DONE" } else { "OPEN" };
            let _ = write!(out, "- [{}] #{}: {}", status, item.id, item.description);
            if let Some(repo) = &item.repo {
                let _ = write!(out, " (repo: {})", repo);
            }
            out.push('\n');
        }
        out.push('\n');
    }

    if !repos.is_empty() {
        out.push_str("## Repositories\n");
        for repo in repos {
            out.push_str(&format_repo(repo));
            out.push('\n');
        }
    }

    out.truncate(out.trim_end().len());
    out
}

pub fn build_briefing_prompt(repos: &[RepoStatus], items: &[WorkItem]) -> Prompt {
    let context = build_context(repos, items);
    (SYSTEM_PROMPT, format!("{}\n\n{}\n", BRIEFING_INTRO, context))
}

pub fn build_standup_prompt(repos: &[RepoStatus], items: &[WorkItem]) -> Prompt {
    let context = build_context(repos, items);
    (SYSTEM_PROMPT, format!("{}\n\n{}\n", STANDUP_INTRO, context))
}

pub fn build_query_prompt(query: &str, repos: &[RepoStatus], items: &[WorkItem]) -> Prompt {
    let context = build_context(repos, items);
    (
        SYSTEM_PROMPT,
        format!("{}\n\n{}\n\nMy question: {}\n", QUERY_INTRO, context, query),
    )
}

/// One repository section.
pub fn format_repo(repo: &RepoStatus) -> String {
    let mut out = format!("### {} (branch: {})\n", repo.name, repo.current_branch);

    let mut summary = Vec::new();
    if repo.is_dirty() {
        summary.push(format!("{} uncommitted changes", repo.dirty_total()));
    } else {
        summary.push("clean".to_string());
    }
    if repo.stash_count > 0 {
        summary.push(format!("{} stash(es)", repo.stash_count));
    }
    if !repo.last_commit_ago.is_empty() {
        summary.push(format!("last commit {}", repo.last_commit_ago));
    }
    let _ = writeln!(out, "Status: {}", summary.join(", "));

    if !repo.changed_files.is_empty() {
        out.push_str("Changed files:\n");
        for change in &repo.changed_files {
            let _ = write!(out, "  - [{}] {} ({})", change.stage, change.path, change.status);
            let insertions = change.insertions.unwrap_or(0);
            let deletions = change.deletions.unwrap_or(0);
            if insertions > 0 || deletions > 0 {
                let _ = write!(out, " (+{}/-{})", insertions, deletions);
            }
            out.push('\n');
        }
    }

    if !repo.stash_entries.is_empty() {
        out.push_str("Stashes:\n");
        for entry in &repo.stash_entries {
            let _ = writeln!(out, "  - {}", entry);
        }
    }

    if repo.ahead > 0 || repo.behind > 0 {
        let _ = writeln!(out, "Remote: {} ahead, {} behind", repo.ahead, repo.behind);
    }

    if !repo.recent_branches.is_empty() {
        let names: Vec<String> = repo
            .recent_branches
            .iter()
            .take(MAX_BRANCHES)
            .map(|branch| format!("{} ({})", branch.name, branch.last_commit_ago))
            .collect();
        let _ = writeln!(out, "Other branches: {}", names.join(", "));
    }

    if !repo.recent_commits.is_empty() {
        out.push_str("Recent commits:\n");
        for commit in repo.recent_commits.iter().take(MAX_COMMITS) {
            let _ = writeln!(out, "  - {} {} ({})", commit.sha, commit.message, commit.ago);
            if !commit.body.is_empty() {
                for line in commit.body.lines().take(MAX_BODY_LINES) {
                    let _ = writeln!(out, "      {}", line);
                }
            }
            if !commit.files.is_empty() {
                let shown: Vec<&str> = commit
                    .files
                    .iter()
                    .take(MAX_FILES)
                    .map(String::as_str)
                    .collect();
                let _ = write!(out, "      files: {}", shown.join(", "));
                if commit.files.len() > MAX_FILES {
                    let _ = write!(out, " +{} more", commit.files.len() - MAX_FILES);
                }
                out.push('\n');
            }
        }
    }

    if !repo.agent_sessions.is_empty() {
        out.push_str("Agent activity:\n");
        for session in &repo.agent_sessions {
            let _ = writeln!(
                out,
                "  - {} on {}: {} commits, {} files changed, last commit {} ({})",
                session.agent,
                session.branch,
                session.commit_count,
                session.files_changed,
                session.last_commit_ago,
                session.status
            );
        }
    }

    out
}
