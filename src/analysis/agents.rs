//! Detection of work done by coding agents.
//!
//! Two signals attribute a commit to an agent: the author name containing a
//! configured substring, and the branch name starting with a configured
//! prefix. The author signal wins. The branch signal never covers a commit
//! that is also reachable from a branch without an agent prefix, or one
//! written by the configured user. On a branch without an agent prefix,
//! unattributed commits are skipped; on an agent branch the walk ends at the
//! first unattributed commit, so a branch session is the unbroken newest run
//! of commits.

use chrono::{DateTime, Utc};
use git2::{BranchType, Oid, Repository};
use std::collections::BTreeMap;
use tracing::debug;

use super::git::commit_diff;
use crate::config::AgentsConfig;
use crate::types::{AgentSession, SessionStatus};
use crate::utils::time::label_since_epoch;

/// Commits examined per branch.
const MAX_COMMITS_PER_BRANCH: usize = 100;

/// Who a commit is credited to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attribution {
    Unattributed,
    /// Author name contains one of the configured substrings
    AuthorMatch(String),
    /// Branch carries an agent prefix; the commit author says nothing
    BranchMatch(String),
}

impl Attribution {
    pub fn agent(&self) -> Option<&str> {
        match self {
            Self::Unattributed => None,
            Self::AuthorMatch(agent) | Self::BranchMatch(agent) => Some(agent),
        }
    }
}

/// The first configured author substring found in `author`, ignoring case.
pub fn match_author(author: &str, agents: &AgentsConfig) -> Option<String> {
    let author = author.to_lowercase();
    agents
        .authors
        .iter()
        .filter(|pattern| !pattern.is_empty())
        .find(|pattern| author.contains(&pattern.to_lowercase()))
        .cloned()
}

/// Agent named by a branch prefix: `claude/fix-bug` gives `claude`.
pub fn match_branch(branch: &str, agents: &AgentsConfig) -> Option<String> {
    agents
        .branch_patterns
        .iter()
        .filter(|prefix| !prefix.is_empty())
        .find(|prefix| branch.starts_with(prefix.as_str()))
        .map(|prefix| {
            let agent = prefix.trim_end_matches('/');
            if agent.is_empty() { prefix.clone() } else { agent.to_string() }
        })
}

/// Attribute one commit. `known_human` marks a commit that is reachable from
/// a branch without an agent prefix, or whose author is the configured user;
/// such a commit only counts through an author match.
pub fn attribute(
    author: &str,
    branch_agent: Option<&str>,
    known_human: bool,
    agents: &AgentsConfig,
) -> Attribution {
    if let Some(agent) = match_author(author, agents) {
        return Attribution::AuthorMatch(agent);
    }
    match branch_agent {
        Some(agent) if !known_human => Attribution::BranchMatch(agent.to_string()),
        _ => Attribution::Unattributed,
    }
}

/// Whether `author` contains the configured user name, ignoring case.
pub fn is_user_author(author: &str, user: &str) -> bool {
    !user.is_empty() && author.to_lowercase().contains(&user.to_lowercase())
}

/// A commit as seen by the detector.
#[derive(Debug, Clone)]
pub struct CommitSample {
    pub id: Oid,
    pub author: String,
    pub timestamp: i64,
    pub known_human: bool,
}

/// `(timestamp, files changed)` per commit, keyed by `(agent, branch)`.
pub type SessionBuckets = BTreeMap<(String, String), Vec<(i64, usize)>>;

/// Attribute one branch's history, newest first, into `buckets`.
/// `files_changed` is only asked about attributed commits.
///
/// Returns the number of commits consumed from `history`.
pub fn accumulate_branch<I, F>(
    branch: &str,
    history: I,
    agents: &AgentsConfig,
    mut files_changed: F,
    buckets: &mut SessionBuckets,
) -> usize
where
    I: IntoIterator<Item = CommitSample>,
    F: FnMut(&CommitSample) -> usize,
{
    let branch_agent = match_branch(branch, agents);
    let mut consumed = 0;

    for sample in history.into_iter().take(MAX_COMMITS_PER_BRANCH) {
        consumed += 1;
        let attribution = attribute(
            &sample.author,
            branch_agent.as_deref(),
            sample.known_human,
            agents,
        );
        let Some(agent) = attribution.agent() else {
            if branch_agent.is_some() {
                break;
            }
            continue;
        };
        let files = files_changed(&sample);
        buckets
            .entry((agent.to_string(), branch.to_string()))
            .or_default()
            .push((sample.timestamp, files));
    }

    consumed
}

/// Turn accumulated buckets into sessions, most recently active first.
pub fn build_sessions(buckets: SessionBuckets, now: DateTime<Utc>) -> Vec<AgentSession> {
    let mut sessions: Vec<AgentSession> = buckets
        .into_iter()
        .filter_map(|((agent, branch), commits)| {
            let first = commits.iter().map(|(ts, _)| *ts).min()?;
            let last = commits.iter().map(|(ts, _)| *ts).max()?;
            Some(AgentSession {
                agent,
                branch,
                commit_count: commits.len(),
                files_changed: commits.iter().map(|(_, files)| files).sum(),
                first_commit_ago: label_since_epoch(now, first),
                last_commit_ago: label_since_epoch(now, last),
                first_timestamp: first,
                last_timestamp: last,
                status: SessionStatus::from_age_seconds(now.timestamp() - last),
            })
        })
        .collect();

    sessions.sort_by(|a, b| b.last_timestamp.cmp(&a.last_timestamp));
    sessions
}

/// Agent sessions across every local branch of `repo`. `user` is the
/// configured author name; an empty string disables that check.
pub fn detect_agent_sessions(
    repo: &Repository,
    agents: &AgentsConfig,
    user: &str,
    now: DateTime<Utc>,
) -> Result<Vec<AgentSession>, git2::Error> {
    let mut branches = Vec::new();
    for (branch, _) in repo.branches(Some(BranchType::Local))?.flatten() {
        let name = match branch.name() {
            Ok(Some(name)) => name.to_string(),
            _ => continue,
        };
        if let Some(tip) = branch.get().target() {
            branches.push((name, tip));
        }
    }

    // Tips of branches without an agent prefix mark where agent branches fork.
    let human_tips: Vec<Oid> = branches
        .iter()
        .filter(|(name, _)| match_branch(name, agents).is_none())
        .map(|(_, tip)| *tip)
        .collect();

    let mut buckets = SessionBuckets::new();
    for (name, tip) in &branches {
        if let Err(e) = walk_branch(repo, name, *tip, agents, user, &human_tips, &mut buckets) {
            debug!("skipping branch {} for agent detection: {}", name, e);
        }
    }

    Ok(build_sessions(buckets, now))
}

/// Whether `oid` is part of the history of any of `tips`.
fn reachable_from_any(repo: &Repository, oid: Oid, tips: &[Oid]) -> bool {
    tips.iter()
        .any(|tip| *tip == oid || repo.graph_descendant_of(*tip, oid).unwrap_or(false))
}

fn walk_branch(
    repo: &Repository,
    name: &str,
    tip: Oid,
    agents: &AgentsConfig,
    user: &str,
    human_tips: &[Oid],
    buckets: &mut SessionBuckets,
) -> Result<(), git2::Error> {
    let mut revwalk = repo.revwalk()?;
    revwalk.push(tip)?;
    let agent_branch = match_branch(name, agents).is_some();

    // Commits are loaded lazily so an agent branch stops reading history
    // at its fork point.
    let history = revwalk
        .map_while(|oid| oid.and_then(|oid| repo.find_commit(oid)).ok())
        .map(|commit| {
            let author = commit.author().name().unwrap_or_default().to_string();
            let known_human = is_user_author(&author, user)
                || (agent_branch && reachable_from_any(repo, commit.id(), human_tips));
            CommitSample {
                id: commit.id(),
                author,
                timestamp: commit.time().seconds(),
                known_human,
            }
        });

    let files_changed = |sample: &CommitSample| {
        repo.find_commit(sample.id)
            .and_then(|commit| commit_diff(repo, &commit).map(|diff| diff.deltas().len()))
            .unwrap_or(0)
    };

    accumulate_branch(name, history, agents, files_changed, buckets);
    Ok(())
}
