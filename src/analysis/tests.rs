use super::*;
use crate::config::AgentsConfig;
use crate::error::Error;
use crate::types::{FileStatus, SessionStatus, Stage, DETACHED_HEAD};
use chrono::{DateTime, Duration, Utc};
use git2::{Oid, Repository, Signature, Time};
use pretty_assertions::assert_eq;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn setup_test_repo() -> (TempDir, Repository) {
    let temp_dir = TempDir::new().unwrap();
    let repo = Repository::init(temp_dir.path()).unwrap();
    (temp_dir, repo)
}

fn signature_at(name: &str, timestamp: i64) -> Signature<'static> {
    let email = format!("{}@example.com", name.to_lowercase().replace(' ', "."));
    Signature::new(name, &email, &Time::new(timestamp, 0)).unwrap()
}

/// Write `files` into the working tree, stage them and commit onto HEAD.
fn commit_to_head(
    repo: &Repository,
    files: &[(&str, &str)],
    message: &str,
    signature: &Signature<'_>,
) -> Oid {
    let workdir = repo.workdir().unwrap().to_path_buf();
    let mut index = repo.index().unwrap();
    for (name, content) in files {
        let path = workdir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, content).unwrap();
        index.add_path(Path::new(name)).unwrap();
    }
    index.write().unwrap();

    let tree_id = index.write_tree().unwrap();
    let tree = repo.find_tree(tree_id).unwrap();
    let parent = repo.head().ok().and_then(|h| h.peel_to_commit().ok());
    let parents: Vec<_> = parent.iter().collect();
    repo.commit(Some("HEAD"), signature, signature, message, &tree, &parents)
        .unwrap()
}

/// Commit onto `refname` without touching the index or working tree.
fn commit_to_ref(
    repo: &Repository,
    refname: &str,
    files: &[(&str, &str)],
    message: &str,
    signature: &Signature<'_>,
) -> Oid {
    let parent = repo
        .find_reference(refname)
        .ok()
        .and_then(|r| r.peel_to_commit().ok());
    let base_tree = parent.as_ref().map(|p| p.tree().unwrap());
    let mut builder = repo.treebuilder(base_tree.as_ref()).unwrap();
    for (name, content) in files {
        let blob = repo.blob(content.as_bytes()).unwrap();
        builder.insert(*name, blob, 0o100644).unwrap();
    }
    let tree = repo.find_tree(builder.write().unwrap()).unwrap();
    let parents: Vec<_> = parent.iter().collect();
    repo.commit(Some(refname), signature, signature, message, &tree, &parents)
        .unwrap()
}

fn head_branch(repo: &Repository) -> String {
    repo.head().unwrap().shorthand().unwrap().to_string()
}

fn now() -> DateTime<Utc> {
    Utc::now()
}

#[test]
fn test_not_a_repository() {
    let temp_dir = TempDir::new().unwrap();
    let result = inspect_repo(temp_dir.path(), &ScanOptions::default());
    assert!(matches!(result, Err(Error::NotARepository(_))));
}

#[test]
fn test_subdirectory_is_not_a_repository_root() {
    let (temp_dir, _repo) = setup_test_repo();
    let sub = temp_dir.path().join("src");
    fs::create_dir_all(&sub).unwrap();
    assert!(matches!(
        inspect_repo(&sub, &ScanOptions::default()),
        Err(Error::NotARepository(_))
    ));
}

#[test]
fn test_empty_repo_with_untracked_files() {
    let (temp_dir, _repo) = setup_test_repo();
    fs::write(temp_dir.path().join("a.txt"), "a\n").unwrap();
    fs::write(temp_dir.path().join("b.txt"), "b\n").unwrap();

    let status = inspect_repo(temp_dir.path(), &ScanOptions::default()).unwrap();

    assert_eq!(status.last_commit_ago, "");
    assert_eq!(status.dirty_files, 0);
    assert_eq!(status.staged_files, 0);
    assert_eq!(status.untracked_files, 2);
    assert_eq!(status.stash_count, 0);
    assert_eq!((status.ahead, status.behind), (0, 0));
    assert!(status.recent_commits.is_empty());
    assert!(status.recent_branches.is_empty());
    assert!(status.agent_sessions.is_empty());
    assert_ne!(status.current_branch, DETACHED_HEAD);

    let mut paths: Vec<_> = status.changed_files.iter().map(|f| f.path.as_str()).collect();
    paths.sort();
    assert_eq!(paths, vec!["a.txt", "b.txt"]);
    for change in &status.changed_files {
        assert_eq!(change.status, FileStatus::Untracked);
        assert_eq!(change.stage, Stage::Untracked);
        assert_eq!(change.insertions, None);
    }
}

#[test]
fn test_name_and_path_are_canonical() {
    let (temp_dir, _repo) = setup_test_repo();
    let status = inspect_repo(temp_dir.path(), &ScanOptions::default()).unwrap();
    let canonical = temp_dir.path().canonicalize().unwrap();
    assert_eq!(status.path, canonical.to_string_lossy());
    assert_eq!(
        status.name,
        canonical.file_name().unwrap().to_string_lossy().to_string()
    );
}

#[test]
fn test_recent_commit_with_author_filter() {
    let (temp_dir, repo) = setup_test_repo();
    let now = now();
    let when = (now - Duration::minutes(30)).timestamp();
    commit_to_head(&repo, &[("a.txt", "hello\n")], "Add a", &signature_at("Alice", when));

    let options = ScanOptions {
        author: "alice".to_string(),
        ..ScanOptions::default()
    };
    let status = inspect_repo_at(temp_dir.path(), &options, now).unwrap();

    assert_eq!(status.recent_commits.len(), 1);
    let commit = &status.recent_commits[0];
    assert_eq!(commit.ago, "30m ago");
    assert_eq!(commit.message, "Add a");
    assert_eq!(commit.sha.len(), 7);
    assert_eq!(commit.timestamp, when);
    assert_eq!(commit.files, vec!["a.txt".to_string()]);
    assert_eq!(status.last_commit_ago, "30m ago");
}

#[test]
fn test_author_filter_skips_other_authors() {
    let (temp_dir, repo) = setup_test_repo();
    let now = now();
    let ts = |minutes: i64| (now - Duration::minutes(minutes)).timestamp();
    commit_to_head(&repo, &[("a", "1")], "by alice 1", &signature_at("Alice", ts(50)));
    commit_to_head(&repo, &[("b", "1")], "by bob", &signature_at("Bob", ts(40)));
    commit_to_head(&repo, &[("c", "1")], "by alice 2", &signature_at("ALICE Smith", ts(30)));

    let options = ScanOptions {
        author: "Alice".to_string(),
        ..ScanOptions::default()
    };
    let status = inspect_repo_at(temp_dir.path(), &options, now).unwrap();
    let messages: Vec<_> = status.recent_commits.iter().map(|c| c.message.as_str()).collect();
    assert_eq!(messages, vec!["by alice 2", "by alice 1"]);

    let unfiltered = inspect_repo_at(temp_dir.path(), &ScanOptions::default(), now).unwrap();
    assert_eq!(unfiltered.recent_commits.len(), 3);
}

#[test]
fn test_recent_commits_stop_at_first_old_commit() {
    let (temp_dir, repo) = setup_test_repo();
    let now = now();
    let ts = |hours: i64| (now - Duration::hours(hours)).timestamp();
    commit_to_head(&repo, &[("a", "1")], "ancient", &signature_at("Alice", ts(72)));
    commit_to_head(&repo, &[("b", "1")], "yesterday", &signature_at("Alice", ts(30)));
    commit_to_head(&repo, &[("c", "1")], "today", &signature_at("Alice", ts(2)));

    let status = inspect_repo_at(temp_dir.path(), &ScanOptions::default(), now).unwrap();
    assert_eq!(status.recent_commits.len(), 1);
    assert_eq!(status.recent_commits[0].message, "today");
    assert_eq!(status.recent_commits[0].ago, "2h ago");
}

#[test]
fn test_recent_commits_capped_at_fifty() {
    let (temp_dir, repo) = setup_test_repo();
    let now = now();
    for i in 0..60 {
        let when = (now - Duration::minutes(120 - i)).timestamp();
        let name = format!("f{}.txt", i);
        commit_to_head(&repo, &[(name.as_str(), "x\n")], &format!("change {}", i), &signature_at("Alice", when));
    }

    let status = inspect_repo_at(temp_dir.path(), &ScanOptions::default(), now).unwrap();
    assert_eq!(status.recent_commits.len(), 50);
    assert_eq!(status.recent_commits[0].message, "change 59");
    assert_eq!(status.recent_commits[49].message, "change 10");
}

#[test]
fn test_filtered_commits_count_toward_cap() {
    let (temp_dir, repo) = setup_test_repo();
    let now = now();
    let ts = |minutes: i64| (now - Duration::minutes(minutes)).timestamp();
    for i in 0..30 {
        let name = format!("alice_{}.txt", i);
        commit_to_head(&repo, &[(name.as_str(), "a\n")], "by alice", &signature_at("Alice", ts(200 - i)));
    }
    for i in 0..30 {
        let name = format!("bob_{}.txt", i);
        commit_to_head(&repo, &[(name.as_str(), "b\n")], "by bob", &signature_at("Bob", ts(100 - i)));
    }

    let options = ScanOptions {
        author: "alice".to_string(),
        ..ScanOptions::default()
    };
    let status = inspect_repo_at(temp_dir.path(), &options, now).unwrap();
    // 30 commits by Bob use up part of the 50 examined
    assert_eq!(status.recent_commits.len(), 20);
    assert!(status.recent_commits.iter().all(|c| c.message == "by alice"));
}

#[test]
fn test_commit_body_and_file_cap() {
    let (temp_dir, repo) = setup_test_repo();
    let now = now();
    let names: Vec<String> = (0..25).map(|i| format!("file_{:02}.txt", i)).collect();
    let files: Vec<(&str, &str)> = names.iter().map(|n| (n.as_str(), "x\n")).collect();
    commit_to_head(
        &repo,
        &files,
        "Add many files\n\nFirst body line\nSecond body line\n",
        &signature_at("Alice", now.timestamp() - 10),
    );

    let status = inspect_repo_at(temp_dir.path(), &ScanOptions::default(), now).unwrap();
    let commit = &status.recent_commits[0];
    assert_eq!(commit.message, "Add many files");
    assert_eq!(commit.body, "First body line\nSecond body line");
    assert_eq!(commit.files.len(), 20);
    assert_eq!(commit.ago, "just now");
}

#[test]
fn test_staged_unstaged_and_untracked_changes() {
    let (temp_dir, repo) = setup_test_repo();
    let now = now();
    commit_to_head(
        &repo,
        &[("tracked.txt", "one\ntwo\n"), ("gone.txt", "bye\n")],
        "Initial",
        &signature_at("Alice", now.timestamp() - 3600),
    );

    // Unstaged: modify tracked.txt, delete gone.txt
    fs::write(temp_dir.path().join("tracked.txt"), "one\ntwo\nthree\nfour\n").unwrap();
    fs::remove_file(temp_dir.path().join("gone.txt")).unwrap();

    // Staged: a brand-new file
    fs::write(temp_dir.path().join("new.txt"), "a\nb\nc\n").unwrap();
    let mut index = repo.index().unwrap();
    index.add_path(Path::new("new.txt")).unwrap();
    index.write().unwrap();

    // Untracked, inside a directory
    fs::create_dir_all(temp_dir.path().join("notes")).unwrap();
    fs::write(temp_dir.path().join("notes").join("todo.md"), "- x\n").unwrap();

    let status = inspect_repo_at(temp_dir.path(), &ScanOptions::default(), now).unwrap();
    assert_eq!(status.dirty_files, 2);
    assert_eq!(status.staged_files, 1);
    assert_eq!(status.untracked_files, 1);
    assert_eq!(status.last_commit_ago, "1h ago");

    let find = |path: &str, stage: Stage| {
        status
            .changed_files
            .iter()
            .find(|f| f.path == path && f.stage == stage)
            .unwrap_or_else(|| panic!("missing {} ({})", path, stage))
    };

    let tracked = find("tracked.txt", Stage::Unstaged);
    assert_eq!(tracked.status, FileStatus::Modified);
    assert_eq!((tracked.insertions, tracked.deletions), (Some(2), Some(0)));

    let gone = find("gone.txt", Stage::Unstaged);
    assert_eq!(gone.status, FileStatus::Deleted);
    assert_eq!((gone.insertions, gone.deletions), (Some(0), Some(1)));

    let new = find("new.txt", Stage::Staged);
    assert_eq!(new.status, FileStatus::Added);
    assert_eq!((new.insertions, new.deletions), (Some(3), Some(0)));

    let todo = find("notes/todo.md", Stage::Untracked);
    assert_eq!(todo.status, FileStatus::Untracked);
    assert_eq!(todo.insertions, None);

    assert_eq!(status.changed_files.len(), 4);
}

#[test]
fn test_binary_changes_report_zero_stats() {
    let (temp_dir, repo) = setup_test_repo();
    commit_to_head(&repo, &[("blob.bin", "start\n")], "Initial", &signature_at("Alice", 1_000));
    fs::write(temp_dir.path().join("blob.bin"), [0u8, 159, 146, 150, 0, 1, 2, 3]).unwrap();

    let status = inspect_repo(temp_dir.path(), &ScanOptions::default()).unwrap();
    let change = status
        .changed_files
        .iter()
        .find(|f| f.path == "blob.bin")
        .unwrap();
    assert_eq!(change.stage, Stage::Unstaged);
    assert_eq!((change.insertions, change.deletions), (Some(0), Some(0)));
}

#[test]
fn test_stash_entries() {
    let (temp_dir, mut repo) = setup_test_repo();
    let sig = signature_at("Alice", 1_000);
    commit_to_head(&repo, &[("a.txt", "one\n")], "Initial", &sig);

    fs::write(temp_dir.path().join("a.txt"), "two\n").unwrap();
    repo.stash_save(&sig, "first stash", None).unwrap();
    fs::write(temp_dir.path().join("a.txt"), "three\n").unwrap();
    repo.stash_save(&sig, "second stash", None).unwrap();

    let status = inspect_repo(temp_dir.path(), &ScanOptions::default()).unwrap();
    assert_eq!(status.stash_count, 2);
    assert!(status.stash_entries[0].starts_with("stash@{0}: "));
    assert!(status.stash_entries[0].contains("second stash"));
    assert!(status.stash_entries[1].starts_with("stash@{1}: "));
    assert!(status.stash_entries[1].contains("first stash"));
    assert_eq!(status.dirty_files, 0);
}

#[test]
fn test_ahead_behind_upstream() {
    let (temp_dir, repo) = setup_test_repo();
    let sig = signature_at("Alice", 1_000);
    let base = commit_to_head(&repo, &[("a.txt", "1\n")], "Base", &sig);
    let branch = head_branch(&repo);

    repo.remote("origin", "https://example.invalid/repo.git").unwrap();
    let remote_ref = format!("refs/remotes/origin/{}", branch);
    repo.reference(&remote_ref, base, true, "test upstream").unwrap();
    commit_to_ref(&repo, &remote_ref, &[("remote.txt", "r\n")], "Remote work", &sig);

    commit_to_head(&repo, &[("b.txt", "2\n")], "Local 1", &sig);
    commit_to_head(&repo, &[("c.txt", "3\n")], "Local 2", &sig);

    let mut local = repo.find_branch(&branch, git2::BranchType::Local).unwrap();
    local
        .set_upstream(Some(&format!("origin/{}", branch)))
        .unwrap();

    let status = inspect_repo(temp_dir.path(), &ScanOptions::default()).unwrap();
    assert_eq!((status.ahead, status.behind), (2, 1));
}

#[test]
fn test_no_upstream_is_zero() {
    let (temp_dir, repo) = setup_test_repo();
    commit_to_head(&repo, &[("a.txt", "1\n")], "Base", &signature_at("Alice", 1_000));
    let status = inspect_repo(temp_dir.path(), &ScanOptions::default()).unwrap();
    assert_eq!((status.ahead, status.behind), (0, 0));
}

#[test]
fn test_detached_head() {
    let (temp_dir, repo) = setup_test_repo();
    let sig = signature_at("Alice", 1_000);
    let first = commit_to_head(&repo, &[("a.txt", "1\n")], "One", &sig);
    commit_to_head(&repo, &[("a.txt", "2\n")], "Two", &sig);
    repo.set_head_detached(first).unwrap();
    repo.checkout_head(Some(git2::build::CheckoutBuilder::new().force()))
        .unwrap();

    let status = inspect_repo(temp_dir.path(), &ScanOptions::default()).unwrap();
    assert_eq!(status.current_branch, DETACHED_HEAD);
    assert_eq!((status.ahead, status.behind), (0, 0));
    // The abandoned branch now counts as another branch, but its tip is too old.
    assert_eq!(status.recent_branches.len(), 0);
}

#[test]
fn test_recent_branches_window_and_order() {
    let (temp_dir, repo) = setup_test_repo();
    let now = now();
    let ts = |days: i64| (now - Duration::days(days)).timestamp();
    commit_to_head(&repo, &[("a.txt", "1\n")], "Base", &signature_at("Alice", ts(1)));

    commit_to_ref(&repo, "refs/heads/ancient", &[("x", "1")], "old", &signature_at("Alice", ts(30)));
    commit_to_ref(&repo, "refs/heads/week", &[("y", "1")], "week", &signature_at("Alice", ts(7)));
    commit_to_ref(&repo, "refs/heads/fresh", &[("z", "1")], "fresh", &signature_at("Alice", ts(2)));

    let status = inspect_repo_at(temp_dir.path(), &ScanOptions::default(), now).unwrap();
    let names: Vec<_> = status.recent_branches.iter().map(|b| b.name.as_str()).collect();
    assert_eq!(names, vec!["fresh", "week"]);
    assert_eq!(status.recent_branches[0].last_commit_ago, "2d ago");

    let narrow = ScanOptions {
        recent_days: 3,
        ..ScanOptions::default()
    };
    let status = inspect_repo_at(temp_dir.path(), &narrow, now).unwrap();
    let names: Vec<_> = status.recent_branches.iter().map(|b| b.name.as_str()).collect();
    assert_eq!(names, vec!["fresh"]);
}

#[test]
fn test_agent_branch_session() {
    let (temp_dir, repo) = setup_test_repo();
    let now = now();
    let ts = |minutes: i64| (now - Duration::minutes(minutes)).timestamp();
    let base = commit_to_head(&repo, &[("a.txt", "1\n")], "Human work", &signature_at("Alice", ts(300)));

    repo.reference("refs/heads/claude/fix-bug", base, true, "branch").unwrap();
    for (i, minutes) in [(1, 120), (2, 90), (3, 45)] {
        let name = format!("fix_{}.rs", i);
        commit_to_ref(
            &repo,
            "refs/heads/claude/fix-bug",
            &[(name.as_str(), "fn main() {}\n")],
            &format!("Fix part {}", i),
            &signature_at("ci-bot", ts(minutes)),
        );
    }

    // "ci-bot" must not be an author match for this scenario.
    let options = ScanOptions {
        agents: AgentsConfig {
            authors: vec!["claude".to_string(), "copilot".to_string()],
            ..AgentsConfig::default()
        },
        ..ScanOptions::default()
    };
    let status = inspect_repo_at(temp_dir.path(), &options, now).unwrap();

    assert_eq!(status.agent_sessions.len(), 1);
    let session = &status.agent_sessions[0];
    assert_eq!(session.agent, "claude");
    assert_eq!(session.branch, "claude/fix-bug");
    assert_eq!(session.commit_count, 3);
    assert_eq!(session.files_changed, 3);
    assert_eq!(session.last_commit_ago, "45m ago");
    assert_eq!(session.first_commit_ago, "2h ago");
    assert_eq!(session.status, SessionStatus::Active);
}

#[test]
fn test_agent_branch_ends_at_commit_by_configured_user() {
    let (temp_dir, repo) = setup_test_repo();
    let now = now();
    let ts = |minutes: i64| (now - Duration::minutes(minutes)).timestamp();
    let base = commit_to_head(&repo, &[("a.txt", "1\n")], "Human work", &signature_at("Alice", ts(300)));

    repo.reference("refs/heads/claude/tweak", base, true, "branch").unwrap();
    commit_to_ref(&repo, "refs/heads/claude/tweak", &[("x.rs", "1\n")], "agent", &signature_at("ci-bot", ts(60)));
    commit_to_ref(&repo, "refs/heads/claude/tweak", &[("y.rs", "1\n")], "review", &signature_at("Alice", ts(30)));

    let options = ScanOptions {
        author: "alice".to_string(),
        agents: AgentsConfig {
            authors: vec!["claude".to_string()],
            ..AgentsConfig::default()
        },
        ..ScanOptions::default()
    };
    let status = inspect_repo_at(temp_dir.path(), &options, now).unwrap();
    assert!(status.agent_sessions.is_empty());

    // Without a configured user the same commit is credited to the branch.
    let anonymous = ScanOptions {
        author: String::new(),
        ..options
    };
    let status = inspect_repo_at(temp_dir.path(), &anonymous, now).unwrap();
    assert_eq!(status.agent_sessions.len(), 1);
    assert_eq!(status.agent_sessions[0].commit_count, 2);
}

#[test]
fn test_agent_author_on_main_branch() {
    let (temp_dir, repo) = setup_test_repo();
    let now = now();
    let ts = |hours: i64| (now - Duration::hours(hours)).timestamp();
    commit_to_head(&repo, &[("a", "1")], "human", &signature_at("Alice", ts(10)));
    commit_to_head(&repo, &[("b", "1"), ("c", "1")], "agent", &signature_at("Claude", ts(5)));
    commit_to_head(&repo, &[("d", "1")], "human again", &signature_at("Alice", ts(3)));

    let status = inspect_repo_at(temp_dir.path(), &ScanOptions::default(), now).unwrap();
    assert_eq!(status.agent_sessions.len(), 1);
    let session = &status.agent_sessions[0];
    assert_eq!(session.agent, "claude");
    assert_eq!(session.branch, head_branch(&repo));
    assert_eq!(session.commit_count, 1);
    assert_eq!(session.files_changed, 2);
    assert_eq!(session.status, SessionStatus::Recent);
}

#[tokio::test]
async fn test_scan_keeps_input_order_and_skips_invalid() {
    let (first_dir, first) = setup_test_repo();
    let (second_dir, second) = setup_test_repo();
    let not_a_repo = TempDir::new().unwrap();
    commit_to_head(&first, &[("a", "1")], "one", &signature_at("Alice", 1_000));
    commit_to_head(&second, &[("b", "1")], "two", &signature_at("Alice", 1_000));

    let paths = vec![
        second_dir.path().to_path_buf(),
        not_a_repo.path().to_path_buf(),
        first_dir.path().to_path_buf(),
    ];
    let results = scan::scan_repos_with_limit(paths, ScanOptions::default(), 2).await;

    let expected: Vec<String> = [&second_dir, &first_dir]
        .iter()
        .map(|d| d.path().canonicalize().unwrap().to_string_lossy().into_owned())
        .collect();
    let got: Vec<String> = results.into_iter().map(|r| r.path).collect();
    assert_eq!(got, expected);
}
