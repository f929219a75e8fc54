/// Benchmarks for repository discovery and inspection.
/// Measures a single inspection and a concurrent scan over several repositories.
use criterion::{criterion_group, criterion_main, Criterion};
use git2::{Repository, Signature};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tokio::runtime::Runtime;
use wip::analysis::{discover_repos, inspect_repo, scan_repos, ScanOptions};

/// Create a repository with `commits` commits, an agent branch and some
/// uncommitted work.
fn setup_bench_repo(path: &Path, commits: usize) {
    fs::create_dir_all(path).unwrap();
    let repo = Repository::init(path).unwrap();

    for i in 0..commits {
        let file_name = format!("file_{}.txt", i % 20);
        let content = format!("Content for revision {}\n", i);
        fs::write(path.join(&file_name), content).unwrap();

        let mut index = repo.index().unwrap();
        index.add_path(Path::new(&file_name)).unwrap();
        index.write().unwrap();

        let tree_id = index.write_tree().unwrap();
        let parent = repo.head().ok().and_then(|head| head.peel_to_commit().ok());
        let parents: Vec<_> = parent.iter().collect();

        // Alternate between a human and an agent author
        let author = if i % 3 == 0 {
            Signature::now("claude", "agent@example.com").unwrap()
        } else {
            Signature::now("Test User", "test@example.com").unwrap()
        };

        let tree = repo.find_tree(tree_id).unwrap();
        repo.commit(
            Some("HEAD"),
            &author,
            &author,
            &format!("Update {}", file_name),
            &tree,
            &parents,
        )
        .unwrap();
    }

    let head = repo.head().unwrap().peel_to_commit().unwrap();
    repo.branch("claude/refactor", &head, false).unwrap();

    fs::write(path.join("file_0.txt"), "uncommitted\n").unwrap();
    fs::write(path.join("scratch.txt"), "untracked\n").unwrap();
}

fn setup_workspace(repos: usize, commits: usize) -> (TempDir, Vec<PathBuf>) {
    let temp_dir = TempDir::new().unwrap();
    for i in 0..repos {
        setup_bench_repo(&temp_dir.path().join(format!("repo_{}", i)), commits);
    }
    let root = temp_dir.path().to_string_lossy().into_owned();
    let paths = discover_repos(&[root], 2);
    (temp_dir, paths)
}

/// Benchmark inspecting one repository
fn bench_inspection(c: &mut Criterion) {
    let mut group = c.benchmark_group("inspection");
    let (_temp_dir, paths) = setup_workspace(1, 100);
    let options = ScanOptions::default();

    group.bench_function("inspect_single_repo", |b| {
        b.iter(|| inspect_repo(&paths[0], &options).unwrap())
    });

    let filtered = ScanOptions {
        author: "Test User".to_string(),
        ..ScanOptions::default()
    };
    group.bench_function("inspect_with_author_filter", |b| {
        b.iter(|| inspect_repo(&paths[0], &filtered).unwrap())
    });

    group.finish();
}

/// Benchmark the concurrent scan over many repositories
fn bench_scan(c: &mut Criterion) {
    let mut group = c.benchmark_group("scan");
    let rt = Runtime::new().unwrap();
    let (temp_dir, paths) = setup_workspace(8, 40);

    group.bench_function("discover_repos", |b| {
        let root = temp_dir.path().to_string_lossy().into_owned();
        b.iter(|| discover_repos(&[root.as_str()], 2))
    });

    group.bench_function("scan_eight_repos", |b| {
        b.iter(|| rt.block_on(scan_repos(paths.clone(), ScanOptions::default())))
    });

    group.finish();
}

criterion_group!(
    name = benches;
    config = Criterion::default().sample_size(20);
    targets = bench_inspection, bench_scan
);
criterion_main!(benches);
