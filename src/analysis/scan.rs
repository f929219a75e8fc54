use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::spawn_blocking;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use super::git::{inspect_repo, ScanOptions};
use crate::error::Result;
use crate::types::RepoStatus;

/// Get optimal number of parallel inspections based on system resources
fn get_optimal_task_count() -> usize {
    let cpu_count = num_cpus::get();
    // Use 75% of available CPUs to leave room for other system processes
    (cpu_count * 3 / 4).max(1)
}

/// Inspect every path concurrently and return the snapshots in input order.
///
/// Paths that are not repositories, or whose inspection panics or exceeds
/// `options.timeout`, are left out of the result.
pub async fn scan_repos(paths: Vec<PathBuf>, options: ScanOptions) -> Vec<RepoStatus> {
    scan_repos_with_limit(paths, options, get_optimal_task_count()).await
}

/// [`scan_repos`] with an explicit bound on concurrent inspections.
pub async fn scan_repos_with_limit(
    paths: Vec<PathBuf>,
    options: ScanOptions,
    max_tasks: usize,
) -> Vec<RepoStatus> {
    let limit = options.timeout;
    scan_with(paths, limit, max_tasks, move |path| inspect_repo(path, &options)).await
}

/// Run `inspect` on every path, at most `max_tasks` at a time.
///
/// A scan slot is released only when its inspection returns, so an
/// inspection abandoned after `limit` still counts against `max_tasks`.
pub(crate) async fn scan_with<F>(
    paths: Vec<PathBuf>,
    limit: Duration,
    max_tasks: usize,
    inspect: F,
) -> Vec<RepoStatus>
where
    F: Fn(&Path) -> Result<RepoStatus> + Send + Sync + 'static,
{
    let start_time = Instant::now();
    let total = paths.len();
    let inspect = Arc::new(inspect);
    let semaphore = Arc::new(Semaphore::new(max_tasks.max(1)));
    let mut handles = Vec::with_capacity(total);

    for path in paths {
        let inspect = Arc::clone(&inspect);
        let semaphore = Arc::clone(&semaphore);

        handles.push(tokio::spawn(async move {
            let permit = match semaphore.acquire_owned().await {
                Ok(permit) => permit,
                Err(e) => {
                    warn!("failed to acquire scan slot: {}", e);
                    return None;
                }
            };

            let task_path = path.clone();
            let inspection = spawn_blocking(move || {
                let _permit = permit;
                inspect(&task_path)
            });

            match timeout(limit, inspection).await {
                Ok(Ok(Ok(status))) => Some(status),
                Ok(Ok(Err(e))) => {
                    debug!("skipping {}: {}", path.display(), e);
                    None
                }
                Ok(Err(e)) => {
                    warn!("inspection of {} failed: {}", path.display(), e);
                    None
                }
                Err(_) => {
                    warn!("inspection of {} timed out after {:?}", path.display(), limit);
                    None
                }
            }
        }));
    }

    let mut results = Vec::with_capacity(total);
    for handle in handles {
        match handle.await {
            Ok(Some(status)) => results.push(status),
            Ok(None) => {}
            Err(e) => warn!("scan task join error: {}", e),
        }
    }

    info!(
        "scanned {} of {} repositories in {:.2}s",
        results.len(),
        total,
        start_time.elapsed().as_secs_f64()
    );
    results
}
