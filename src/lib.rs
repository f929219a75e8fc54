//! # wip
//!
//! `wip` answers "where did I leave off?" across many local git
//! repositories. It walks the configured directories for repositories,
//! inspects each one concurrently and reports what is unfinished.
//!
//! ## Features
//!
//! - Uncommitted, staged and untracked changes with per-file line stats
//! - Stashes, ahead/behind counts against the upstream branch
//! - Today's commits and recently active branches
//! - Work attributed to coding agents, grouped into sessions
//! - A small persistent list of work-in-progress notes
//! - Briefings, standups and free-form questions answered by an LLM backend
//!
//! ## Example
//!
//! ```no_run
//! use wip::analysis::{discover_repos, scan_repos, ScanOptions};
//! use wip::config::Config;
//!
//! # async fn example() -> wip::Result<()> {
//! let config = Config::load()?;
//! let paths = discover_repos(&config.directories, config.scan_depth);
//! let repos = scan_repos(paths, ScanOptions::from_config(&config)).await;
//! for repo in &repos {
//!     println!("{} ({}): {} dirty", repo.name, repo.current_branch, repo.dirty_total());
//! }
//! # Ok(())
//! # }
//! ```

pub mod analysis;
pub mod app;
pub mod config;
pub mod error;
pub mod llm;
pub mod types;
pub mod utils;
pub mod worklist;

// Re-export main types for convenience
pub use config::Config;
pub use error::{Error, Result};
pub use types::{AgentSession, RepoStatus, WorkItem};
pub use worklist::WorkList;
