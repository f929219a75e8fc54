pub mod agents;
pub mod discovery;
pub mod git;
pub mod scan;

pub use agents::{detect_agent_sessions, Attribution};
pub use discovery::{discover_current_repo, discover_repos};
pub use git::{inspect_repo, inspect_repo_at, ScanOptions};
pub use scan::scan_repos;

#[cfg(test)]
mod tests;
