use std::path::PathBuf;
use thiserror::Error;

use crate::llm::LlmError;

/// Errors surfaced by the library.
///
/// Scanning swallows most git failures itself; what reaches callers is
/// either a whole repository being unusable or a command-level failure.
#[derive(Debug, Error)]
pub enum Error {
    #[error("not a git repository: {}", .0.display())]
    NotARepository(PathBuf),

    #[error("git error: {0}")]
    Git(#[from] git2::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid config file: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("could not serialize config: {0}")]
    ConfigWrite(#[from] toml::ser::Error),

    /// Something the command needs has not been configured.
    #[error("{0}")]
    ConfigMissing(String),

    #[error("item #{0} not found or already done")]
    ItemNotFound(u64),

    #[error(transparent)]
    Llm(#[from] LlmError),
}

pub type Result<T> = std::result::Result<T, Error>;
