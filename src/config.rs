//! Configuration stored in `~/.wip/config.toml`.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::Result;

pub const DEFAULT_SCAN_DEPTH: usize = 3;
pub const DEFAULT_RECENT_DAYS: u32 = 14;

const DEFAULT_AGENT_AUTHORS: &[&str] = &[
    "claude",
    "copilot",
    "cursor",
    "devin",
    "codex",
    "github-actions",
    "bot",
];

const DEFAULT_BRANCH_PATTERNS: &[&str] = &["agent/", "claude/", "copilot/", "devin/", "cursor/"];

/// Directory holding the config file and the work list.
pub fn wip_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".wip")
}

pub fn config_path() -> PathBuf {
    wip_dir().join("config.toml")
}

/// Inputs for classifying commits as agent work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentsConfig {
    /// Case-insensitive substrings of an author name
    pub authors: Vec<String>,
    /// Branch-name prefixes such as `claude/`
    pub branch_patterns: Vec<String>,
}

impl Default for AgentsConfig {
    fn default() -> Self {
        Self {
            authors: DEFAULT_AGENT_AUTHORS.iter().map(|s| s.to_string()).collect(),
            branch_patterns: DEFAULT_BRANCH_PATTERNS
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl AgentsConfig {
    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }
}

/// Text-generation backend selection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub provider: String,
    /// Provider default when empty
    #[serde(skip_serializing_if = "String::is_empty")]
    pub model: String,
    /// Name of the environment variable holding the API key
    #[serde(alias = "api_key_env_var", skip_serializing_if = "String::is_empty")]
    pub api_key_env: String,
}

impl LlmConfig {
    pub fn is_unset(&self) -> bool {
        self.provider.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub directories: Vec<String>,
    pub author: String,
    pub scan_depth: usize,
    pub recent_days: u32,
    #[serde(skip_serializing_if = "LlmConfig::is_unset")]
    pub llm: LlmConfig,
    #[serde(skip_serializing_if = "AgentsConfig::is_default")]
    pub agents: AgentsConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            directories: Vec::new(),
            author: String::new(),
            scan_depth: DEFAULT_SCAN_DEPTH,
            recent_days: DEFAULT_RECENT_DAYS,
            llm: LlmConfig::default(),
            agents: AgentsConfig::default(),
        }
    }
}

impl Config {
    /// Load from the default location.
    pub fn load() -> Result<Self> {
        Self::load_from(&config_path())
    }

    /// Load from `path`; a missing file yields the defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("no config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let text = fs::read_to_string(path)?;
        Ok(toml::from_str(&text)?)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&config_path())
    }

    /// Rewrite the whole file at `path`, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml::to_string(self)?)?;
        Ok(())
    }
}

/// `user.name` from the user's git configuration, or empty.
pub fn detect_author_name() -> String {
    git2::Config::open_default()
        .and_then(|config| config.get_string("user.name"))
        .map(|name| name.trim().to_string())
        .unwrap_or_default()
}
