//! Text-generation backends.
//!
//! Backends are a closed set ([`ProviderKind`]) behind one capability trait
//! ([`TextBackend`]). Every backend reports failures through [`LlmError`] so
//! callers see the same auth / rate-limit / generic split regardless of the
//! provider.

mod anthropic;
mod gemini;
mod openai;
pub mod prompts;
mod sse;

use async_trait::async_trait;
use futures::Stream;
use std::fmt;
use std::pin::Pin;
use std::str::FromStr;
use thiserror::Error;

pub use anthropic::AnthropicBackend;
pub use gemini::GeminiBackend;
pub use openai::OpenAiBackend;

/// Environment variable consulted when the provider-specific one is unset.
pub const GENERIC_API_KEY_ENV: &str = "WIP_LLM_API_KEY";

#[derive(Debug, Error)]
pub enum LlmError {
    /// The API key was rejected
    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("rate limit exceeded: {0}")]
    RateLimit(String),

    #[error("backend error: {0}")]
    Backend(String),

    /// Missing credential or other setup problem
    #[error("{0}")]
    Config(String),

    #[error("unknown provider '{name}'. Available: {available}")]
    UnknownProvider { name: String, available: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Lazily produced response fragments. Finite and not restartable; dropping
/// it closes the underlying connection.
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String, LlmError>> + Send>>;

#[async_trait]
pub trait TextBackend: Send + Sync {
    fn kind(&self) -> ProviderKind;

    fn model(&self) -> &str;

    /// Full response text for one system/user prompt pair.
    async fn respond(&self, system: &str, user: &str) -> Result<String, LlmError>;

    /// Response text as it is generated.
    async fn respond_streaming(&self, system: &str, user: &str) -> Result<TextStream, LlmError>;
}

/// Registered backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Anthropic,
    OpenAi,
    Gemini,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 3] = [Self::Anthropic, Self::OpenAi, Self::Gemini];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Anthropic => "anthropic",
            Self::OpenAi => "openai",
            Self::Gemini => "gemini",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            Self::Anthropic => anthropic::DEFAULT_MODEL,
            Self::OpenAi => openai::DEFAULT_MODEL,
            Self::Gemini => gemini::DEFAULT_MODEL,
        }
    }

    /// Provider-specific variable holding the API key.
    pub fn api_key_env(&self) -> &'static str {
        match self {
            Self::Anthropic => "ANTHROPIC_API_KEY",
            Self::OpenAi => "OPENAI_API_KEY",
            Self::Gemini => "GEMINI_API_KEY",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ProviderKind {
    type Err = LlmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|kind| kind.name() == wanted)
            .ok_or_else(|| LlmError::UnknownProvider {
                name: s.to_string(),
                available: list_providers().join(", "),
            })
    }
}

pub fn list_providers() -> Vec<&'static str> {
    ProviderKind::ALL.iter().map(|kind| kind.name()).collect()
}

/// Resolve the API key: explicit value, then the provider variable (or the
/// configured override of its name), then [`GENERIC_API_KEY_ENV`].
pub fn resolve_api_key(
    kind: ProviderKind,
    explicit: Option<&str>,
    env_var: Option<&str>,
) -> Result<String, LlmError> {
    resolve_api_key_with(kind, explicit, env_var, |name| std::env::var(name).ok())
}

fn resolve_api_key_with<F>(
    kind: ProviderKind,
    explicit: Option<&str>,
    env_var: Option<&str>,
    lookup: F,
) -> Result<String, LlmError>
where
    F: Fn(&str) -> Option<String>,
{
    let env_var = env_var
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| kind.api_key_env());

    explicit
        .map(str::to_string)
        .filter(|key| !key.is_empty())
        .or_else(|| lookup(env_var).filter(|key| !key.is_empty()))
        .or_else(|| lookup(GENERIC_API_KEY_ENV).filter(|key| !key.is_empty()))
        .ok_or_else(|| {
            LlmError::Config(format!(
                "No API key found for '{}'. Set {} or {}, or configure via `wip config init`.",
                kind, env_var, GENERIC_API_KEY_ENV
            ))
        })
}

/// Build the backend registered under `provider`.
///
/// An empty `model` selects the provider default.
pub fn get_provider(
    provider: &str,
    api_key: Option<&str>,
    model: &str,
    api_key_env: Option<&str>,
) -> Result<Box<dyn TextBackend>, LlmError> {
    let kind: ProviderKind = provider.parse()?;
    let key = resolve_api_key(kind, api_key, api_key_env)?;
    let model = if model.is_empty() {
        kind.default_model().to_string()
    } else {
        model.to_string()
    };

    Ok(match kind {
        ProviderKind::Anthropic => Box::new(AnthropicBackend::new(key, model)?),
        ProviderKind::OpenAi => Box::new(OpenAiBackend::new(key, model)?),
        ProviderKind::Gemini => Box::new(GeminiBackend::new(key, model)?),
    })
}
