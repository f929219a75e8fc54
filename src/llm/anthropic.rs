use async_stream::try_stream;
use async_trait::async_trait;
use reqwest::Response;
use serde_json::{json, Value};

use super::sse::{check_status, data_lines, http_client, with_deadline};
use super::{LlmError, ProviderKind, TextBackend, TextStream};

pub const DEFAULT_MODEL: &str = "claude-sonnet-4-5-20250929";

const API_URL: &str = "https://api.anthropic.com/v1/messages";
const API_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 1024;

/// Anthropic Messages API.
pub struct AnthropicBackend {
    client: reqwest::Client,
    api_key: String,
    model: String,
}

impl AnthropicBackend {
    pub fn new(api_key: String, model: String) -> Result<Self, LlmError> {
        Ok(Self {
            client: http_client()?,
            api_key,
            model,
        })
    }

    fn request_body(&self, system: &str, user: &str, stream: bool) -> Value {
        json!({
            "model": self.model,
            "max_tokens": MAX_TOKENS,
            "system": system,
            "messages": [{ "role": "user", "content": user }],
            "stream": stream,
        })
    }

    async fn send(&self, system: &str, user: &str, stream: bool) -> Result<Response, LlmError> {
        let request = self
            .client
            .post(API_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&self.request_body(system, user, stream));
        let response = with_deadline(request, stream).send().await?;
        check_status("Anthropic", response).await
    }
}

/// Concatenated text blocks of a complete response.
fn extract_text(response: &Value) -> Result<String, LlmError> {
    let blocks = response["content"]
        .as_array()
        .ok_or_else(|| LlmError::Backend("Anthropic response has no content".to_string()))?;
    Ok(blocks
        .iter()
        .filter(|block| block["type"] == "text")
        .filter_map(|block| block["text"].as_str())
        .collect())
}

/// Text carried by one streaming event, if any.
fn parse_stream_event(data: &str) -> Result<Option<String>, LlmError> {
    let event: Value = serde_json::from_str(data)
        .map_err(|e| LlmError::Backend(format!("malformed Anthropic event: {}", e)))?;

    match event["type"].as_str() {
        Some("content_block_delta") => Ok(event["delta"]["text"].as_str().map(str::to_string)),
        Some("error") => {
            let message = event["error"]["message"].as_str().unwrap_or("unknown error");
            Err(match event["error"]["type"].as_str() {
                Some("authentication_error") | Some("permission_error") => {
                    LlmError::Auth(format!("Anthropic: {}", message))
                }
                Some("rate_limit_error") => LlmError::RateLimit(format!("Anthropic: {}", message)),
                _ => LlmError::Backend(format!("Anthropic: {}", message)),
            })
        }
        _ => Ok(None),
    }
}

#[async_trait]
impl TextBackend for AnthropicBackend {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Anthropic
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn respond(&self, system: &str, user: &str) -> Result<String, LlmError> {
        let response = self.send(system, user, false).await?;
        let value: Value = response.json().await?;
        extract_text(&value)
    }

    async fn respond_streaming(&self, system: &str, user: &str) -> Result<TextStream, LlmError> {
        let response = self.send(system, user, true).await?;
        let events = data_lines(response);

        Ok(Box::pin(try_stream! {
            for await data in events {
                if let Some(text) = parse_stream_event(&data?)? {
                    yield text;
                }
            }
        }))
    }
}
