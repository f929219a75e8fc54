use async_stream::try_stream;
use async_trait::async_trait;
use reqwest::Response;
use serde_json::{json, Value};

use super::sse::{check_status, data_lines, http_client, with_deadline};
use super::{LlmError, ProviderKind, TextBackend, TextStream};

pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Google Gemini `generateContent` API.
pub struct GeminiBackend {
    client: reqwest::Client,
    api_key: String,
    model: String,
}

impl GeminiBackend {
    pub fn new(api_key: String, model: String) -> Result<Self, LlmError> {
        Ok(Self {
            client: http_client()?,
            api_key,
            model,
        })
    }

    fn endpoint(&self, stream: bool) -> String {
        if stream {
            format!("{}/{}:streamGenerateContent?alt=sse", API_BASE, self.model)
        } else {
            format!("{}/{}:generateContent", API_BASE, self.model)
        }
    }

    fn request_body(system: &str, user: &str) -> Value {
        json!({
            "systemInstruction": { "parts": [{ "text": system }] },
            "contents": [{ "role": "user", "parts": [{ "text": user }] }],
        })
    }

    async fn send(&self, system: &str, user: &str, stream: bool) -> Result<Response, LlmError> {
        let request = self
            .client
            .post(self.endpoint(stream))
            .header("x-goog-api-key", &self.api_key)
            .json(&Self::request_body(system, user));
        let response = with_deadline(request, stream).send().await?;
        check_status("Gemini", response).await
    }
}

/// Text parts of the first candidate; a streamed chunk has the same shape
/// as a full response.
fn candidate_text(response: &Value) -> Option<String> {
    let parts = response["candidates"][0]["content"]["parts"].as_array()?;
    let text: String = parts.iter().filter_map(|part| part["text"].as_str()).collect();
    Some(text)
}

fn parse_stream_chunk(data: &str) -> Result<Option<String>, LlmError> {
    let chunk: Value = serde_json::from_str(data)
        .map_err(|e| LlmError::Backend(format!("malformed Gemini chunk: {}", e)))?;
    if let Some(message) = chunk["error"]["message"].as_str() {
        return Err(LlmError::Backend(format!("Gemini: {}", message)));
    }
    Ok(candidate_text(&chunk).filter(|text| !text.is_empty()))
}

#[async_trait]
impl TextBackend for GeminiBackend {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Gemini
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn respond(&self, system: &str, user: &str) -> Result<String, LlmError> {
        let value: Value = self.send(system, user, false).await?.json().await?;
        candidate_text(&value)
            .ok_or_else(|| LlmError::Backend("Gemini response has no candidates".to_string()))
    }

    async fn respond_streaming(&self, system: &str, user: &str) -> Result<TextStream, LlmError> {
        let chunks = data_lines(self.send(system, user, true).await?);

        Ok(Box::pin(try_stream! {
            for await data in chunks {
                if let Some(text) = parse_stream_chunk(&data?)? {
                    yield text;
                }
            }
        }))
    }
}
