use async_stream::try_stream;
use async_trait::async_trait;
use reqwest::Response;
use serde_json::{json, Value};

use super::sse::{check_status, data_lines, http_client, with_deadline};
use super::{LlmError, ProviderKind, TextBackend, TextStream};

pub const DEFAULT_MODEL: &str = "gpt-4o";

const API_URL: &str = "https://api.openai.com/v1/chat/completions";
const STREAM_DONE: &str = "[DONE]";

/// OpenAI Chat Completions API.
pub struct OpenAiBackend {
    client: reqwest::Client,
    api_key: String,
    model: String,
}

impl OpenAiBackend {
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
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": user },
            ],
            "stream": stream,
        })
    }

    async fn send(&self, system: &str, user: &str, stream: bool) -> Result<Response, LlmError> {
        let request = self
            .client
            .post(API_URL)
            .bearer_auth(&self.api_key)
            .json(&self.request_body(system, user, stream));
        let response = with_deadline(request, stream).send().await?;
        check_status("OpenAI", response).await
    }
}

fn extract_text(response: &Value) -> Result<String, LlmError> {
    response["choices"][0]["message"]["content"]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| LlmError::Backend("OpenAI response has no message content".to_string()))
}

fn parse_stream_chunk(data: &str) -> Result<Option<String>, LlmError> {
    let chunk: Value = serde_json::from_str(data)
        .map_err(|e| LlmError::Backend(format!("malformed OpenAI chunk: {}", e)))?;
    if let Some(message) = chunk["error"]["message"].as_str() {
        return Err(LlmError::Backend(format!("OpenAI: {}", message)));
    }
    Ok(chunk["choices"][0]["delta"]["content"]
        .as_str()
        .filter(|text| !text.is_empty())
        .map(str::to_string))
}

#[async_trait]
impl TextBackend for OpenAiBackend {
    fn kind(&self) -> ProviderKind {
        ProviderKind::OpenAi
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
        let chunks = data_lines(response);

        Ok(Box::pin(try_stream! {
            for await data in chunks {
                let data = data?;
                if data == STREAM_DONE {
                    break;
                }
                if let Some(text) = parse_stream_chunk(&data)? {
                    yield text;
                }
            }
        }))
    }
}
