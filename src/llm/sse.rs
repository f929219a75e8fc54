//! Helpers shared by the HTTP backends: status mapping and server-sent
//! event decoding.

use async_stream::try_stream;
use futures::{Stream, StreamExt};
use reqwest::{RequestBuilder, Response, StatusCode};
use std::time::Duration;
use tokio::io::AsyncBufReadExt;
use tokio_util::io::StreamReader;

use super::LlmError;

pub(crate) const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
/// Longest silence tolerated between two reads, streaming or not.
pub(crate) const READ_TIMEOUT: Duration = Duration::from_secs(60);
/// Deadline for a complete, non-streaming response.
pub(crate) const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

pub(crate) fn http_client() -> Result<reqwest::Client, LlmError> {
    build_client(READ_TIMEOUT)
}

fn build_client(read_timeout: Duration) -> Result<reqwest::Client, LlmError> {
    Ok(reqwest::Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .read_timeout(read_timeout)
        .build()?)
}

/// Bound a whole request unless its body is streamed; a stream may run
/// longer than any fixed deadline and is bounded per read instead.
pub(crate) fn with_deadline(request: RequestBuilder, stream: bool) -> RequestBuilder {
    if stream {
        request
    } else {
        request.timeout(REQUEST_TIMEOUT)
    }
}

/// Map a failed HTTP status onto the shared error taxonomy.
pub(crate) fn error_for_status(provider: &str, status: StatusCode, body: &str) -> Option<LlmError> {
    if status.is_success() {
        return None;
    }
    let detail = format!("{} ({}): {}", provider, status.as_u16(), body.trim());
    Some(match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => LlmError::Auth(detail),
        StatusCode::TOO_MANY_REQUESTS => LlmError::RateLimit(detail),
        // Gemini reports a bad key as a plain 400.
        StatusCode::BAD_REQUEST if body.contains("API_KEY_INVALID") => LlmError::Auth(detail),
        _ => LlmError::Backend(detail),
    })
}

/// Pass successful responses through; read the body of failed ones into an
/// error.
pub(crate) async fn check_status(provider: &str, response: Response) -> Result<Response, LlmError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(error_for_status(provider, status, &body)
        .unwrap_or_else(|| LlmError::Backend(format!("{} returned {}", provider, status))))
}

/// Payload of an SSE `data:` line.
pub(crate) fn parse_data_line(line: &str) -> Option<&str> {
    line.strip_prefix("data:").map(str::trim_start)
}

/// Payloads of every `data:` line in a streaming response body.
pub(crate) fn data_lines(response: Response) -> impl Stream<Item = Result<String, LlmError>> + Send {
    let bytes = Box::pin(
        response
            .bytes_stream()
            .map(|chunk| chunk.map_err(std::io::Error::other)),
    );
    let mut lines = StreamReader::new(bytes).lines();

    try_stream! {
        while let Some(line) = lines
            .next_line()
            .await
            .map_err(|e| LlmError::Backend(format!("stream interrupted: {}", e)))?
        {
            if let Some(data) = parse_data_line(&line) {
                yield data.to_string();
            }
        }
    }
}
