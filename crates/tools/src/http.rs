//! HTTP client plumbing shared by `http_get` and `web_search`.

use std::time::Duration;

use futures::StreamExt;
use toolweave_core::error::ToolError;

/// Client-wide request timeout for outbound tool traffic.
pub(crate) const HTTP_TIMEOUT: Duration = Duration::from_secs(20);

pub(crate) fn client(tool_name: &str) -> Result<reqwest::Client, ToolError> {
    reqwest::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .user_agent(format!("toolweave/{} ({tool_name})", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| ToolError::failed(tool_name, format!("HTTP client: {e}")))
}

/// Read at most `max_bytes` of the response body, dropping the rest.
pub(crate) async fn read_limited(response: reqwest::Response, max_bytes: usize) -> Result<Vec<u8>, reqwest::Error> {
    let mut body = Vec::new();
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        let room = max_bytes.saturating_sub(body.len());
        body.extend_from_slice(&chunk[..chunk.len().min(room)]);
        if body.len() >= max_bytes {
            break;
        }
    }
    Ok(body)
}
