//! OpenAI-compatible provider implementation.
//!
//! Works with llama.cpp server, vLLM, Ollama, OpenAI, OpenRouter and any
//! other endpoint exposing `/v1/chat/completions`.
//!
//! Supports:
//! - Chat completions (non-streaming and streaming SSE)
//! - Tool use / function calling with `tool_choice`
//! - Model listing, used for model auto-detection

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use toolweave_core::error::ProviderError;
use toolweave_core::message::{Message, MessageToolCall, Role};
use toolweave_core::provider::*;
use tracing::{debug, trace, warn};

/// Longest SSE line accepted before the stream is abandoned.
const MAX_SSE_LINE_BYTES: usize = 8 * 1024 * 1024;

/// An OpenAI-compatible completion provider.
pub struct OpenAiCompatProvider {
    name: String,
    base_url: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl OpenAiCompatProvider {
    /// Create a provider for `base_url` (e.g. `http://127.0.0.1:8080/v1`).
    ///
    /// `timeout` bounds each whole request, streaming included.
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::NotConfigured(format!("HTTP client: {e}")))?;

        Ok(Self {
            name: "openai-compat".into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            client,
        })
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn authorized(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }

    /// Convert our Message types to OpenAI API format.
    fn to_api_messages(messages: &[Message]) -> Vec<ApiMessage> {
        messages
            .iter()
            .map(|m| {
                let content = if m.content.is_empty() && m.has_tool_calls() {
                    None
                } else {
                    Some(serde_json::Value::String(m.content.clone()))
                };
                ApiMessage {
                    role: match m.role {
                        Role::System => "system".into(),
                        Role::User => "user".into(),
                        Role::Assistant => "assistant".into(),
                        Role::Tool => "tool".into(),
                    },
                    content,
                    name: m.name.clone(),
                    tool_calls: if m.tool_calls.is_empty() {
                        None
                    } else {
                        Some(
                            m.tool_calls
                                .iter()
                                .map(|tc| ApiToolCall {
                                    id: tc.id.clone(),
                                    r#type: tc.kind.clone(),
                                    function: ApiFunction {
                                        name: tc.name.clone(),
                                        arguments: tc.arguments.clone(),
                                    },
                                })
                                .collect(),
                        )
                    },
                    tool_call_id: m.tool_call_id.clone(),
                }
            })
            .collect()
    }

    /// Convert tool definitions to OpenAI API format.
    fn to_api_tools(tools: &[ToolDefinition]) -> Vec<ApiToolDefinition> {
        tools
            .iter()
            .map(|t| ApiToolDefinition {
                r#type: "function".into(),
                function: ApiToolFunction {
                    name: t.name.clone(),
                    description: t.description.clone(),
                    parameters: t.parameters.clone(),
                },
            })
            .collect()
    }

    fn request_body(request: &ProviderRequest, stream: bool) -> ChatRequestBody<'_> {
        ChatRequestBody {
            model: &request.model,
            messages: Self::to_api_messages(&request.messages),
            tools: Self::to_api_tools(&request.tools),
            tool_choice: request.tool_choice.as_deref(),
            stream,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        }
    }

    /// POST to `/chat/completions`, mapping non-2xx statuses to errors.
    async fn post_chat(&self, request: &ProviderRequest, stream: bool) -> Result<reqwest::Response, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = Self::request_body(request, stream);

        debug!(
            provider = %self.name,
            model = %request.model,
            messages = request.messages.len(),
            tools = request.tools.len(),
            stream,
            "Sending completion request"
        );

        let mut builder = self.authorized(self.client.post(&url)).json(&body);
        if stream {
            builder = builder.header("Accept", "text/event-stream");
        }
        let response = builder
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        check_status(response).await
    }
}

/// Pass 2xx responses through; turn anything else into a typed error
/// carrying the body text.
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let code = status.as_u16();
    let body = response.text().await.unwrap_or_default();
    warn!(status = code, body = %body, "Completion service returned error");

    Err(match code {
        429 => ProviderError::RateLimited(body),
        401 | 403 => ProviderError::AuthenticationFailed(body),
        _ => ProviderError::ApiError { status_code: code, message: body },
    })
}

/// Flatten an assistant `content` field. Non-string payloads (arrays of
/// parts) are kept as their JSON text.
fn extract_text(content: Option<serde_json::Value>) -> String {
    match content {
        None | Some(serde_json::Value::Null) => String::new(),
        Some(serde_json::Value::String(s)) => s,
        Some(other) => other.to_string(),
    }
}

fn parse_completion(body: &str) -> Result<ProviderResponse, ProviderError> {
    let api_response: ApiResponse = serde_json::from_str(body)
        .map_err(|e| ProviderError::InvalidResponse(format!("invalid model JSON: {e}")))?;

    if let Some(err) = api_response.error {
        return Err(err.into());
    }

    let choice = api_response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| ProviderError::InvalidResponse("no choices in response".into()))?;

    let tool_calls = choice
        .message
        .tool_calls
        .unwrap_or_default()
        .into_iter()
        .map(|tc| MessageToolCall {
            id: tc.id,
            kind: tc.r#type,
            name: tc.function.name,
            arguments: tc.function.arguments,
        })
        .collect();

    let message = Message::assistant_with_tools(extract_text(choice.message.content), tool_calls);

    let usage = api_response.usage.map(|u| Usage {
        prompt_tokens: u.prompt_tokens,
        completion_tokens: u.completion_tokens,
        total_tokens: u.total_tokens,
    });

    Ok(ProviderResponse {
        message,
        finish_reason: choice.finish_reason.filter(|r| !r.is_empty()),
        usage,
        model: api_response.model,
    })
}

/// One decoded SSE line.
#[derive(Debug)]
pub(crate) enum SseEvent {
    /// Blank, comment, non-data or malformed line
    Skip,
    /// The `[DONE]` sentinel
    Done,
    Chunk(StreamChunk),
    /// A structured error payload; aborts the stream
    Failed(ProviderError),
}

pub(crate) fn parse_sse_line(line: &str) -> SseEvent {
    let line = line.trim();
    let Some(data) = line.strip_prefix("data:") else {
        return SseEvent::Skip;
    };
    let data = data.trim();
    if data == "[DONE]" {
        return SseEvent::Done;
    }

    let parsed: StreamResponse = match serde_json::from_str(data) {
        Ok(parsed) => parsed,
        Err(e) => {
            trace!(data = %data, error = %e, "Ignoring unparseable SSE chunk");
            return SseEvent::Skip;
        }
    };

    if let Some(err) = parsed.error {
        return SseEvent::Failed(err.into());
    }

    let Some(choice) = parsed.choices.into_iter().next() else {
        return SseEvent::Skip;
    };

    let tool_calls = choice
        .delta
        .tool_calls
        .unwrap_or_default()
        .into_iter()
        .map(|d| {
            let (name, arguments) = match d.function {
                Some(f) => (f.name, f.arguments),
                None => (None, None),
            };
            ToolCallDelta {
                index: d.index,
                id: d.id,
                kind: d.r#type,
                name,
                arguments,
            }
        })
        .collect();

    SseEvent::Chunk(StreamChunk {
        content: choice.delta.content.filter(|c| !c.is_empty()),
        finish_reason: choice.finish_reason.filter(|r| !r.is_empty()),
        tool_calls,
    })
}

type ChunkSender = mpsc::Sender<Result<StreamChunk, ProviderError>>;

/// Forward one raw line to the consumer. Returns `false` once the stream
/// should stop (sentinel, error payload, or receiver gone).
async fn forward_line(raw: &[u8], tx: &ChunkSender) -> bool {
    let line = String::from_utf8_lossy(raw);
    match parse_sse_line(&line) {
        SseEvent::Skip => true,
        SseEvent::Done => false,
        SseEvent::Chunk(chunk) => tx.send(Ok(chunk)).await.is_ok(),
        SseEvent::Failed(err) => {
            let _ = tx.send(Err(err)).await;
            false
        }
    }
}

#[async_trait]
impl Provider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let response = self.post_chat(&request, false).await?;
        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;
        parse_completion(&body)
    }

    async fn stream(&self, request: ProviderRequest) -> Result<ChunkReceiver, ProviderError> {
        let response = self.post_chat(&request, true).await?;

        let (tx, rx) = mpsc::channel(64);
        let provider_name = self.name.clone();

        // Read the SSE byte stream on a task; dropping the receiver drops the
        // response and with it the connection.
        tokio::spawn(async move {
            let mut byte_stream = response.bytes_stream();
            let mut buffer: Vec<u8> = Vec::new();

            loop {
                let next = tokio::select! {
                    _ = tx.closed() => return,
                    next = byte_stream.next() => next,
                };

                match next {
                    Some(Ok(bytes)) => buffer.extend_from_slice(&bytes),
                    Some(Err(e)) => {
                        let _ = tx.send(Err(ProviderError::StreamInterrupted(e.to_string()))).await;
                        return;
                    }
                    None => {
                        // Transport closed; a trailing unterminated line still counts.
                        if !buffer.is_empty() {
                            forward_line(&buffer, &tx).await;
                        }
                        trace!(provider = %provider_name, "SSE stream closed");
                        return;
                    }
                }

                while let Some(pos) = buffer.iter().position(|b| *b == b'\n') {
                    let line: Vec<u8> = buffer.drain(..=pos).collect();
                    if !forward_line(&line, &tx).await {
                        return;
                    }
                }

                if buffer.len() > MAX_SSE_LINE_BYTES {
                    let _ = tx
                        .send(Err(ProviderError::StreamInterrupted(
                            "SSE line exceeds 8 MiB".into(),
                        )))
                        .await;
                    return;
                }
            }
        });

        Ok(rx)
    }

    async fn list_models(&self) -> Result<Vec<String>, ProviderError> {
        let url = format!("{}/models", self.base_url);
        let response = self
            .authorized(self.client.get(&url))
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;
        let response = check_status(response).await?;

        let body: ModelsResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;

        if let Some(err) = body.error {
            return Err(err.into());
        }

        Ok(body
            .data
            .into_iter()
            .map(|m| m.id)
            .filter(|id| !id.is_empty())
            .collect())
    }
}

// --- OpenAI API types (internal) ---

#[derive(Debug, Serialize)]
struct ChatRequestBody<'a> {
    model: &'a str,
    messages: Vec<ApiMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<ApiToolDefinition>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<&'a str>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiMessage {
    role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    content: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<ApiToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolCall {
    #[serde(default)]
    id: String,
    #[serde(default = "function_kind")]
    r#type: String,
    function: ApiFunction,
}

fn function_kind() -> String {
    "function".into()
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiFunction {
    #[serde(default)]
    name: String,
    #[serde(default)]
    arguments: String,
}

#[derive(Debug, Serialize)]
struct ApiToolDefinition {
    r#type: String,
    function: ApiToolFunction,
}

#[derive(Debug, Serialize)]
struct ApiToolFunction {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    model: String,
    #[serde(default)]
    choices: Vec<ApiChoice>,
    #[serde(default)]
    usage: Option<ApiUsage>,
    #[serde(default)]
    error: Option<ApiErrorBody>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

/// The structured `{"error": {"message", "type"}}` payload.
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default, rename = "type")]
    kind: Option<String>,
}

impl From<ApiErrorBody> for ProviderError {
    fn from(err: ApiErrorBody) -> Self {
        ProviderError::Remote {
            message: err.message,
            kind: err.kind.unwrap_or_else(|| "unknown".into()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ModelsResponse {
    #[serde(default)]
    data: Vec<ModelEntry>,
    #[serde(default)]
    error: Option<ApiErrorBody>,
}

#[derive(Debug, Deserialize)]
struct ModelEntry {
    #[serde(default)]
    id: String,
}

// --- Streaming SSE types ---

/// A single SSE `data: {...}` chunk from a streaming response.
#[derive(Debug, Deserialize)]
struct StreamResponse {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    #[serde(default)]
    error: Option<ApiErrorBody>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: StreamDelta,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<StreamToolCallDelta>>,
}

/// A tool call delta — arrives incrementally across chunks.
#[derive(Debug, Deserialize)]
struct StreamToolCallDelta {
    index: usize,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    r#type: Option<String>,
    #[serde(default)]
    function: Option<StreamFunctionDelta>,
}

#[derive(Debug, Deserialize)]
struct StreamFunctionDelta {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    arguments: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> OpenAiCompatProvider {
        OpenAiCompatProvider::new("http://127.0.0.1:8080/v1/", None, Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn base_url_trailing_slash_trimmed() {
        assert_eq!(provider().base_url(), "http://127.0.0.1:8080/v1");
    }

    #[test]
    fn blank_api_key_is_dropped() {
        let p = OpenAiCompatProvider::new("http://x", Some("  ".into()), Duration::from_secs(1)).unwrap();
        assert!(p.api_key.is_none());
    }

    #[test]
    fn request_body_carries_tool_choice() {
        let tools = vec![ToolDefinition {
            name: "read_file".into(),
            description: "Read a file".into(),
            parameters: serde_json::json!({"type": "object"}),
        }];
        let req = ProviderRequest::new("m", vec![Message::user("hi")]).with_tools(tools);
        let body = serde_json::to_value(OpenAiCompatProvider::request_body(&req, false)).unwrap();

        assert_eq!(body["tool_choice"], "auto");
        assert_eq!(body["tools"][0]["type"], "function");
        assert_eq!(body["tools"][0]["function"]["name"], "read_file");
        assert!(body.get("stream").is_none());
    }

    #[test]
    fn message_conversion_with_tool_calls() {
        let msg = Message::assistant_with_tools("", vec![MessageToolCall::new("call_1", "list_files", "{}")]);
        let api = OpenAiCompatProvider::to_api_messages(&[msg]);
        assert!(api[0].content.is_none());
        let tc = api[0].tool_calls.as_ref().unwrap();
        assert_eq!(tc[0].function.name, "list_files");
        assert_eq!(tc[0].r#type, "function");
    }

    #[test]
    fn message_conversion_tool_response() {
        let msg = Message::tool_result("call_1", "read_file", "result data");
        let api = OpenAiCompatProvider::to_api_messages(&[msg]);
        assert_eq!(api[0].role, "tool");
        assert_eq!(api[0].tool_call_id.as_deref(), Some("call_1"));
        assert_eq!(api[0].name.as_deref(), Some("read_file"));
    }

    #[test]
    fn parse_completion_with_tool_calls() {
        let body = r#"{"model":"m","choices":[{"message":{"role":"assistant","content":null,
            "tool_calls":[{"id":"c1","type":"function","function":{"name":"read_file","arguments":"{\"path\":\"x.go\"}"}}]},
            "finish_reason":"tool_calls"}]}"#;
        let resp = parse_completion(body).unwrap();
        assert_eq!(resp.message.tool_calls.len(), 1);
        assert_eq!(resp.message.tool_calls[0].name, "read_file");
        assert_eq!(resp.message.content, "");
        assert_eq!(resp.finish_reason.as_deref(), Some("tool_calls"));
    }

    #[test]
    fn parse_completion_keeps_array_content_as_json() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":[{"type":"text","text":"hi"}]},"finish_reason":"stop"}]}"#;
        let resp = parse_completion(body).unwrap();
        assert!(resp.message.content.starts_with('['));
        assert!(resp.message.content.contains("\"hi\""));
    }

    #[test]
    fn parse_completion_error_payload() {
        let body = r#"{"error":{"message":"context length exceeded","type":"invalid_request_error"}}"#;
        match parse_completion(body).unwrap_err() {
            ProviderError::Remote { message, kind } => {
                assert_eq!(message, "context length exceeded");
                assert_eq!(kind, "invalid_request_error");
            }
            other => panic!("Expected Remote, got: {other}"),
        }
    }

    #[test]
    fn parse_completion_without_choices() {
        assert!(matches!(
            parse_completion(r#"{"choices":[]}"#),
            Err(ProviderError::InvalidResponse(_))
        ));
        assert!(matches!(parse_completion("<html>"), Err(ProviderError::InvalidResponse(_))));
    }

    // --- SSE parsing tests ---

    #[test]
    fn sse_content_delta() {
        match parse_sse_line(r#"data: {"choices":[{"delta":{"content":"Hello"},"finish_reason":null}]}"#) {
            SseEvent::Chunk(chunk) => {
                assert_eq!(chunk.content.as_deref(), Some("Hello"));
                assert!(chunk.finish_reason.is_none());
            }
            other => panic!("Expected chunk, got {other:?}"),
        }
    }

    #[test]
    fn sse_prefix_without_space() {
        assert!(matches!(
            parse_sse_line(r#"data:{"choices":[{"delta":{"content":"x"}}]}"#),
            SseEvent::Chunk(_)
        ));
    }

    #[test]
    fn sse_done_sentinel_and_noise() {
        assert!(matches!(parse_sse_line("data: [DONE]"), SseEvent::Done));
        assert!(matches!(parse_sse_line(""), SseEvent::Skip));
        assert!(matches!(parse_sse_line(": keep-alive"), SseEvent::Skip));
        assert!(matches!(parse_sse_line("event: message"), SseEvent::Skip));
        assert!(matches!(parse_sse_line("data: {not json"), SseEvent::Skip));
    }

    #[test]
    fn sse_tool_call_delta() {
        let line = r#"data: {"choices":[{"delta":{"tool_calls":[{"index":2,"id":"call_abc","type":"function","function":{"name":"read_file","arguments":"{\"pa"}}]}}]}"#;
        match parse_sse_line(line) {
            SseEvent::Chunk(chunk) => {
                let d = &chunk.tool_calls[0];
                assert_eq!(d.index, 2);
                assert_eq!(d.id.as_deref(), Some("call_abc"));
                assert_eq!(d.kind.as_deref(), Some("function"));
                assert_eq!(d.name.as_deref(), Some("read_file"));
                assert_eq!(d.arguments.as_deref(), Some("{\"pa"));
            }
            other => panic!("Expected chunk, got {other:?}"),
        }
    }

    #[test]
    fn sse_tool_call_with_huge_index_is_dropped() {
        let line = r#"data: {"choices":[{"delta":{"tool_calls":[{"index":18446744073709551615,"id":"x","function":{"name":"read_file","arguments":"{}"}}]}}]}"#;
        let SseEvent::Chunk(chunk) = parse_sse_line(line) else {
            panic!("Expected chunk");
        };
        assert_eq!(chunk.tool_calls[0].index, usize::MAX);

        let mut asm = crate::assembler::StreamAssembler::new();
        assert_eq!(asm.push(chunk), None);
        assert!(asm.finish().message.tool_calls.is_empty());
    }

    #[test]
    fn sse_error_payload_fails() {
        let line = r#"data: {"error":{"message":"overloaded","type":"server_error"}}"#;
        assert!(matches!(parse_sse_line(line), SseEvent::Failed(ProviderError::Remote { .. })));
    }

    #[test]
    fn sse_finish_reason_only() {
        match parse_sse_line(r#"data: {"choices":[{"delta":{},"finish_reason":"tool_calls"}]}"#) {
            SseEvent::Chunk(chunk) => assert_eq!(chunk.finish_reason.as_deref(), Some("tool_calls")),
            other => panic!("Expected chunk, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn forward_line_stops_on_sentinel() {
        let (tx, mut rx) = mpsc::channel(4);
        assert!(forward_line(br#"data: {"choices":[{"delta":{"content":"a"}}]}"#, &tx).await);
        assert!(!forward_line(b"data: [DONE]\n", &tx).await);
        drop(tx);
        let first = rx.recv().await.unwrap().unwrap();
        assert_eq!(first.content.as_deref(), Some("a"));
        assert!(rx.recv().await.is_none());
    }
}
