//! End-to-end turns against a scripted provider, the JSONL session log and
//! the built-in file tools.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use toolweave_agent::{AgentStreamEvent, Engine};
use toolweave_core::agent::AgentConfig;
use toolweave_core::error::{Error, ProviderError};
use toolweave_core::message::{Message, MessageToolCall, Role};
use toolweave_core::provider::{ChunkReceiver, Provider, ProviderRequest, ProviderResponse, StreamChunk};
use toolweave_core::session::{SessionLog, TurnRecord};
use toolweave_core::tool::ToolRegistry;
use toolweave_session::JsonlSessionStore;
use toolweave_tools::read_file::ReadFileTool;

/// Replays canned responses in order and records every request it sees.
struct ScriptedProvider {
    responses: Mutex<VecDeque<ProviderResponse>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    fn new(responses: Vec<ProviderResponse>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        self.requests.lock().unwrap().push(request);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| ProviderError::InvalidResponse("script exhausted".into()))
    }
}

/// Always asks for the same tool again.
struct LoopingProvider {
    calls: Mutex<u32>,
}

#[async_trait]
impl Provider for LoopingProvider {
    fn name(&self) -> &str {
        "looping"
    }

    async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let mut calls = self.calls.lock().unwrap();
        *calls += 1;
        Ok(tool_response(vec![MessageToolCall::new(
            format!("c{calls}"),
            "read_file",
            r#"{"path":"a.txt"}"#,
        )]))
    }
}

/// Never answers.
struct HangingProvider;

#[async_trait]
impl Provider for HangingProvider {
    fn name(&self) -> &str {
        "hanging"
    }

    async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        std::future::pending().await
    }
}

/// Streams text in fixed fragments.
struct ChunkedProvider {
    fragments: Vec<&'static str>,
}

#[async_trait]
impl Provider for ChunkedProvider {
    fn name(&self) -> &str {
        "chunked"
    }

    async fn complete(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        Err(ProviderError::NotConfigured("stream only".into()))
    }

    async fn stream(&self, request: ProviderRequest) -> Result<ChunkReceiver, ProviderError> {
        assert!(request.stream);
        let (tx, rx) = mpsc::channel(self.fragments.len() + 1);
        for f in &self.fragments {
            tx.send(Ok(StreamChunk { content: Some(f.to_string()), ..Default::default() }))
                .await
                .unwrap();
        }
        tx.send(Ok(StreamChunk { finish_reason: Some("stop".into()), ..Default::default() }))
            .await
            .unwrap();
        Ok(rx)
    }
}

fn text_response(text: &str) -> ProviderResponse {
    ProviderResponse {
        message: Message::assistant(text),
        finish_reason: Some("stop".into()),
        usage: None,
        model: "test-model".into(),
    }
}

fn tool_response(calls: Vec<MessageToolCall>) -> ProviderResponse {
    ProviderResponse {
        message: Message::assistant_with_tools("", calls),
        finish_reason: Some("tool_calls".into()),
        usage: None,
        model: "test-model".into(),
    }
}

struct Fixture {
    repo: tempfile::TempDir,
    store: Arc<JsonlSessionStore>,
    _sessions: tempfile::TempDir,
}

impl Fixture {
    fn new() -> Self {
        let repo = tempfile::tempdir().unwrap();
        std::fs::write(repo.path().join("a.txt"), "alpha").unwrap();
        std::fs::write(repo.path().join("b.txt"), "bravo").unwrap();
        let sessions = tempfile::tempdir().unwrap();
        Self {
            store: Arc::new(JsonlSessionStore::new(sessions.path())),
            repo,
            _sessions: sessions,
        }
    }

    fn engine(&self, provider: Arc<dyn Provider>, config: AgentConfig) -> Engine {
        let mut tools = ToolRegistry::new();
        tools.register(Arc::new(ReadFileTool::new(self.repo.path())));
        Engine::new(provider, Arc::new(tools), self.store.clone(), config).unwrap()
    }

    async fn turns(&self, session_id: &str) -> Vec<TurnRecord> {
        self.store
            .load_recent_turns(&CancellationToken::new(), session_id, 100)
            .await
            .unwrap()
    }
}

fn config() -> AgentConfig {
    AgentConfig::new("test-model", "You are a test.")
}

#[tokio::test]
async fn prompt_replays_recent_turns_before_new_input() {
    let fx = Fixture::new();
    let cancel = CancellationToken::new();
    for i in 1..=3 {
        fx.store
            .append_turn(&cancel, &TurnRecord::new("s1", format!("u{i}"), format!("a{i}"), vec![]))
            .await
            .unwrap();
    }

    let provider = ScriptedProvider::new(vec![text_response("ok")]);
    let engine = fx.engine(provider.clone(), config());
    let out = engine.run(&cancel, "s1", "continue").await.unwrap();
    assert_eq!(out.reply, "ok");

    let requests = provider.requests();
    assert_eq!(requests.len(), 1);
    let prompt: Vec<(Role, &str)> = requests[0]
        .messages
        .iter()
        .map(|m| (m.role, m.content.as_str()))
        .collect();
    assert_eq!(prompt, vec![
        (Role::System, "You are a test."),
        (Role::User, "u2"),
        (Role::Assistant, "a2"),
        (Role::User, "u3"),
        (Role::Assistant, "a3"),
        (Role::User, "continue"),
    ]);
    assert_eq!(requests[0].tools.len(), 1);
    assert_eq!(requests[0].tool_choice.as_deref(), Some("auto"));

    let turns = fx.turns("s1").await;
    assert_eq!(turns.len(), 4);
    assert_eq!(turns[3].user_input, "continue");
    assert_eq!(turns[3].assistant, "ok");
}

#[tokio::test]
async fn tool_round_trip_is_fed_back_and_persisted() {
    let fx = Fixture::new();
    let provider = ScriptedProvider::new(vec![
        tool_response(vec![MessageToolCall::new("c1", "read_file", r#"{"path":"a.txt"}"#)]),
        text_response("done"),
    ]);
    let engine = fx.engine(provider.clone(), config());

    let out = engine.run(&CancellationToken::new(), "s1", "read a").await.unwrap();
    assert_eq!(out.reply, "done");
    assert_eq!(out.tool_calls.len(), 1);
    assert_eq!(out.tool_calls[0].name, "read_file");
    assert_eq!(out.tool_calls[0].output, "alpha");
    assert_eq!(out.tool_calls[0].input, serde_json::json!({"path": "a.txt"}));
    assert!(out.tool_calls[0].error.is_none());

    let second = &provider.requests()[1].messages;
    let n = second.len();
    assert_eq!(second[n - 2].role, Role::Assistant);
    assert_eq!(second[n - 2].tool_calls[0].id, "c1");
    assert_eq!(second[n - 1].role, Role::Tool);
    assert_eq!(second[n - 1].tool_call_id.as_deref(), Some("c1"));
    assert_eq!(second[n - 1].content, "alpha");

    let turns = fx.turns("s1").await;
    assert_eq!(turns.len(), 1);
    assert_eq!(turns[0].tool_calls, out.tool_calls);
}

#[tokio::test]
async fn batch_results_keep_request_order() {
    let fx = Fixture::new();
    let provider = ScriptedProvider::new(vec![
        tool_response(vec![
            MessageToolCall::new("c1", "read_file", r#"{"path":"b.txt"}"#),
            MessageToolCall::new("c2", "read_file", r#"{"path":"a.txt"}"#),
        ]),
        text_response("both read"),
    ]);
    let engine = fx.engine(provider.clone(), config());
    let out = engine.run(&CancellationToken::new(), "s1", "read both").await.unwrap();

    let outputs: Vec<&str> = out.tool_calls.iter().map(|r| r.output.as_str()).collect();
    assert_eq!(outputs, vec!["bravo", "alpha"]);

    let requests = provider.requests();
    let tool_ids: Vec<Option<&str>> = requests[1]
        .messages
        .iter()
        .filter(|m| m.role == Role::Tool)
        .map(|m| m.tool_call_id.as_deref())
        .collect();
    assert_eq!(tool_ids, vec![Some("c1"), Some("c2")]);
}

#[tokio::test]
async fn unknown_tool_is_reported_to_the_model() {
    let fx = Fixture::new();
    let provider = ScriptedProvider::new(vec![
        tool_response(vec![MessageToolCall::new("c1", "launch_rockets", "{}")]),
        text_response("sorry"),
    ]);
    let engine = fx.engine(provider.clone(), config());
    let out = engine.run(&CancellationToken::new(), "s1", "go").await.unwrap();

    assert_eq!(out.reply, "sorry");
    assert_eq!(out.tool_calls[0].error.as_deref(), Some("unknown tool"));
    let last = provider.requests()[1].messages.last().cloned().unwrap();
    assert_eq!(last.content, "Error: unknown tool");
}

#[tokio::test]
async fn failed_tool_result_carries_error_text() {
    let fx = Fixture::new();
    let provider = ScriptedProvider::new(vec![
        tool_response(vec![MessageToolCall::new("c1", "read_file", r#"{"path":"../outside"}"#)]),
        text_response("could not"),
    ]);
    let engine = fx.engine(provider.clone(), config());
    let out = engine.run(&CancellationToken::new(), "s1", "escape").await.unwrap();

    assert!(out.tool_calls[0].error.is_some());
    assert!(out.tool_calls[0].output.is_empty());
    let last = provider.requests()[1].messages.last().cloned().unwrap();
    assert!(last.content.starts_with("Error: "));
}

#[tokio::test]
async fn iteration_limit_fails_without_persisting() {
    let fx = Fixture::new();
    let provider = Arc::new(LoopingProvider { calls: Mutex::new(0) });
    let mut cfg = config();
    cfg.max_iterations = 3;
    let engine = fx.engine(provider.clone(), cfg);

    let err = engine.run(&CancellationToken::new(), "s1", "spin").await.unwrap_err();
    assert!(matches!(err, Error::MaxIterations(3)));
    assert_eq!(err.to_string(), "max iterations reached (3)");
    assert_eq!(*provider.calls.lock().unwrap(), 3);
    assert!(fx.turns("s1").await.is_empty());
}

#[tokio::test]
async fn empty_tool_stop_gets_placeholder_reply() {
    let fx = Fixture::new();
    let provider = ScriptedProvider::new(vec![tool_response(vec![])]);
    let engine = fx.engine(provider, config());
    let out = engine.run(&CancellationToken::new(), "s1", "hm").await.unwrap();
    assert_eq!(out.reply, "(empty response)");
    assert_eq!(fx.turns("s1").await[0].assistant, "(empty response)");
}

#[tokio::test]
async fn cancellation_ends_turn_without_persisting() {
    let fx = Fixture::new();
    let engine = fx.engine(Arc::new(HangingProvider), config());
    let cancel = CancellationToken::new();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let err = engine.run(&cancel, "s1", "wait").await.unwrap_err();
    assert!(err.is_cancelled());
    assert!(fx.turns("s1").await.is_empty());
}

#[tokio::test]
async fn streaming_turn_emits_chunks_then_done() {
    let fx = Fixture::new();
    let provider = Arc::new(ChunkedProvider { fragments: vec!["Hel", "lo", "!"] });
    let engine = Arc::new(fx.engine(provider, config()));

    let (mut rx, handle) = engine.run_stream(CancellationToken::new(), "s1", "greet");
    let out = handle.await.unwrap().unwrap();
    assert_eq!(out.reply, "Hello!");

    let mut events = Vec::new();
    while let Some(ev) = rx.recv().await {
        events.push(ev);
    }
    let chunks: Vec<String> = events
        .iter()
        .filter_map(|e| match e {
            AgentStreamEvent::Chunk { content } => Some(content.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(chunks, vec!["Hel", "lo", "!"]);
    assert_eq!(
        events.last(),
        Some(&AgentStreamEvent::Done { session_id: "s1".into(), tool_calls: 0 })
    );
    assert_eq!(fx.turns("s1").await[0].assistant, "Hello!");
}
