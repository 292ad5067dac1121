//! The turn orchestrator.
//!
//! One [`Engine::run`] call handles one user turn:
//!
//! 1. Build the prompt: system prompt, the last `recent_turns` turns of the
//!    session as plain user/assistant pairs, then the new user input
//! 2. Ask the provider for a completion, advertising every registered tool
//! 3. If the reply carries tool calls, dispatch them, append the results and
//!    go back to step 2
//! 4. Otherwise persist the turn and return the reply
//!
//! At most `max_iterations` completions are requested per turn. Nothing is
//! persisted unless the turn finishes with a reply.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use toolweave_core::agent::{AgentConfig, EMPTY_RESPONSE_PLACEHOLDER};
use toolweave_core::error::{Error, ProviderError, SessionError};
use toolweave_core::message::Message;
use toolweave_core::provider::{Provider, ProviderRequest, ProviderResponse, ToolDefinition};
use toolweave_core::session::{SessionLog, ToolCallRecord, TurnRecord};
use toolweave_core::tool::ToolRegistry;
use toolweave_providers::collect_stream;
use tracing::{debug, info, warn};

use crate::dispatcher::ToolDispatcher;
use crate::prompt::DEFAULT_SYSTEM_PROMPT;
use crate::stream_event::{AgentStreamEvent, EventSender, emit};

/// What a completed turn produced.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnOutcome {
    pub session_id: String,
    pub reply: String,
    /// Every tool call made during the turn, in execution-batch order
    pub tool_calls: Vec<ToolCallRecord>,
}

/// Drives the completion/tool loop for one session log and tool set.
pub struct Engine {
    provider: Arc<dyn Provider>,
    tools: Arc<ToolRegistry>,
    log: Arc<dyn SessionLog>,
    config: AgentConfig,
    dispatcher: ToolDispatcher,
}

impl Engine {
    /// Create an engine. Fails if no model is configured; zero limits are
    /// replaced with their defaults and an empty system prompt with
    /// [`DEFAULT_SYSTEM_PROMPT`].
    pub fn new(
        provider: Arc<dyn Provider>,
        tools: Arc<ToolRegistry>,
        log: Arc<dyn SessionLog>,
        config: AgentConfig,
    ) -> Result<Self, Error> {
        if config.model.trim().is_empty() {
            return Err(Error::Config {
                message: "missing model".into(),
            });
        }
        let mut config = config.normalized();
        if config.system_prompt.is_empty() {
            config.system_prompt = DEFAULT_SYSTEM_PROMPT.to_string();
        }

        let dispatcher = ToolDispatcher::new(Arc::clone(&tools), config.max_tool_concurrency, config.tool_timeout);
        Ok(Self {
            provider,
            tools,
            log,
            config,
            dispatcher,
        })
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Run one turn with whole-response completions.
    pub async fn run(&self, cancel: &CancellationToken, session_id: &str, input: &str) -> Result<TurnOutcome, Error> {
        self.run_turn(cancel, session_id, input, None).await
    }

    /// Run one turn with streamed completions, reporting progress on
    /// `events`. The final result is identical to [`Engine::run`].
    pub async fn run_streaming(
        &self,
        cancel: &CancellationToken,
        session_id: &str,
        input: &str,
        events: &EventSender,
    ) -> Result<TurnOutcome, Error> {
        self.run_turn(cancel, session_id, input, Some(events)).await
    }

    /// Spawn a streaming turn. Events arrive on the returned receiver, which
    /// closes when the turn ends; the handle yields the outcome.
    pub fn run_stream(
        self: &Arc<Self>,
        cancel: CancellationToken,
        session_id: impl Into<String>,
        input: impl Into<String>,
    ) -> (mpsc::UnboundedReceiver<AgentStreamEvent>, JoinHandle<Result<TurnOutcome, Error>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let engine = Arc::clone(self);
        let session_id = session_id.into();
        let input = input.into();
        let handle = tokio::spawn(async move { engine.run_streaming(&cancel, &session_id, &input, &tx).await });
        (rx, handle)
    }

    async fn run_turn(
        &self,
        cancel: &CancellationToken,
        session_id: &str,
        input: &str,
        events: Option<&EventSender>,
    ) -> Result<TurnOutcome, Error> {
        if session_id.is_empty() {
            return Err(Error::InvalidInput("missing session id".into()));
        }
        if input.trim().is_empty() {
            return Err(Error::InvalidInput("empty input".into()));
        }

        info!(session_id, streaming = events.is_some(), "Processing turn");

        let mut messages = self.seed_messages(cancel, session_id, input).await?;
        let definitions = self.tools.definitions();
        let mut records: Vec<ToolCallRecord> = Vec::new();

        for iteration in 1..=self.config.max_iterations {
            debug!(session_id, iteration, messages = messages.len(), "Requesting completion");

            let response = self.complete(cancel, &messages, &definitions, events).await?;
            let message = response.message;

            if !message.has_tool_calls() {
                let mut reply = message.content;
                if reply.is_empty() && response.finish_reason.as_deref() == Some("tool_calls") {
                    reply = EMPTY_RESPONSE_PLACEHOLDER.to_string();
                }

                let record = TurnRecord::new(session_id, input, reply.clone(), records.clone());
                if let Err(e) = self.log.append_turn(cancel, &record).await {
                    warn!(session_id, error = %e, "Failed to persist turn");
                }

                info!(session_id, iteration, tool_calls = records.len(), "Turn complete");
                emit(events, AgentStreamEvent::Done {
                    session_id: session_id.to_string(),
                    tool_calls: records.len(),
                });
                return Ok(TurnOutcome {
                    session_id: session_id.to_string(),
                    reply,
                    tool_calls: records,
                });
            }

            let calls = message.tool_calls.clone();
            debug!(session_id, iteration, tool_calls = calls.len(), "Model requested tools");
            messages.push(Message::assistant_with_tools(message.content, message.tool_calls));

            let outcome = self.dispatcher.dispatch(cancel, &calls, events).await?;
            messages.extend(outcome.messages);
            records.extend(outcome.records);
        }

        warn!(session_id, max = self.config.max_iterations, "Max iterations reached");
        Err(Error::MaxIterations(self.config.max_iterations))
    }

    /// System prompt, replayed history, then the new input.
    async fn seed_messages(
        &self,
        cancel: &CancellationToken,
        session_id: &str,
        input: &str,
    ) -> Result<Vec<Message>, Error> {
        let mut messages = vec![Message::system(&self.config.system_prompt)];

        if self.config.recent_turns > 0 {
            match self
                .log
                .load_recent_turns(cancel, session_id, self.config.recent_turns)
                .await
            {
                Ok(turns) => {
                    debug!(session_id, replayed = turns.len(), "Loaded recent turns");
                    for turn in turns {
                        if !turn.user_input.is_empty() {
                            messages.push(Message::user(turn.user_input));
                        }
                        if !turn.assistant.is_empty() {
                            messages.push(Message::assistant(turn.assistant));
                        }
                    }
                }
                Err(SessionError::Cancelled) => return Err(Error::Cancelled),
                Err(e) => warn!(session_id, error = %e, "Could not load session history; continuing without it"),
            }
        }

        messages.push(Message::user(input));
        Ok(messages)
    }

    /// One completion round-trip, whole or streamed.
    async fn complete(
        &self,
        cancel: &CancellationToken,
        messages: &[Message],
        definitions: &[ToolDefinition],
        events: Option<&EventSender>,
    ) -> Result<ProviderResponse, Error> {
        let mut request = ProviderRequest::new(&self.config.model, messages.to_vec()).with_tools(definitions.to_vec());

        let result = match events {
            None => {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => Err(ProviderError::Cancelled),
                    res = self.provider.complete(request) => res,
                }
            }
            Some(tx) => {
                request.stream = true;
                let opened = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => Err(ProviderError::Cancelled),
                    res = self.provider.stream(request) => res,
                };
                match opened {
                    Ok(mut rx) => {
                        collect_stream(&mut rx, cancel, |text| {
                            emit(Some(tx), AgentStreamEvent::Chunk {
                                content: text.to_string(),
                            })
                        })
                        .await
                    }
                    Err(e) => Err(e),
                }
            }
        };

        result.map_err(|e| match e {
            ProviderError::Cancelled => Error::Cancelled,
            other => Error::Provider(other),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use toolweave_core::session::{SessionContext, SessionContextRequest};

    struct Echo;

    #[async_trait]
    impl Provider for Echo {
        fn name(&self) -> &str {
            "echo"
        }
        async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
            let last = request.messages.last().map(|m| m.content.clone()).unwrap_or_default();
            Ok(ProviderResponse {
                message: Message::assistant(format!("echo: {last}")),
                finish_reason: Some("stop".into()),
                usage: None,
                model: request.model,
            })
        }
    }

    struct NoLog;

    #[async_trait]
    impl SessionLog for NoLog {
        async fn append_turn(&self, _c: &CancellationToken, _r: &TurnRecord) -> Result<(), SessionError> {
            Err(SessionError::Cancelled)
        }
        async fn load_recent_turns(
            &self,
            _c: &CancellationToken,
            _s: &str,
            _n: usize,
        ) -> Result<Vec<TurnRecord>, SessionError> {
            Ok(Vec::new())
        }
        async fn session_context(
            &self,
            _c: &CancellationToken,
            s: &str,
            r: &SessionContextRequest,
        ) -> Result<SessionContext, SessionError> {
            Ok(SessionContext::from_turns(s, &[], r))
        }
    }

    fn engine(model: &str) -> Result<Engine, Error> {
        Engine::new(
            Arc::new(Echo),
            Arc::new(ToolRegistry::new()),
            Arc::new(NoLog),
            AgentConfig::new(model, ""),
        )
    }

    #[test]
    fn missing_model_is_config_error() {
        assert!(matches!(engine("  "), Err(Error::Config { .. })));
    }

    #[test]
    fn empty_prompt_falls_back_to_default() {
        let e = engine("m").unwrap();
        assert_eq!(e.config().system_prompt, DEFAULT_SYSTEM_PROMPT);
    }

    #[tokio::test]
    async fn preconditions_fail_before_any_io() {
        let e = engine("m").unwrap();
        let cancel = CancellationToken::new();
        assert!(matches!(e.run(&cancel, "", "hi").await, Err(Error::InvalidInput(_))));
        assert!(matches!(e.run(&cancel, "s", "   ").await, Err(Error::InvalidInput(_))));
    }

    #[tokio::test]
    async fn persistence_failure_still_returns_reply() {
        let e = engine("m").unwrap();
        let out = e.run(&CancellationToken::new(), "s", "ping").await.unwrap();
        assert_eq!(out.reply, "echo: ping");
        assert!(out.tool_calls.is_empty());
    }

    #[tokio::test]
    async fn streaming_without_native_stream_uses_single_chunk() {
        let e = Arc::new(engine("m").unwrap());
        let (mut rx, handle) = e.run_stream(CancellationToken::new(), "s", "hello");
        let out = handle.await.unwrap().unwrap();
        assert_eq!(out.reply, "echo: hello");

        let mut events = Vec::new();
        while let Some(ev) = rx.recv().await {
            events.push(ev);
        }
        assert_eq!(events, vec![
            AgentStreamEvent::Chunk { content: "echo: hello".into() },
            AgentStreamEvent::Done { session_id: "s".into(), tool_calls: 0 },
        ]);
    }
}
