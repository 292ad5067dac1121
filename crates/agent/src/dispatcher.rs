//! Concurrent tool dispatcher.
//!
//! Runs one model turn's batch of tool calls with bounded parallelism. Every
//! call is spawned immediately and waits only for a semaphore permit, never
//! for its siblings. Each admitted call gets its own cancellation token,
//! derived from the turn's, and its own timeout. Results land in slots
//! pre-sized to the batch, so output order always matches request order.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use serde_json::Value;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use toolweave_core::agent::TOOL_OUTPUT_LIMIT;
use toolweave_core::error::{Error, ToolError};
use toolweave_core::message::{Message, MessageToolCall};
use toolweave_core::session::ToolCallRecord;
use toolweave_core::text::truncate_output;
use toolweave_core::tool::{Tool, ToolContext, ToolRegistry};
use tracing::{debug, warn};

use crate::stream_event::{AgentStreamEvent, EventSender, emit};

/// Content and record error for calls naming a tool that is not registered.
const UNKNOWN_TOOL: &str = "unknown tool";

/// Tool messages for the model plus records for the session log, both in
/// request order.
#[derive(Debug, Default)]
pub struct DispatchOutcome {
    pub messages: Vec<Message>,
    pub records: Vec<ToolCallRecord>,
}

/// Executes batches of tool calls against a shared, read-only registry.
#[derive(Debug, Clone)]
pub struct ToolDispatcher {
    tools: Arc<ToolRegistry>,
    max_concurrency: usize,
    timeout: Duration,
}

impl ToolDispatcher {
    pub fn new(tools: Arc<ToolRegistry>, max_concurrency: usize, timeout: Duration) -> Self {
        Self {
            tools,
            max_concurrency: max_concurrency.max(1),
            timeout,
        }
    }

    /// Run every call in `calls` and return one message and one record per
    /// call, in the same order.
    ///
    /// Tool failures (including unknown tools and timeouts) become
    /// `Error: ...` messages and never fail the batch. If `cancel` fires, the
    /// dispatcher waits for in-flight calls to wind down and then returns
    /// [`Error::Cancelled`] instead of a partial batch.
    pub async fn dispatch(
        &self,
        cancel: &CancellationToken,
        calls: &[MessageToolCall],
        events: Option<&EventSender>,
    ) -> Result<DispatchOutcome, Error> {
        if calls.is_empty() {
            return Ok(DispatchOutcome::default());
        }
        debug!(calls = calls.len(), limit = self.max_concurrency, "Dispatching tool batch");

        let permits = Arc::new(Semaphore::new(self.max_concurrency));
        let mut set = JoinSet::new();

        for (index, call) in calls.iter().enumerate() {
            let call = call.clone();
            let tool = self.tools.get(&call.name);
            let permits = Arc::clone(&permits);
            let cancel = cancel.clone();
            let events = events.cloned();
            let timeout = self.timeout;

            set.spawn(async move {
                let _permit = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return (index, None),
                    permit = permits.acquire_owned() => match permit {
                        Ok(p) => p,
                        Err(_) => return (index, None),
                    },
                };
                let slot = run_one(&call, tool, &cancel, timeout, events.as_ref()).await;
                (index, Some(slot))
            });
        }

        let mut slots: Vec<Option<(Message, ToolCallRecord)>> = (0..calls.len()).map(|_| None).collect();
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((index, slot)) => slots[index] = slot,
                Err(e) => return Err(Error::Internal(format!("tool task failed: {e}"))),
            }
        }

        if cancel.is_cancelled() {
            debug!("Tool batch cancelled");
            return Err(Error::Cancelled);
        }

        let mut outcome = DispatchOutcome {
            messages: Vec::with_capacity(calls.len()),
            records: Vec::with_capacity(calls.len()),
        };
        for slot in slots {
            let Some((message, record)) = slot else {
                return Err(Error::Internal("tool call finished without a result".into()));
            };
            outcome.messages.push(message);
            outcome.records.push(record);
        }
        Ok(outcome)
    }
}

/// Execute one admitted call and build its message and record.
async fn run_one(
    call: &MessageToolCall,
    tool: Option<Arc<dyn Tool>>,
    cancel: &CancellationToken,
    timeout: Duration,
    events: Option<&EventSender>,
) -> (Message, ToolCallRecord) {
    let started_at = Utc::now();
    let start = Instant::now();
    emit(events, AgentStreamEvent::ToolStarted {
        id: call.id.clone(),
        name: call.name.clone(),
    });

    let result = match tool {
        Some(tool) => execute_with_timeout(tool.as_ref(), call, cancel, timeout).await,
        None => Err(UNKNOWN_TOOL.to_string()),
    };
    let duration_ms = start.elapsed().as_millis() as u64;

    let (content, output, error) = match result {
        Ok(text) => {
            let text = truncate_output(&text, TOOL_OUTPUT_LIMIT);
            (text.clone(), text, None)
        }
        Err(reason) => {
            warn!(tool = %call.name, error = %reason, "Tool call failed");
            (truncate_output(&format!("Error: {reason}"), TOOL_OUTPUT_LIMIT), String::new(), Some(reason))
        }
    };

    emit(events, AgentStreamEvent::ToolFinished {
        id: call.id.clone(),
        name: call.name.clone(),
        success: error.is_none(),
    });
    debug!(tool = %call.name, duration_ms, ok = error.is_none(), "Tool call finished");

    let record = ToolCallRecord {
        name: call.name.clone(),
        input: record_input(&call.arguments),
        output,
        started_at,
        duration_ms,
        error,
    };
    (Message::tool_result(&call.id, &call.name, content), record)
}

/// Run the tool under a child token that is cancelled when either the turn
/// is cancelled or `timeout` elapses. Tools that ignore the token are
/// dropped at that point.
async fn execute_with_timeout(
    tool: &dyn Tool,
    call: &MessageToolCall,
    cancel: &CancellationToken,
    timeout: Duration,
) -> Result<String, String> {
    let child = cancel.child_token();
    let ctx = ToolContext::new(child.clone());

    let result = tokio::select! {
        res = tool.execute(&ctx, &call.arguments) => res,
        _ = tokio::time::sleep(timeout) => {
            child.cancel();
            Err(ToolError::Timeout {
                tool_name: call.name.clone(),
                timeout_secs: timeout.as_secs(),
            })
        }
        _ = child.cancelled() => Err(ToolError::Cancelled),
    };
    result.map(|r| r.content).map_err(|e| e.to_string())
}

/// The call's arguments as recorded in the session log: parsed JSON when
/// possible, the raw string otherwise.
fn record_input(arguments: &str) -> Value {
    if arguments.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(arguments).unwrap_or_else(|_| Value::String(arguments.to_string()))
}
