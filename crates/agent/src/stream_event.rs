//! Agent-level streaming events.
//!
//! `AgentStreamEvent` is what a front end sees while a turn runs in
//! streaming mode: text fragments as they arrive from the model, and
//! notifications as each tool invocation starts and finishes.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Sending half of an event channel. Unbounded so that emitting never waits
/// on a slow consumer.
pub type EventSender = mpsc::UnboundedSender<AgentStreamEvent>;

/// Events emitted by the engine during streaming execution.
///
/// - `chunk`         — partial text from the model
/// - `tool_started`  — a tool invocation was admitted and is running
/// - `tool_finished` — that invocation completed (successfully or not)
/// - `done`          — the turn finished and was persisted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentStreamEvent {
    /// Partial text token from the model.
    Chunk { content: String },

    ToolStarted { id: String, name: String },

    ToolFinished { id: String, name: String, success: bool },

    /// The turn is complete.
    Done { session_id: String, tool_calls: usize },
}

impl AgentStreamEvent {
    /// Wire name for this event type.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Chunk { .. } => "chunk",
            Self::ToolStarted { .. } => "tool_started",
            Self::ToolFinished { .. } => "tool_finished",
            Self::Done { .. } => "done",
        }
    }
}

/// Send `event` if there is a listener. A dropped receiver is not an error.
pub(crate) fn emit(events: Option<&EventSender>, event: AgentStreamEvent) {
    if let Some(tx) = events {
        let _ = tx.send(event);
    }
}
