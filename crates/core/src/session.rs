//! Session log trait — append-only persisted turn history.
//!
//! Each completed user turn becomes one immutable [`TurnRecord`]. The log
//! for a session is ordered by insertion only; records are never rewritten
//! or deleted. Two read paths exist:
//! - `load_recent_turns` seeds the prompt with the last N turns
//! - `session_context` gives the model a truncated view of its own history

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::error::SessionError;
use crate::text::truncate_with_count;

/// Discriminator written into every turn line.
pub const TURN_RECORD_TYPE: &str = "turn";

/// Per-field cap applied by [`SessionContext::from_turns`].
pub const CONTEXT_FIELD_LIMIT: usize = 2_000;

/// One executed tool call, persisted as part of a turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRecord {
    #[serde(default)]
    pub name: String,

    /// Raw arguments as the model produced them
    #[serde(default)]
    pub input: serde_json::Value,

    /// Tool output, possibly truncated; empty when the call failed
    #[serde(default)]
    pub output: String,

    #[serde(default)]
    pub started_at: DateTime<Utc>,

    #[serde(default)]
    pub duration_ms: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// One completed user turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnRecord {
    /// Always `"turn"`; lines with any other type are ignored on read
    #[serde(rename = "type")]
    pub record_type: String,

    #[serde(default)]
    pub session_id: String,

    #[serde(default)]
    pub timestamp: DateTime<Utc>,

    #[serde(default)]
    pub user_input: String,

    #[serde(default)]
    pub assistant: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCallRecord>,
}

impl TurnRecord {
    pub fn new(
        session_id: impl Into<String>,
        user_input: impl Into<String>,
        assistant: impl Into<String>,
        tool_calls: Vec<ToolCallRecord>,
    ) -> Self {
        Self {
            record_type: TURN_RECORD_TYPE.to_string(),
            session_id: session_id.into(),
            timestamp: Utc::now(),
            user_input: user_input.into(),
            assistant: assistant.into(),
            tool_calls,
        }
    }

    pub fn is_turn(&self) -> bool {
        self.record_type == TURN_RECORD_TYPE
    }
}

/// Arguments of a session-context query.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionContextRequest {
    /// Only return the last N turns
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_n: Option<usize>,

    /// Include per-turn tool outputs
    #[serde(default)]
    pub include_tool_calls: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSummary {
    pub name: String,
    pub output: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnSummary {
    pub user_input: String,
    pub assistant: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolSummary>,
}

/// Summarized view of a session, for introspection by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionContext {
    pub session_id: String,
    /// Total number of turns in the log, regardless of `last_n`
    pub turn_count: usize,
    pub turns: Vec<TurnSummary>,
}

impl SessionContext {
    /// Build the view from every well-formed turn of a session, in log order.
    pub fn from_turns(session_id: &str, turns: &[TurnRecord], request: &SessionContextRequest) -> Self {
        let total = turns.len();
        let start = match request.last_n {
            Some(n) if n < total => total - n,
            _ => 0,
        };

        let summaries = turns[start..]
            .iter()
            .map(|t| TurnSummary {
                user_input: truncate_with_count(&t.user_input, CONTEXT_FIELD_LIMIT),
                assistant: truncate_with_count(&t.assistant, CONTEXT_FIELD_LIMIT),
                tools: if request.include_tool_calls {
                    t.tool_calls
                        .iter()
                        .map(|c| ToolSummary {
                            name: c.name.clone(),
                            output: truncate_with_count(&c.output, CONTEXT_FIELD_LIMIT),
                            error: c.error.clone(),
                        })
                        .collect()
                } else {
                    Vec::new()
                },
            })
            .collect();

        Self {
            session_id: session_id.to_string(),
            turn_count: total,
            turns: summaries,
        }
    }
}

/// The last `n` items of `turns`, in their original order.
pub fn last_n<T>(mut turns: Vec<T>, n: usize) -> Vec<T> {
    if turns.len() > n {
        turns.drain(..turns.len() - n);
    }
    turns
}

/// Generate a fresh session id: 128 random bits, hex-encoded.
pub fn new_session_id() -> String {
    format!("{:032x}", rand::random::<u128>())
}

/// Persisted, append-only turn history keyed by session id.
///
/// Reading a session that has never been written is not an error and yields
/// an empty result. Implementations do not serialize concurrent appends to
/// the same session; the orchestrator never issues them.
#[async_trait]
pub trait SessionLog: Send + Sync {
    /// Append one record. Not idempotent: every call adds a line.
    async fn append_turn(&self, cancel: &CancellationToken, record: &TurnRecord) -> Result<(), SessionError>;

    /// The last `n` well-formed turns in append order (fewer if the log is shorter).
    async fn load_recent_turns(
        &self,
        cancel: &CancellationToken,
        session_id: &str,
        n: usize,
    ) -> Result<Vec<TurnRecord>, SessionError>;

    /// Truncated summary of the session's turns.
    async fn session_context(
        &self,
        cancel: &CancellationToken,
        session_id: &str,
        request: &SessionContextRequest,
    ) -> Result<SessionContext, SessionError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn turn(i: usize) -> TurnRecord {
        TurnRecord::new("s1", format!("q{i}"), format!("a{i}"), vec![])
    }

    #[test]
    fn last_n_keeps_suffix_in_order() {
        let turns: Vec<_> = (1..=5).map(turn).collect();
        let tail = last_n(turns, 2);
        assert_eq!(tail.len(), 2);
        assert_eq!(tail[0].user_input, "q4");
        assert_eq!(tail[1].user_input, "q5");
    }

    #[test]
    fn last_n_returns_everything_when_short() {
        let turns: Vec<_> = (1..=2).map(turn).collect();
        let tail = last_n(turns, 10);
        assert_eq!(tail.len(), 2);
        assert_eq!(tail[0].user_input, "q1");
    }

    #[test]
    fn context_truncates_long_fields() {
        let mut t = turn(1);
        t.assistant = "x".repeat(CONTEXT_FIELD_LIMIT + 5);
        let ctx = SessionContext::from_turns("s1", &[t], &SessionContextRequest::default());
        assert!(ctx.turns[0].assistant.ends_with("...(+5 chars)"));
    }

    #[test]
    fn context_windows_but_counts_all_turns() {
        let turns: Vec<_> = (1..=4).map(turn).collect();
        let req = SessionContextRequest { last_n: Some(1), include_tool_calls: false };
        let ctx = SessionContext::from_turns("s1", &turns, &req);
        assert_eq!(ctx.turn_count, 4);
        assert_eq!(ctx.turns.len(), 1);
        assert_eq!(ctx.turns[0].user_input, "q4");
    }

    #[test]
    fn context_omits_tools_unless_requested() {
        let mut t = turn(1);
        t.tool_calls.push(ToolCallRecord {
            name: "read_file".into(),
            input: serde_json::json!({"path": "a"}),
            output: "body".into(),
            started_at: Utc::now(),
            duration_ms: 3,
            error: None,
        });
        let turns = vec![t];

        let without = SessionContext::from_turns("s1", &turns, &SessionContextRequest::default());
        assert!(without.turns[0].tools.is_empty());

        let req = SessionContextRequest { last_n: None, include_tool_calls: true };
        let with = SessionContext::from_turns("s1", &turns, &req);
        assert_eq!(with.turns[0].tools[0].name, "read_file");
    }

    #[test]
    fn turn_record_serializes_type_tag() {
        let json = serde_json::to_value(turn(1)).unwrap();
        assert_eq!(json["type"], "turn");
        assert!(json.get("tool_calls").is_none());
    }

    #[test]
    fn session_ids_are_32_hex_chars() {
        let id = new_session_id();
        assert_eq!(id.len(), 32);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(id, new_session_id());
    }
}
