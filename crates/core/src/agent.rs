//! Orchestrator configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Cap on characters of tool output returned to the model or recorded.
pub const TOOL_OUTPUT_LIMIT: usize = 50_000;

/// Reply substituted when the model stops for tool calls but sends none.
pub const EMPTY_RESPONSE_PLACEHOLDER: &str = "(empty response)";

/// Configuration for one orchestrator instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Model to request
    pub model: String,

    /// Fixed system prompt placed first in every prompt
    pub system_prompt: String,

    /// Prior turns replayed into the prompt
    #[serde(default = "default_recent_turns")]
    pub recent_turns: usize,

    /// Maximum completion round-trips per user turn
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    /// Tools allowed to run at the same time within one batch
    #[serde(default = "default_max_tool_concurrency")]
    pub max_tool_concurrency: usize,

    /// Budget for each individual tool invocation
    #[serde(default = "default_tool_timeout", with = "duration_secs")]
    pub tool_timeout: Duration,
}

fn default_recent_turns() -> usize {
    2
}
fn default_max_iterations() -> u32 {
    25
}
fn default_max_tool_concurrency() -> usize {
    4
}
fn default_tool_timeout() -> Duration {
    Duration::from_secs(60)
}

impl AgentConfig {
    pub fn new(model: impl Into<String>, system_prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            system_prompt: system_prompt.into(),
            recent_turns: default_recent_turns(),
            max_iterations: default_max_iterations(),
            max_tool_concurrency: default_max_tool_concurrency(),
            tool_timeout: default_tool_timeout(),
        }
    }

    /// Replace zero limits with their defaults.
    pub fn normalized(mut self) -> Self {
        if self.max_iterations == 0 {
            self.max_iterations = default_max_iterations();
        }
        if self.max_tool_concurrency == 0 {
            self.max_tool_concurrency = default_max_tool_concurrency();
        }
        if self.tool_timeout.is_zero() {
            self.tool_timeout = default_tool_timeout();
        }
        self
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_secs)
    }
}
