//! `get_session_context` — let the model look back over the current session.

use std::sync::Arc;

use async_trait::async_trait;
use toolweave_core::error::{SessionError, ToolError};
use toolweave_core::schema::Schema;
use toolweave_core::session::{SessionContextRequest, SessionLog};
use toolweave_core::tool::{Tool, ToolContext, ToolResult, parse_arguments};

pub struct SessionContextTool {
    log: Arc<dyn SessionLog>,
    session_id: String,
}

impl SessionContextTool {
    pub fn new(log: Arc<dyn SessionLog>, session_id: impl Into<String>) -> Self {
        Self {
            log,
            session_id: session_id.into(),
        }
    }
}

#[async_trait]
impl Tool for SessionContextTool {
    fn name(&self) -> &str {
        "get_session_context"
    }

    fn description(&self) -> &str {
        "Query prior turns in the current session. Use when resolving pronouns or referring to earlier results."
    }

    fn input_schema(&self) -> Schema {
        Schema::object()
            .property("last_n", Schema::integer("Return only the last N turns."))
            .property(
                "include_tool_calls",
                Schema::boolean("Whether to include tool outputs (default false)."),
            )
    }

    async fn execute(&self, ctx: &ToolContext, arguments: &str) -> Result<ToolResult, ToolError> {
        let request: SessionContextRequest = parse_arguments(arguments)?;
        let context = self
            .log
            .session_context(ctx.cancellation(), &self.session_id, &request)
            .await
            .map_err(|e| match e {
                SessionError::Cancelled => ToolError::Cancelled,
                other => ToolError::failed(self.name(), other),
            })?;
        let body = serde_json::to_string_pretty(&context).map_err(|e| ToolError::failed(self.name(), e))?;
        Ok(ToolResult::new(body))
    }
}
