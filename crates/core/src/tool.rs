//! Tool trait — the abstraction over agent capabilities.
//!
//! Tools are what let the model act on the local machine: read files,
//! search the repository, apply patches, run commands, fetch URLs.
//! New tools are added by implementing [`Tool`] and registering an instance;
//! the dispatcher never needs to change.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::ToolError;
use crate::provider::ToolDefinition;
use crate::schema::Schema;

/// Per-invocation execution context handed to a tool.
///
/// The token is cancelled when the caller's turn is cancelled or when the
/// per-call timeout elapses. Long-running tools should watch it.
#[derive(Debug, Clone, Default)]
pub struct ToolContext {
    cancel: CancellationToken,
}

impl ToolContext {
    pub fn new(cancel: CancellationToken) -> Self {
        Self { cancel }
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Resolves once the invocation has been cancelled.
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await
    }
}

/// The output of a successful tool execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolResult {
    pub content: String,
}

impl ToolResult {
    pub fn new(content: impl Into<String>) -> Self {
        Self { content: content.into() }
    }
}

/// The core Tool trait.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "read_file").
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the model).
    fn description(&self) -> &str;

    /// Schema describing this tool's arguments.
    fn input_schema(&self) -> Schema;

    /// Execute the tool with the raw JSON arguments produced by the model.
    async fn execute(&self, ctx: &ToolContext, arguments: &str) -> Result<ToolResult, ToolError>;

    /// Convert this tool into a ToolDefinition for sending to the model.
    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.input_schema().to_json(),
        }
    }
}

/// Decode a tool's JSON arguments into its typed input struct.
///
/// An empty argument string is treated as `{}` so tools whose fields are all
/// optional accept a bare call.
pub fn parse_arguments<T: serde::de::DeserializeOwned>(arguments: &str) -> Result<T, ToolError> {
    let raw = if arguments.trim().is_empty() { "{}" } else { arguments };
    serde_json::from_str(raw).map_err(|e| ToolError::InvalidArguments(e.to_string()))
}

/// A registry of available tools.
///
/// Registration is last-write-wins by name, while enumeration keeps the
/// order in which each name was first registered. Build it once, then share
/// it read-only (usually behind an `Arc`).
#[derive(Default, Clone)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
    order: Vec<String>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. Replaces any existing tool with the same name.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        if self.tools.insert(name.clone(), tool).is_some() {
            debug!(tool = %name, "Replaced previously registered tool");
        } else {
            self.order.push(name);
        }
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// All tools in first-registration order.
    pub fn all(&self) -> Vec<Arc<dyn Tool>> {
        self.order.iter().filter_map(|name| self.tools.get(name).cloned()).collect()
    }

    /// Get all tool definitions (for sending to the model).
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.all().iter().map(|t| t.to_definition()).collect()
    }

    /// List all registered tool names in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.order.iter().map(|s| s.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry").field("tools", &self.order).finish()
    }
}
