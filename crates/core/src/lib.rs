//! # toolweave core
//!
//! Domain types, traits, and error definitions for the toolweave turn engine.
//! This crate has no I/O of its own: it defines the model that the provider,
//! session, tool and agent crates implement against.
//!
//! ## Layout
//!
//! - [`message`]: prompt messages and tool invocation requests
//! - [`provider`]: the completion-service seam, complete and streamed
//! - [`tool`] / [`schema`]: the tool capability interface and its registry
//! - [`session`]: the append-only turn log seam and its record types
//! - [`agent`]: orchestrator limits
//! - [`error`]: the error taxonomy shared by every crate

pub mod agent;
pub mod error;
pub mod message;
pub mod provider;
pub mod schema;
pub mod session;
pub mod text;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use agent::AgentConfig;
pub use error::{Error, ProviderError, Result, SessionError, ToolError};
pub use message::{Message, MessageToolCall, Role};
pub use provider::{
    ChunkReceiver, Provider, ProviderRequest, ProviderResponse, StreamChunk, ToolCallDelta,
    ToolDefinition,
};
pub use schema::Schema;
pub use session::{
    SessionContext, SessionContextRequest, SessionLog, ToolCallRecord, TurnRecord, new_session_id,
};
pub use tool::{Tool, ToolContext, ToolRegistry, ToolResult};

pub use tokio_util::sync::CancellationToken;
