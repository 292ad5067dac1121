//! Error types for the toolweave domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant, and the top-level
//! [`Error`] keeps precondition failures, remote failures, iteration
//! exhaustion and cancellation distinguishable from one another.

use thiserror::Error;

/// The top-level error type for all toolweave operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Precondition errors ---
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Remote completion service ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Tools ---
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    // --- Session log ---
    #[error("Session log error: {0}")]
    Session(#[from] SessionError),

    // --- Loop control ---
    #[error("max iterations reached ({0})")]
    MaxIterations(u32),

    #[error("operation cancelled")]
    Cancelled,

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// True when the error came from the caller cancelling the operation.
    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            Error::Cancelled
                | Error::Session(SessionError::Cancelled)
                | Error::Provider(ProviderError::Cancelled)
        )
    }
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider: {0}")]
    RateLimited(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// A structured `{"error": {...}}` payload returned by the service.
    #[error("Remote error ({kind}): {message}")]
    Remote { message: String, kind: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Stream interrupted: {0}")]
    StreamInterrupted(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("request cancelled")]
    Cancelled,
}

#[derive(Debug, Clone, Error)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Invalid tool arguments: {0}")]
    InvalidArguments(String),

    #[error("{tool_name} failed: {reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("{tool_name} is disabled")]
    Disabled { tool_name: String },

    #[error("Permission denied: {tool_name}: {reason}")]
    PermissionDenied { tool_name: String, reason: String },

    #[error("{tool_name} timed out after {timeout_secs}s")]
    Timeout { tool_name: String, timeout_secs: u64 },

    #[error("tool execution cancelled")]
    Cancelled,

    #[error("path outside root: {0}")]
    PathOutsideRoot(String),
}

impl ToolError {
    pub fn failed(tool_name: &str, reason: impl std::fmt::Display) -> Self {
        ToolError::ExecutionFailed {
            tool_name: tool_name.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn denied(tool_name: &str, reason: impl Into<String>) -> Self {
        ToolError::PermissionDenied {
            tool_name: tool_name.to_string(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("invalid session id: {0:?}")]
    InvalidSessionId(String),

    #[error("I/O failure on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Could not encode turn record: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("session operation cancelled")]
    Cancelled,
}
