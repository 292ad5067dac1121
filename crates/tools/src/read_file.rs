//! `read_file` — read a file under the repository root.

use std::path::PathBuf;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::io::AsyncReadExt;
use toolweave_core::error::ToolError;
use toolweave_core::schema::Schema;
use toolweave_core::tool::{Tool, ToolContext, ToolResult, parse_arguments};
use toolweave_security::resolve_within_root;
use tracing::debug;

const DEFAULT_MAX_BYTES: u64 = 200_000;

pub struct ReadFileTool {
    root: PathBuf,
}

impl ReadFileTool {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[derive(Debug, Deserialize)]
struct Input {
    path: String,
    #[serde(default)]
    max_bytes: Option<u64>,
}

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Read a file under the repo root."
    }

    fn input_schema(&self) -> Schema {
        Schema::object()
            .required("path", Schema::string("File path relative to repo root."))
            .property("max_bytes", Schema::integer("Maximum bytes to read (default 200000)."))
    }

    async fn execute(&self, ctx: &ToolContext, arguments: &str) -> Result<ToolResult, ToolError> {
        let input: Input = parse_arguments(arguments)?;
        if input.path.is_empty() {
            return Err(ToolError::InvalidArguments("missing path".into()));
        }
        let max_bytes = input.max_bytes.filter(|n| *n > 0).unwrap_or(DEFAULT_MAX_BYTES);

        let path = resolve_within_root(&self.root, &input.path)?;
        let file = tokio::fs::File::open(&path)
            .await
            .map_err(|e| ToolError::failed(self.name(), format!("{}: {e}", input.path)))?;

        if ctx.is_cancelled() {
            return Err(ToolError::Cancelled);
        }

        let mut buf = Vec::new();
        file.take(max_bytes)
            .read_to_end(&mut buf)
            .await
            .map_err(|e| ToolError::failed(self.name(), format!("{}: {e}", input.path)))?;

        debug!(path = %path.display(), bytes = buf.len(), "read_file");
        Ok(ToolResult::new(String::from_utf8_lossy(&buf)))
    }
}
