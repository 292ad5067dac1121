//! `duckdb_query` — run SQL against a DuckDB file through the `duckdb` CLI.

use std::path::PathBuf;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;
use toolweave_core::error::ToolError;
use toolweave_core::schema::Schema;
use toolweave_core::text::truncate_output;
use toolweave_core::tool::{Tool, ToolContext, ToolResult, parse_arguments};
use toolweave_security::resolve_within_root;
use tracing::debug;

use crate::process::{run_combined, timeout_or_default};

const DEFAULT_MAX_BYTES: usize = 200_000;

pub struct DuckDbQueryTool {
    root: PathBuf,
    enabled: bool,
}

impl DuckDbQueryTool {
    pub fn new(root: impl Into<PathBuf>, enabled: bool) -> Self {
        Self {
            root: root.into(),
            enabled,
        }
    }
}

#[derive(Debug, Deserialize)]
struct Input {
    database_path: String,
    sql: String,
    #[serde(default)]
    timeout_sec: Option<u64>,
    #[serde(default)]
    max_bytes: Option<usize>,
}

#[async_trait]
impl Tool for DuckDbQueryTool {
    fn name(&self) -> &str {
        "duckdb_query"
    }

    fn description(&self) -> &str {
        "Run a SQL query against a local DuckDB database file using the `duckdb` CLI. Disabled by default."
    }

    fn input_schema(&self) -> Schema {
        Schema::object()
            .required("database_path", Schema::string("Path to a .duckdb file relative to repo root."))
            .required("sql", Schema::string("SQL query to run."))
            .property("timeout_sec", Schema::integer("Timeout seconds (default 60)."))
            .property("max_bytes", Schema::integer("Maximum bytes to return (default 200000)."))
    }

    async fn execute(&self, ctx: &ToolContext, arguments: &str) -> Result<ToolResult, ToolError> {
        if !self.enabled {
            return Err(ToolError::Disabled { tool_name: self.name().into() });
        }

        let input: Input = parse_arguments(arguments)?;
        if input.database_path.trim().is_empty() {
            return Err(ToolError::InvalidArguments("missing database_path".into()));
        }
        if input.sql.trim().is_empty() {
            return Err(ToolError::InvalidArguments("missing sql".into()));
        }
        let max_bytes = input.max_bytes.filter(|n| *n > 0).unwrap_or(DEFAULT_MAX_BYTES);
        let db_path = resolve_within_root(&self.root, &input.database_path)?;

        debug!(db = %db_path.display(), "Running duckdb query");
        let mut cmd = Command::new("duckdb");
        cmd.arg(&db_path)
            .args(["-json", "-c", input.sql.as_str()])
            .current_dir(&self.root);
        let out = run_combined(self.name(), cmd, timeout_or_default(input.timeout_sec), ctx).await?;

        if !out.success {
            return Err(ToolError::failed(self.name(), out.text));
        }
        Ok(ToolResult::new(truncate_output(&out.text, max_bytes)))
    }
}
