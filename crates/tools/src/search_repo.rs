//! `search_repo` — ripgrep over the repository root.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;
use toolweave_core::error::ToolError;
use toolweave_core::schema::Schema;
use toolweave_core::tool::{Tool, ToolContext, ToolResult, parse_arguments};

use crate::process::run_combined;

const DEFAULT_MAX_LINES: usize = 200;
const SEARCH_TIMEOUT: Duration = Duration::from_secs(30);

pub struct SearchRepoTool {
    root: PathBuf,
}

impl SearchRepoTool {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[derive(Debug, Deserialize)]
struct Input {
    query: String,
    #[serde(default)]
    glob: Option<String>,
    #[serde(default)]
    max_lines: Option<usize>,
}

/// Arguments passed to `rg`, query and path last.
fn rg_args(query: &str, glob: Option<&str>) -> Vec<String> {
    let mut args = Vec::new();
    if let Some(g) = glob.filter(|g| !g.is_empty()) {
        args.push("--glob".to_string());
        args.push(g.to_string());
    }
    args.extend(["--line-number", "--no-heading", "--smart-case"].map(String::from));
    args.push(query.to_string());
    args.push(".".to_string());
    args
}

fn first_lines(text: &str, max: usize) -> String {
    text.split('\n').take(max).collect::<Vec<_>>().join("\n")
}

#[async_trait]
impl Tool for SearchRepoTool {
    fn name(&self) -> &str {
        "search_repo"
    }

    fn description(&self) -> &str {
        "Search the repo using ripgrep (rg). Returns matching lines with paths and line numbers."
    }

    fn input_schema(&self) -> Schema {
        Schema::object()
            .required("query", Schema::string("Search query (ripgrep regex)."))
            .property("glob", Schema::string("Optional glob filter (passed to rg as --glob)."))
            .property("max_lines", Schema::integer("Maximum output lines to return (default 200)."))
    }

    async fn execute(&self, ctx: &ToolContext, arguments: &str) -> Result<ToolResult, ToolError> {
        let input: Input = parse_arguments(arguments)?;
        if input.query.is_empty() {
            return Err(ToolError::InvalidArguments("missing query".into()));
        }
        let max_lines = input.max_lines.filter(|n| *n > 0).unwrap_or(DEFAULT_MAX_LINES);

        let mut cmd = Command::new("rg");
        cmd.args(rg_args(&input.query, input.glob.as_deref()))
            .current_dir(&self.root);
        let out = run_combined(self.name(), cmd, SEARCH_TIMEOUT, ctx).await?;

        if !out.success && out.text.is_empty() {
            // rg exits 1 when nothing matched
            if out.code == Some(1) {
                return Ok(ToolResult::new(""));
            }
            return Err(ToolError::failed(self.name(), format!("rg exited with {:?}", out.code)));
        }

        Ok(ToolResult::new(first_lines(&out.text, max_lines)))
    }
}
