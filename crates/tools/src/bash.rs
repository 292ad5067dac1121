//! `bash` — run an allowlisted script with `bash -lc` in the repository root.

use std::path::PathBuf;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;
use toolweave_core::error::ToolError;
use toolweave_core::schema::Schema;
use toolweave_core::text::truncate_output;
use toolweave_core::tool::{Tool, ToolContext, ToolResult, parse_arguments};
use toolweave_security::PrefixAllowlist;
use tracing::{debug, warn};

use crate::process::{run_combined, timeout_or_default};
use crate::run_command::COMMAND_OUTPUT_LIMIT;

pub struct BashTool {
    root: PathBuf,
    enabled: bool,
    allowlist: PrefixAllowlist,
}

impl BashTool {
    pub fn new(root: impl Into<PathBuf>, enabled: bool, allowlist: PrefixAllowlist) -> Self {
        Self {
            root: root.into(),
            enabled,
            allowlist,
        }
    }
}

#[derive(Debug, Deserialize)]
struct Input {
    script: String,
    #[serde(default)]
    timeout_sec: Option<u64>,
}

#[async_trait]
impl Tool for BashTool {
    fn name(&self) -> &str {
        "bash"
    }

    fn description(&self) -> &str {
        "Run a shell command under the repo (bash -lc). Disabled by default; requires allowlisted script prefixes."
    }

    fn input_schema(&self) -> Schema {
        Schema::object()
            .required("script", Schema::string("Shell script to run (bash -lc)."))
            .property("timeout_sec", Schema::integer("Timeout seconds (default 60)."))
    }

    async fn execute(&self, ctx: &ToolContext, arguments: &str) -> Result<ToolResult, ToolError> {
        if !self.enabled {
            return Err(ToolError::Disabled { tool_name: self.name().into() });
        }

        let input: Input = parse_arguments(arguments)?;
        let script = input.script.trim();
        if script.is_empty() {
            return Err(ToolError::InvalidArguments("missing script".into()));
        }
        if !self.allowlist.allows(script) {
            warn!(script, "Script blocked by allowlist");
            return Err(ToolError::denied(self.name(), "script is not in allowlist"));
        }

        debug!(script, "Running bash script");
        let mut cmd = Command::new("bash");
        cmd.arg("-lc").arg(script).current_dir(&self.root);
        let out = run_combined(self.name(), cmd, timeout_or_default(input.timeout_sec), ctx).await?;

        if !out.success {
            return Err(ToolError::failed(self.name(), out.text));
        }
        Ok(ToolResult::new(truncate_output(&out.text, COMMAND_OUTPUT_LIMIT)))
    }
}
