//! `run_command` — run an allowlisted executable in the repository root.
//!
//! Disabled unless explicitly enabled. The command line (`command` plus
//! space-joined `args`) must start with one of the configured prefixes.

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

/// Output cap for command-running tools, in characters.
pub const COMMAND_OUTPUT_LIMIT: usize = 20_000;

pub struct RunCommandTool {
    root: PathBuf,
    enabled: bool,
    allowlist: PrefixAllowlist,
}

impl RunCommandTool {
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
    command: String,
    #[serde(default)]
    args: Vec<String>,
    #[serde(default)]
    timeout_sec: Option<u64>,
}

#[async_trait]
impl Tool for RunCommandTool {
    fn name(&self) -> &str {
        "run_command"
    }

    fn description(&self) -> &str {
        "Run a command in the repo. Disabled by default; requires allowlist configuration."
    }

    fn input_schema(&self) -> Schema {
        Schema::object()
            .required("command", Schema::string("Executable name (e.g. \"cargo\", \"rg\", \"git\")."))
            .property("args", Schema::array("Arguments array.", Schema::String { description: None }))
            .property("timeout_sec", Schema::integer("Timeout seconds (default 60)."))
    }

    async fn execute(&self, ctx: &ToolContext, arguments: &str) -> Result<ToolResult, ToolError> {
        if !self.enabled {
            return Err(ToolError::Disabled { tool_name: self.name().into() });
        }

        let input: Input = parse_arguments(arguments)?;
        if input.command.is_empty() {
            return Err(ToolError::InvalidArguments("missing command".into()));
        }
        if !self.allowlist.allows_command(&input.command, &input.args) {
            warn!(command = %input.command, "Command blocked by allowlist");
            return Err(ToolError::denied(self.name(), "command is not in allowlist"));
        }

        debug!(command = %input.command, args = ?input.args, "Running command");
        let mut cmd = Command::new(&input.command);
        cmd.args(&input.args).current_dir(&self.root);
        let out = run_combined(self.name(), cmd, timeout_or_default(input.timeout_sec), ctx).await?;

        if !out.success {
            return Err(ToolError::failed(self.name(), out.text));
        }
        Ok(ToolResult::new(truncate_output(&out.text, COMMAND_OUTPUT_LIMIT)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tool(enabled: bool, prefixes: &[&str]) -> RunCommandTool {
        RunCommandTool::new(".", enabled, PrefixAllowlist::new(prefixes.iter().copied()))
    }

    #[tokio::test]
    async fn disabled_by_default() {
        let err = tool(false, &["echo"])
            .execute(&ToolContext::default(), r#"{"command":"echo","args":["hi"]}"#)
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Disabled { .. }));
    }

    #[tokio::test]
    async fn allowlisted_command_runs() {
        let result = tool(true, &["echo hi"])
            .execute(&ToolContext::default(), r#"{"command":"echo","args":["hi","there"]}"#)
            .await
            .unwrap();
        assert_eq!(result.content.trim(), "hi there");
    }

    #[tokio::test]
    async fn command_outside_allowlist_is_denied() {
        let err = tool(true, &["git status"])
            .execute(&ToolContext::default(), r#"{"command":"rm","args":["-rf","/"]}"#)
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::PermissionDenied { .. }));
    }

    #[tokio::test]
    async fn empty_allowlist_denies_everything() {
        let err = tool(true, &[])
            .execute(&ToolContext::default(), r#"{"command":"echo"}"#)
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::PermissionDenied { .. }));
    }

    #[tokio::test]
    async fn failing_command_surfaces_output() {
        let err = tool(true, &["sh"])
            .execute(&ToolContext::default(), r#"{"command":"sh","args":["-c","echo oops; exit 3"]}"#)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("oops"));
    }

    #[tokio::test]
    async fn long_output_is_truncated() {
        let result = tool(true, &["sh"])
            .execute(
                &ToolContext::default(),
                r#"{"command":"sh","args":["-c","head -c 30000 /dev/zero | tr '\\0' 'a'"]}"#,
            )
            .await
            .unwrap();
        assert!(result.content.ends_with("...(truncated)"));
        assert_eq!(result.content.chars().count(), COMMAND_OUTPUT_LIMIT + "...(truncated)".len());
    }
}
