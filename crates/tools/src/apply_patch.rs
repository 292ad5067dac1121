//! `apply_patch` — apply a unified diff with `git apply`.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;
use toolweave_core::error::ToolError;
use toolweave_core::schema::Schema;
use toolweave_core::tool::{Tool, ToolContext, ToolResult, parse_arguments};
use tracing::info;

use crate::process::run_with_input;

const PATCH_TIMEOUT: Duration = Duration::from_secs(60);

pub struct ApplyPatchTool {
    root: PathBuf,
}

impl ApplyPatchTool {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Run `git apply <extra> -` with the patch on stdin.
    async fn git_apply(&self, ctx: &ToolContext, extra: &[&str], patch: &str) -> Result<(), ToolError> {
        let mut cmd = Command::new("git");
        cmd.arg("apply").args(extra).arg("-").current_dir(&self.root);
        let out = run_with_input(self.name(), cmd, Some(patch.as_bytes()), PATCH_TIMEOUT, ctx).await?;
        if out.success {
            Ok(())
        } else {
            Err(ToolError::failed(self.name(), out.text.trim_end()))
        }
    }
}

#[derive(Debug, Deserialize)]
struct Input {
    patch: String,
}

#[async_trait]
impl Tool for ApplyPatchTool {
    fn name(&self) -> &str {
        "apply_patch"
    }

    fn description(&self) -> &str {
        "Apply a unified diff patch to the repo using `git apply`. Requires the target repo to be a git repository."
    }

    fn input_schema(&self) -> Schema {
        Schema::object().required("patch", Schema::string("Unified diff patch."))
    }

    async fn execute(&self, ctx: &ToolContext, arguments: &str) -> Result<ToolResult, ToolError> {
        let input: Input = parse_arguments(arguments)?;
        if input.patch.is_empty() {
            return Err(ToolError::InvalidArguments("missing patch".into()));
        }

        if tokio::fs::metadata(self.root.join(".git")).await.is_err() {
            return Err(ToolError::failed(
                self.name(),
                "requires a git repository (missing .git)",
            ));
        }

        // A dry run first gives a clean error without touching the tree.
        self.git_apply(ctx, &["--check"], &input.patch).await?;
        self.git_apply(ctx, &[], &input.patch).await?;

        info!(root = %self.root.display(), "Patch applied");
        Ok(ToolResult::new("Patch applied."))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn has_git() -> bool {
        std::process::Command::new("git").arg("--version").output().is_ok()
    }

    const PATCH: &str = "--- a/hello.txt\n+++ b/hello.txt\n@@ -1 +1 @@\n-hello\n+hello, world\n";

    #[tokio::test]
    async fn requires_git_directory() {
        let dir = tempfile::tempdir().unwrap();
        let tool = ApplyPatchTool::new(dir.path());
        let args = serde_json::json!({ "patch": PATCH }).to_string();
        let err = tool.execute(&ToolContext::default(), &args).await.unwrap_err();
        assert!(err.to_string().contains("missing .git"));
    }

    #[tokio::test]
    async fn empty_patch_is_invalid() {
        let tool = ApplyPatchTool::new(".");
        let err = tool.execute(&ToolContext::default(), r#"{"patch":""}"#).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }

    #[tokio::test]
    async fn applies_clean_patch_and_rejects_bad_one() {
        if !has_git() {
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let status = std::process::Command::new("git")
            .args(["init", "-q"])
            .current_dir(dir.path())
            .status()
            .unwrap();
        assert!(status.success());
        std::fs::write(dir.path().join("hello.txt"), "hello\n").unwrap();

        let tool = ApplyPatchTool::new(dir.path());
        let args = serde_json::json!({ "patch": PATCH }).to_string();
        let ok = tool.execute(&ToolContext::default(), &args).await.unwrap();
        assert_eq!(ok.content, "Patch applied.");
        assert_eq!(std::fs::read_to_string(dir.path().join("hello.txt")).unwrap(), "hello, world\n");

        // Same patch no longer applies; the check step reports it.
        let err = tool.execute(&ToolContext::default(), &args).await.unwrap_err();
        assert!(matches!(err, ToolError::ExecutionFailed { .. }));
    }
}
