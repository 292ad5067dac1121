//! Child-process plumbing shared by the command-running tools.

use std::process::Stdio;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use toolweave_core::error::ToolError;
use toolweave_core::tool::ToolContext;
use tracing::debug;

/// Exit status plus stdout and stderr, concatenated in that order.
#[derive(Debug)]
pub(crate) struct CombinedOutput {
    pub success: bool,
    pub code: Option<i32>,
    pub text: String,
}

/// Run `cmd` to completion, bounded by `timeout` and the invocation's
/// cancellation token. The child is killed if either fires first.
pub(crate) async fn run_combined(
    tool_name: &str,
    cmd: Command,
    timeout: Duration,
    ctx: &ToolContext,
) -> Result<CombinedOutput, ToolError> {
    run_with_input(tool_name, cmd, None, timeout, ctx).await
}

/// Like [`run_combined`], writing `input` to the child's stdin first.
pub(crate) async fn run_with_input(
    tool_name: &str,
    mut cmd: Command,
    input: Option<&[u8]>,
    timeout: Duration,
    ctx: &ToolContext,
) -> Result<CombinedOutput, ToolError> {
    cmd.kill_on_drop(true)
        .stdin(if input.is_some() { Stdio::piped() } else { Stdio::null() })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let run = async {
        let mut child = cmd.spawn()?;
        if let (Some(bytes), Some(mut stdin)) = (input, child.stdin.take()) {
            stdin.write_all(bytes).await?;
        }
        child.wait_with_output().await
    };

    let output = tokio::select! {
        biased;
        _ = ctx.cancelled() => return Err(ToolError::Cancelled),
        res = tokio::time::timeout(timeout, run) => match res {
            Err(_) => {
                return Err(ToolError::Timeout {
                    tool_name: tool_name.to_string(),
                    timeout_secs: timeout.as_secs(),
                });
            }
            Ok(Err(e)) => return Err(ToolError::failed(tool_name, format!("failed to run process: {e}"))),
            Ok(Ok(output)) => output,
        },
    };

    let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
    text.push_str(&String::from_utf8_lossy(&output.stderr));

    debug!(
        tool = tool_name,
        code = ?output.status.code(),
        bytes = text.len(),
        "Process finished"
    );

    Ok(CombinedOutput {
        success: output.status.success(),
        code: output.status.code(),
        text,
    })
}

/// `timeout_sec` argument with the usual 60 second default for zero or
/// missing values.
pub(crate) fn timeout_or_default(timeout_sec: Option<u64>) -> Duration {
    match timeout_sec {
        Some(secs) if secs > 0 => Duration::from_secs(secs),
        _ => Duration::from_secs(60),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_util::sync::CancellationToken;

    #[tokio::test]
    async fn captures_stdout_and_stderr() {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", "echo out; echo err 1>&2"]);
        let out = run_combined("test", cmd, Duration::from_secs(5), &ToolContext::default())
            .await
            .unwrap();
        assert!(out.success);
        assert_eq!(out.code, Some(0));
        assert!(out.text.contains("out"));
        assert!(out.text.contains("err"));
    }

    #[tokio::test]
    async fn slow_process_times_out() {
        let mut cmd = Command::new("sleep");
        cmd.arg("5");
        let err = run_combined("test", cmd, Duration::from_millis(100), &ToolContext::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Timeout { .. }));
    }

    #[tokio::test]
    async fn cancelled_context_stops_process() {
        let token = CancellationToken::new();
        token.cancel();
        let mut cmd = Command::new("sleep");
        cmd.arg("5");
        let err = run_combined("test", cmd, Duration::from_secs(10), &ToolContext::new(token))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Cancelled));
    }

    #[tokio::test]
    async fn input_is_piped_to_stdin() {
        let cmd = Command::new("cat");
        let out = run_with_input("test", cmd, Some(b"piped"), Duration::from_secs(5), &ToolContext::default())
            .await
            .unwrap();
        assert_eq!(out.text, "piped");
    }

    #[test]
    fn zero_timeout_uses_default() {
        assert_eq!(timeout_or_default(None), Duration::from_secs(60));
        assert_eq!(timeout_or_default(Some(0)), Duration::from_secs(60));
        assert_eq!(timeout_or_default(Some(5)), Duration::from_secs(5));
    }
}
