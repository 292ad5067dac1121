//! Terminal prompter for `ask_user`.
//!
//! Questions go to stderr and answers are read from `/dev/tty`, so the tool
//! works even while stdin is busy feeding the chat loop.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use toolweave_core::error::ToolError;
use toolweave_core::tool::ToolContext;
use toolweave_tools::{UserAnswer, UserPrompter, resolve_answer};
use tracing::debug;

const TOOL_NAME: &str = "ask_user";

pub struct TtyPrompter {
    tty: Option<Arc<Mutex<BufReader<File>>>>,
}

impl TtyPrompter {
    /// Open the controlling terminal. Without one, every question fails.
    pub fn open() -> Self {
        let tty = match OpenOptions::new().read(true).write(true).open("/dev/tty") {
            Ok(file) => Some(Arc::new(Mutex::new(BufReader::new(file)))),
            Err(e) => {
                debug!(error = %e, "No controlling terminal; ask_user is unavailable");
                None
            }
        };
        Self { tty }
    }
}

fn input_hint(options: &[String], allow_freeform: bool) -> &'static str {
    match (options.is_empty(), allow_freeform) {
        (false, true) => "Choose a number, or type an answer: ",
        (false, false) => "Choose a number: ",
        (true, _) => "Answer: ",
    }
}

fn read_line(tty: &Mutex<BufReader<File>>) -> Result<String, String> {
    let mut reader = tty.lock().map_err(|_| "terminal reader poisoned".to_string())?;
    let mut line = String::new();
    match reader.read_line(&mut line) {
        Ok(0) => Err("terminal closed".into()),
        Ok(_) => Ok(line),
        Err(e) => Err(e.to_string()),
    }
}

#[async_trait]
impl UserPrompter for TtyPrompter {
    async fn ask(
        &self,
        ctx: &ToolContext,
        question: &str,
        options: &[String],
        allow_freeform: bool,
    ) -> Result<UserAnswer, ToolError> {
        let Some(tty) = self.tty.as_ref() else {
            return Err(ToolError::failed(TOOL_NAME, "no tty available"));
        };

        eprintln!("\n[ask_user] {question}");
        for (i, option) in options.iter().enumerate() {
            eprintln!("  {}) {option}", i + 1);
        }

        loop {
            eprint!("{}", input_hint(options, allow_freeform));
            let _ = std::io::stderr().flush();

            let tty = Arc::clone(tty);
            let read = tokio::task::spawn_blocking(move || read_line(&tty));
            let line = tokio::select! {
                biased;
                _ = ctx.cancelled() => return Err(ToolError::Cancelled),
                joined = read => joined
                    .map_err(|e| ToolError::failed(TOOL_NAME, e))?
                    .map_err(|e| ToolError::failed(TOOL_NAME, e))?,
            };

            if let Some(answer) = resolve_answer(&line, options, allow_freeform) {
                return Ok(answer);
            }
        }
    }
}
