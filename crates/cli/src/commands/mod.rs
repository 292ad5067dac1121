//! Subcommand implementations.

pub mod chat;
pub mod run;
pub mod tools;

use std::io::Write;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use toolweave_agent::{AgentStreamEvent, Engine, TurnOutcome};
use toolweave_core::error::Error;

/// Run one turn, rendering streamed output as it arrives.
///
/// Ctrl-C cancels the turn rather than the process; the partial turn is
/// never persisted.
pub async fn drive_turn(engine: &Arc<Engine>, session_id: &str, input: &str, stream: bool) -> Result<TurnOutcome, Error> {
    let cancel = CancellationToken::new();
    let interrupt = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("\n[interrupted]");
                cancel.cancel();
            }
        })
    };

    let result = if stream {
        let (mut events, handle) = engine.run_stream(cancel.clone(), session_id, input);
        while let Some(event) = events.recv().await {
            render(&event);
        }
        println!();
        handle.await.map_err(|e| Error::Internal(format!("turn task failed: {e}")))?
    } else {
        let outcome = engine.run(&cancel, session_id, input).await;
        if let Ok(out) = &outcome {
            println!("{}", out.reply);
        }
        outcome
    };

    interrupt.abort();
    result
}

fn render(event: &AgentStreamEvent) {
    match event {
        AgentStreamEvent::Chunk { content } => {
            print!("{content}");
            let _ = std::io::stdout().flush();
        }
        AgentStreamEvent::ToolStarted { name, .. } => eprintln!("\n[tool] {name}"),
        AgentStreamEvent::ToolFinished { name, .. } => eprintln!("[tool done] {name}"),
        AgentStreamEvent::Done { .. } => {}
    }
}
