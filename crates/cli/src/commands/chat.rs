//! `toolweave chat` / `toolweave code` — interactive loop.

use std::io::Write;

use tokio::io::{AsyncBufReadExt, BufReader};
use toolweave_agent::PromptMode;
use toolweave_config::AppConfig;

use crate::args::CommonArgs;
use crate::setup::build_runtime;

pub async fn run(config: &AppConfig, args: &CommonArgs, mode: PromptMode) -> anyhow::Result<()> {
    let rt = build_runtime(config, args.session_id.clone(), mode).await?;

    println!("session: {}", rt.session_id);
    println!("type 'exit' to quit");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if is_exit(line) {
            break;
        }

        if let Err(e) = super::drive_turn(&rt.engine, &rt.session_id, line, rt.stream).await {
            eprintln!("error: {e}");
        }
    }

    Ok(())
}

fn is_exit(line: &str) -> bool {
    matches!(line, "exit" | "quit")
}
