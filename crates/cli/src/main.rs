//! toolweave CLI — the main entry point.
//!
//! Commands:
//! - `chat`  — Interactive chat
//! - `code`  — Interactive chat with the coding prompt
//! - `run`   — One-shot prompt (also `toolweave -p "..."`)
//! - `tools` — Print the tool catalog as JSON

use clap::{CommandFactory, Parser};
use toolweave_agent::PromptMode;
use tracing_subscriber::EnvFilter;

mod args;
mod commands;
mod prompter;
mod setup;

use args::{Cli, Commands};

fn init_tracing(verbose: bool, json: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.common.verbose, cli.common.log_json);

    let config = setup::load_config(&cli.common)?;
    tracing::debug!(?config, "Configuration loaded");

    match (cli.command, cli.prompt) {
        (Some(Commands::Chat), _) => commands::chat::run(&config, &cli.common, PromptMode::Default).await?,
        (Some(Commands::Code), _) => commands::chat::run(&config, &cli.common, PromptMode::Coding).await?,
        (Some(Commands::Run { prompt }), _) | (None, Some(prompt)) => {
            commands::run::run(&config, &cli.common, &prompt).await?
        }
        (Some(Commands::Tools), _) => commands::tools::run(&config, &cli.common).await?,
        (None, None) => {
            Cli::command().print_help()?;
            std::process::exit(2);
        }
    }

    Ok(())
}
