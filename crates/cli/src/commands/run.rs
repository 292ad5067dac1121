//! `toolweave -p "..."` — answer one prompt and exit.

use toolweave_agent::PromptMode;
use toolweave_config::AppConfig;

use crate::args::CommonArgs;
use crate::setup::build_runtime;

pub async fn run(config: &AppConfig, args: &CommonArgs, prompt: &str) -> anyhow::Result<()> {
    let rt = build_runtime(config, args.session_id.clone(), PromptMode::Default).await?;
    eprintln!("session: {}", rt.session_id);

    super::drive_turn(&rt.engine, &rt.session_id, prompt, rt.stream).await?;
    Ok(())
}
