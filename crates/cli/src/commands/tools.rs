//! `toolweave tools` — print the tool catalog.

use serde_json::{Value, json};
use toolweave_config::AppConfig;
use toolweave_core::tool::ToolRegistry;

use crate::args::CommonArgs;
use crate::setup::{build_tools, session_store};

pub async fn run(config: &AppConfig, args: &CommonArgs) -> anyhow::Result<()> {
    let session_id = args.session_id.as_deref().unwrap_or("tools");
    let registry = build_tools(config, session_store(config), session_id)?;
    println!("{}", serde_json::to_string_pretty(&catalog(&registry))?);
    Ok(())
}

/// `[{name, description, schema}]` in registration order.
fn catalog(registry: &ToolRegistry) -> Value {
    registry
        .all()
        .iter()
        .map(|tool| {
            json!({
                "name": tool.name(),
                "description": tool.description(),
                "schema": tool.input_schema().to_json(),
            })
        })
        .collect()
}
