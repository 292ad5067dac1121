//! Wiring: configuration, provider, session log, tools and engine.

use std::sync::Arc;

use anyhow::{Context, bail};
use toolweave_agent::{Engine, PromptMode};
use toolweave_config::AppConfig;
use toolweave_core::provider::Provider;
use toolweave_core::session::{SessionLog, new_session_id};
use toolweave_core::tool::ToolRegistry;
use toolweave_providers::OpenAiCompatProvider;
use toolweave_session::JsonlSessionStore;
use toolweave_tools::{BuiltinConfig, builtin_registry};
use tracing::{info, warn};

use crate::args::CommonArgs;
use crate::prompter::TtyPrompter;

/// Everything a command needs to run turns.
pub struct Runtime {
    pub engine: Arc<Engine>,
    pub session_id: String,
    pub stream: bool,
}

/// File, then environment, then flags.
pub fn load_config(args: &CommonArgs) -> anyhow::Result<AppConfig> {
    let mut config = AppConfig::load(args.config.as_deref()).context("Failed to load config")?;
    args.apply(&mut config);
    config.validate()?;
    Ok(config)
}

/// The built-in tool set for `config`, bound to `session_id`.
pub fn build_tools(
    config: &AppConfig,
    log: Arc<dyn SessionLog>,
    session_id: &str,
) -> anyhow::Result<ToolRegistry> {
    let tools = &config.tools;
    let builtin = BuiltinConfig {
        session_log: Some(log),
        session_id: Some(session_id.to_string()),
        enable_run_command: tools.enable_run_command,
        allow_command_prefix: tools.allow_command_prefix.clone(),
        enable_bash: tools.enable_bash,
        allow_bash_prefix: tools.allow_bash_prefix.clone(),
        enable_http_get: tools.enable_http_get,
        allow_url_prefix: tools.allow_url_prefix.clone(),
        enable_duckdb: tools.enable_duckdb,
        enable_web_search: tools.enable_web_search,
        web_search_provider: tools.web_search_provider.clone(),
        brave_api_key: tools.brave_api_key.clone(),
        allow_search_domain: tools.allow_search_domain.clone(),
        web_search_max_results: tools.web_search_max_results,
        prompter: Some(Arc::new(TtyPrompter::open())),
        ..BuiltinConfig::new(config.repo_root())
    };
    Ok(builtin_registry(builtin)?)
}

pub fn session_store(config: &AppConfig) -> Arc<JsonlSessionStore> {
    Arc::new(JsonlSessionStore::new(config.session_dir()))
}

/// Build the engine for one session. Prints the auto-selected model, if
/// any, to stderr.
pub async fn build_runtime(
    config: &AppConfig,
    session_id: Option<String>,
    mode: PromptMode,
) -> anyhow::Result<Runtime> {
    let session_id = session_id
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(new_session_id);

    let store = session_store(config);
    if let Err(e) = store.ensure_dir().await {
        warn!(error = %e, "Could not create session directory");
    }
    let tools = build_tools(config, store.clone(), &session_id)?;

    let provider = OpenAiCompatProvider::new(&config.base_url, config.api_key.clone(), config.request_timeout())
        .context("Failed to build completion client")?;
    let model = resolve_model(&provider, config).await?;

    let engine = Engine::new(
        Arc::new(provider),
        Arc::new(tools),
        store,
        config.agent_config(&model, mode.system_prompt()),
    )?;
    info!(model = %model, session_id = %session_id, tools = engine.tools().len(), "Engine ready");

    Ok(Runtime {
        engine: Arc::new(engine),
        session_id,
        stream: config.stream,
    })
}

async fn resolve_model(provider: &OpenAiCompatProvider, config: &AppConfig) -> anyhow::Result<String> {
    if !config.wants_model_detection() {
        return Ok(config.model.trim().to_string());
    }

    let ids = provider.list_models().await.with_context(|| {
        format!(
            "model not provided and failed to auto-detect via {}/models",
            provider.base_url()
        )
    })?;
    let Some(model) = ids.into_iter().next() else {
        bail!("no models returned by {}/models", provider.base_url());
    };
    eprintln!("auto-selected model: {model}");
    Ok(model)
}
