//! Configuration loading and validation for toolweave.
//!
//! Loads configuration from `./toolweave.toml` (or an explicit path) with
//! environment variable overrides. Command-line flags are layered on top by
//! the binary. Validates all limits at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use toolweave_core::AgentConfig;

/// Default config file name, looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = "toolweave.toml";

/// The root configuration structure.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Base URL of the OpenAI-compatible completion service
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Bearer token for the completion service
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Model id; empty or `"auto"` picks the first model the service lists
    #[serde(default = "default_model")]
    pub model: String,

    /// Root that every file tool is confined to (default: working directory)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo_root: Option<PathBuf>,

    /// Directory holding `<session>.jsonl` logs (default: `<repo_root>/sessions`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_dir: Option<PathBuf>,

    /// Prior turns replayed into each prompt
    #[serde(default = "default_recent_turns")]
    pub recent_turns: usize,

    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    #[serde(default = "default_max_tool_concurrency")]
    pub max_tool_concurrency: usize,

    #[serde(default = "default_tool_timeout_secs")]
    pub tool_timeout_secs: u64,

    /// Whole-request timeout for completion calls
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Stream replies as they are generated
    #[serde(default = "default_true")]
    pub stream: bool,

    /// Built-in tool switches and allowlists
    #[serde(default)]
    pub tools: ToolsConfig,
}

fn default_base_url() -> String {
    "http://127.0.0.1:8080/v1".into()
}
fn default_model() -> String {
    "auto".into()
}
fn default_recent_turns() -> usize {
    2
}
fn default_max_iterations() -> u32 {
    25
}
fn default_max_tool_concurrency() -> usize {
    4
}
fn default_tool_timeout_secs() -> u64 {
    60
}
fn default_request_timeout_secs() -> u64 {
    120
}
fn default_true() -> bool {
    true
}

fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &redact(&self.api_key))
            .field("model", &self.model)
            .field("repo_root", &self.repo_root)
            .field("session_dir", &self.session_dir)
            .field("recent_turns", &self.recent_turns)
            .field("max_iterations", &self.max_iterations)
            .field("max_tool_concurrency", &self.max_tool_concurrency)
            .field("tool_timeout_secs", &self.tool_timeout_secs)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("stream", &self.stream)
            .field("tools", &self.tools)
            .finish()
    }
}

/// The `[tools]` table. Every tool that leaves the repository or executes
/// code is off until enabled here or by flag.
#[derive(Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    #[serde(default)]
    pub enable_run_command: bool,

    #[serde(default)]
    pub allow_command_prefix: Vec<String>,

    #[serde(default)]
    pub enable_bash: bool,

    #[serde(default)]
    pub allow_bash_prefix: Vec<String>,

    #[serde(default)]
    pub enable_http_get: bool,

    #[serde(default)]
    pub allow_url_prefix: Vec<String>,

    #[serde(default)]
    pub enable_duckdb: bool,

    #[serde(default)]
    pub enable_web_search: bool,

    #[serde(default = "default_search_provider")]
    pub web_search_provider: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brave_api_key: Option<String>,

    #[serde(default)]
    pub allow_search_domain: Vec<String>,

    #[serde(default = "default_search_max_results")]
    pub web_search_max_results: usize,
}

fn default_search_provider() -> String {
    "brave".into()
}
fn default_search_max_results() -> usize {
    8
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            enable_run_command: false,
            allow_command_prefix: Vec::new(),
            enable_bash: false,
            allow_bash_prefix: Vec::new(),
            enable_http_get: false,
            allow_url_prefix: Vec::new(),
            enable_duckdb: false,
            enable_web_search: false,
            web_search_provider: default_search_provider(),
            brave_api_key: None,
            allow_search_domain: Vec::new(),
            web_search_max_results: default_search_max_results(),
        }
    }
}

impl std::fmt::Debug for ToolsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolsConfig")
            .field("enable_run_command", &self.enable_run_command)
            .field("allow_command_prefix", &self.allow_command_prefix)
            .field("enable_bash", &self.enable_bash)
            .field("allow_bash_prefix", &self.allow_bash_prefix)
            .field("enable_http_get", &self.enable_http_get)
            .field("allow_url_prefix", &self.allow_url_prefix)
            .field("enable_duckdb", &self.enable_duckdb)
            .field("enable_web_search", &self.enable_web_search)
            .field("web_search_provider", &self.web_search_provider)
            .field("brave_api_key", &redact(&self.brave_api_key))
            .field("allow_search_domain", &self.allow_search_domain)
            .field("web_search_max_results", &self.web_search_max_results)
            .finish()
    }
}

impl AppConfig {
    /// Load `./toolweave.toml` (if present) and apply environment overrides.
    ///
    /// Environment variables:
    /// - `TOOLWEAVE_BASE_URL`, `TOOLWEAVE_MODEL`
    /// - `TOOLWEAVE_API_KEY`, falling back to `OPENAI_API_KEY`
    /// - `BRAVE_SEARCH_API_KEY` when no Brave key is configured
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = path.map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from(CONFIG_FILE_NAME));
        let mut config = Self::load_from(&path)?;
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from an environment lookup.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = non_empty("TOOLWEAVE_BASE_URL") {
            self.base_url = url;
        }
        if let Some(model) = non_empty("TOOLWEAVE_MODEL") {
            self.model = model;
        }
        if let Some(key) = non_empty("TOOLWEAVE_API_KEY").or_else(|| non_empty("OPENAI_API_KEY")) {
            self.api_key = Some(key);
        }
        if self.tools.brave_api_key.is_none() {
            self.tools.brave_api_key = non_empty("BRAVE_SEARCH_API_KEY");
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.base_url.trim().is_empty() {
            return Err(ConfigError::ValidationError("base_url must not be empty".into()));
        }
        if self.max_iterations == 0 {
            return Err(ConfigError::ValidationError("max_iterations must be > 0".into()));
        }
        if self.max_tool_concurrency == 0 {
            return Err(ConfigError::ValidationError("max_tool_concurrency must be > 0".into()));
        }
        if self.tool_timeout_secs == 0 {
            return Err(ConfigError::ValidationError("tool_timeout_secs must be > 0".into()));
        }
        Ok(())
    }

    /// True when the model should be discovered from the service.
    pub fn wants_model_detection(&self) -> bool {
        let m = self.model.trim();
        m.is_empty() || m.eq_ignore_ascii_case("auto")
    }

    /// Repository root, defaulting to the working directory.
    pub fn repo_root(&self) -> PathBuf {
        self.repo_root.clone().unwrap_or_else(|| PathBuf::from("."))
    }

    /// Session directory, defaulting to `<repo_root>/sessions`.
    pub fn session_dir(&self) -> PathBuf {
        self.session_dir
            .clone()
            .unwrap_or_else(|| self.repo_root().join("sessions"))
    }

    pub fn tool_timeout(&self) -> Duration {
        Duration::from_secs(self.tool_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Orchestrator settings for a resolved model and prompt.
    pub fn agent_config(&self, model: &str, system_prompt: &str) -> AgentConfig {
        AgentConfig {
            recent_turns: self.recent_turns,
            max_iterations: self.max_iterations,
            max_tool_concurrency: self.max_tool_concurrency,
            tool_timeout: self.tool_timeout(),
            ..AgentConfig::new(model, system_prompt)
        }
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        toml::to_string_pretty(&Self::default()).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: None,
            model: default_model(),
            repo_root: None,
            session_dir: None,
            recent_turns: default_recent_turns(),
            max_iterations: default_max_iterations(),
            max_tool_concurrency: default_max_tool_concurrency(),
            tool_timeout_secs: default_tool_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            stream: true,
            tools: ToolsConfig::default(),
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
