//! Built-in tool implementations for toolweave.
//!
//! Tools give the agent the ability to work on a repository: list, read and
//! search files, apply patches, run allowlisted commands, fetch URLs, search
//! the web, query DuckDB files, ask the user, and look back over the
//! session. Everything that touches the filesystem is confined to the
//! configured repository root.
//!
//! Tools that reach outside the repository (commands, scripts, HTTP, web
//! search, DuckDB) are registered but disabled unless configuration turns
//! them on.

pub mod apply_patch;
pub mod ask_user;
pub mod bash;
pub mod duckdb_query;
mod http;
pub mod http_get;
pub mod list_files;
mod process;
pub mod read_file;
pub mod run_command;
pub mod search_repo;
pub mod session_context;
pub mod web_search;

use std::path::PathBuf;
use std::sync::Arc;

use toolweave_core::error::ToolError;
use toolweave_core::session::SessionLog;
use toolweave_core::tool::ToolRegistry;
use toolweave_security::{DomainAllowlist, PrefixAllowlist};

pub use ask_user::{AskUserTool, UserAnswer, UserPrompter, resolve_answer};
pub use web_search::{SearchBackend, SearchQuery, SearchResult};

/// Everything [`builtin_registry`] needs to construct the built-in tools.
#[derive(Clone, Default)]
pub struct BuiltinConfig {
    pub repo_root: PathBuf,
    /// Session log backing `get_session_context`
    pub session_log: Option<Arc<dyn SessionLog>>,
    pub session_id: Option<String>,
    pub enable_run_command: bool,
    pub allow_command_prefix: Vec<String>,
    pub enable_bash: bool,
    pub allow_bash_prefix: Vec<String>,
    pub enable_http_get: bool,
    pub allow_url_prefix: Vec<String>,
    pub enable_duckdb: bool,
    pub enable_web_search: bool,
    pub web_search_provider: String,
    pub brave_api_key: Option<String>,
    pub allow_search_domain: Vec<String>,
    pub web_search_max_results: usize,
    pub prompter: Option<Arc<dyn UserPrompter>>,
}

impl BuiltinConfig {
    pub fn new(repo_root: impl Into<PathBuf>) -> Self {
        Self {
            repo_root: repo_root.into(),
            ..Self::default()
        }
    }
}

impl std::fmt::Debug for BuiltinConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuiltinConfig")
            .field("repo_root", &self.repo_root)
            .field("session_id", &self.session_id)
            .field("enable_run_command", &self.enable_run_command)
            .field("enable_bash", &self.enable_bash)
            .field("enable_http_get", &self.enable_http_get)
            .field("enable_duckdb", &self.enable_duckdb)
            .field("enable_web_search", &self.enable_web_search)
            .field("brave_api_key", &self.brave_api_key.as_ref().map(|_| "[REDACTED]"))
            .field("prompter", &self.prompter.is_some())
            .finish_non_exhaustive()
    }
}

/// Build a registry holding every built-in tool, in a fixed order.
///
/// `get_session_context` is only registered when both a session log and a
/// session id are configured.
pub fn builtin_registry(cfg: BuiltinConfig) -> Result<ToolRegistry, ToolError> {
    let root = cfg.repo_root;
    let mut registry = ToolRegistry::new();

    registry.register(Arc::new(list_files::ListFilesTool::new(&root)));
    registry.register(Arc::new(read_file::ReadFileTool::new(&root)));
    registry.register(Arc::new(search_repo::SearchRepoTool::new(&root)));
    registry.register(Arc::new(apply_patch::ApplyPatchTool::new(&root)));
    registry.register(Arc::new(run_command::RunCommandTool::new(
        &root,
        cfg.enable_run_command,
        PrefixAllowlist::new(cfg.allow_command_prefix),
    )));
    registry.register(Arc::new(bash::BashTool::new(
        &root,
        cfg.enable_bash,
        PrefixAllowlist::new(cfg.allow_bash_prefix),
    )));
    registry.register(Arc::new(http_get::HttpGetTool::new(
        cfg.enable_http_get,
        PrefixAllowlist::new(cfg.allow_url_prefix),
    )?));
    registry.register(Arc::new(duckdb_query::DuckDbQueryTool::new(&root, cfg.enable_duckdb)));
    registry.register(Arc::new(web_search::WebSearchTool::new(
        cfg.enable_web_search,
        &cfg.web_search_provider,
        cfg.brave_api_key,
        DomainAllowlist::new(cfg.allow_search_domain),
        cfg.web_search_max_results,
    )?));
    registry.register(Arc::new(AskUserTool::new(cfg.prompter)));

    if let (Some(log), Some(session_id)) = (cfg.session_log, cfg.session_id.filter(|s| !s.is_empty())) {
        registry.register(Arc::new(session_context::SessionContextTool::new(log, session_id)));
    }

    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use toolweave_core::session::{SessionContext, SessionContextRequest, TurnRecord};
    use toolweave_core::{CancellationToken, SessionError};

    struct NullLog;

    #[async_trait::async_trait]
    impl SessionLog for NullLog {
        async fn append_turn(&self, _c: &CancellationToken, _r: &TurnRecord) -> Result<(), SessionError> {
            Ok(())
        }
        async fn load_recent_turns(
            &self,
            _c: &CancellationToken,
            _s: &str,
            _n: usize,
        ) -> Result<Vec<TurnRecord>, SessionError> {
            Ok(Vec::new())
        }
        async fn session_context(
            &self,
            _c: &CancellationToken,
            s: &str,
            r: &SessionContextRequest,
        ) -> Result<SessionContext, SessionError> {
            Ok(SessionContext::from_turns(s, &[], r))
        }
    }

    #[test]
    fn registers_builtins_in_fixed_order() {
        let registry = builtin_registry(BuiltinConfig::new(".")).unwrap();
        assert_eq!(
            registry.names(),
            vec![
                "list_files",
                "read_file",
                "search_repo",
                "apply_patch",
                "run_command",
                "bash",
                "http_get",
                "duckdb_query",
                "web_search",
                "ask_user",
            ]
        );
    }

    #[test]
    fn session_tool_needs_log_and_id() {
        let mut cfg = BuiltinConfig::new(".");
        cfg.session_log = Some(Arc::new(NullLog));
        assert!(builtin_registry(cfg.clone()).unwrap().get("get_session_context").is_none());

        cfg.session_id = Some("abc".into());
        let registry = builtin_registry(cfg).unwrap();
        assert_eq!(registry.names().last(), Some(&"get_session_context"));
        assert_eq!(registry.len(), 11);
    }

    #[test]
    fn every_definition_has_object_schema() {
        let registry = builtin_registry(BuiltinConfig::new(".")).unwrap();
        for def in registry.definitions() {
            assert_eq!(def.parameters["type"], "object", "{}", def.name);
            assert!(!def.description.is_empty());
        }
    }
}
