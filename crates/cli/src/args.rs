//! Command-line surface.
//!
//! Flags shared by every command are global, so both `toolweave chat
//! --model m` and `toolweave --model m chat` work. They are layered over the
//! file and environment configuration by [`CommonArgs::apply`].

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use toolweave_config::AppConfig;

#[derive(Parser, Debug)]
#[command(
    name = "toolweave",
    about = "toolweave: a tool-calling coding agent for OpenAI-compatible servers",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// One-shot prompt (same as `toolweave run -p`)
    #[arg(short = 'p', long = "prompt")]
    pub prompt: Option<String>,

    #[command(flatten)]
    pub common: CommonArgs,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Interactive chat
    Chat,

    /// Interactive coding mode (more opinionated prompt)
    Code,

    /// Answer a single prompt and exit
    Run {
        #[arg(short = 'p', long = "prompt")]
        prompt: String,
    },

    /// Print the available tools as JSON
    Tools,
}

#[derive(Args, Debug, Default, Clone)]
pub struct CommonArgs {
    /// Config file (default ./toolweave.toml if present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    pub log_json: bool,

    /// OpenAI-compatible base URL
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    /// API key (usually unset for local servers)
    #[arg(long, global = true)]
    pub api_key: Option<String>,

    /// Model name, or "auto" to use the first listed model
    #[arg(long, global = true)]
    pub model: Option<String>,

    /// Repository root the file tools are confined to
    #[arg(long, global = true)]
    pub repo_root: Option<PathBuf>,

    /// Session log directory
    #[arg(long, global = true)]
    pub session_dir: Option<PathBuf>,

    /// Resume or pin a session id
    #[arg(long, global = true)]
    pub session_id: Option<String>,

    /// Prior turns replayed into each prompt
    #[arg(long, global = true)]
    pub recent_turns: Option<usize>,

    /// Print the whole reply at the end instead of streaming it
    #[arg(long, global = true)]
    pub no_stream: bool,

    #[arg(long, global = true)]
    pub enable_run_command: bool,

    /// Allowlisted command prefix (repeatable)
    #[arg(long = "allow-cmd-prefix", global = true)]
    pub allow_cmd_prefix: Vec<String>,

    #[arg(long, global = true)]
    pub enable_bash: bool,

    /// Allowlisted bash script prefix (repeatable)
    #[arg(long, global = true)]
    pub allow_bash_prefix: Vec<String>,

    #[arg(long, global = true)]
    pub enable_http_get: bool,

    /// Allowlisted URL prefix (repeatable)
    #[arg(long, global = true)]
    pub allow_url_prefix: Vec<String>,

    #[arg(long, global = true)]
    pub enable_duckdb: bool,

    #[arg(long, global = true)]
    pub enable_web_search: bool,

    #[arg(long, global = true)]
    pub web_search_provider: Option<String>,

    /// Brave Search API key (or set BRAVE_SEARCH_API_KEY)
    #[arg(long, global = true)]
    pub brave_api_key: Option<String>,

    /// Allowlisted search result domain (repeatable)
    #[arg(long, global = true)]
    pub allow_search_domain: Vec<String>,

    #[arg(long, global = true)]
    pub web_search_max_results: Option<usize>,
}

impl CommonArgs {
    /// Overlay explicitly given flags onto `config`. Switches only ever turn
    /// a tool on; lists replace the configured list when non-empty.
    pub fn apply(&self, config: &mut AppConfig) {
        fn set<T: Clone>(target: &mut T, value: &Option<T>) {
            if let Some(v) = value {
                *target = v.clone();
            }
        }
        fn replace(target: &mut Vec<String>, value: &[String]) {
            if !value.is_empty() {
                *target = value.to_vec();
            }
        }

        set(&mut config.base_url, &self.base_url);
        set(&mut config.model, &self.model);
        if self.api_key.is_some() {
            config.api_key = self.api_key.clone();
        }
        if self.repo_root.is_some() {
            config.repo_root = self.repo_root.clone();
        }
        if self.session_dir.is_some() {
            config.session_dir = self.session_dir.clone();
        }
        if let Some(n) = self.recent_turns.filter(|n| *n > 0) {
            config.recent_turns = n;
        }
        if self.no_stream {
            config.stream = false;
        }

        let tools = &mut config.tools;
        tools.enable_run_command |= self.enable_run_command;
        replace(&mut tools.allow_command_prefix, &self.allow_cmd_prefix);
        tools.enable_bash |= self.enable_bash;
        replace(&mut tools.allow_bash_prefix, &self.allow_bash_prefix);
        tools.enable_http_get |= self.enable_http_get;
        replace(&mut tools.allow_url_prefix, &self.allow_url_prefix);
        tools.enable_duckdb |= self.enable_duckdb;
        tools.enable_web_search |= self.enable_web_search;
        set(&mut tools.web_search_provider, &self.web_search_provider);
        if self.brave_api_key.is_some() {
            tools.brave_api_key = self.brave_api_key.clone();
        }
        replace(&mut tools.allow_search_domain, &self.allow_search_domain);
        if let Some(n) = self.web_search_max_results.filter(|n| *n > 0) {
            tools.web_search_max_results = n;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("toolweave").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn global_flags_work_on_either_side_of_subcommand() {
        let before = parse(&["--model", "m1", "chat"]);
        let after = parse(&["chat", "--model", "m1"]);
        assert_eq!(before.command, Some(Commands::Chat));
        assert_eq!(before.common.model.as_deref(), Some("m1"));
        assert_eq!(after.common.model.as_deref(), Some("m1"));
    }

    #[test]
    fn top_level_prompt_without_subcommand() {
        let cli = parse(&["-p", "hello", "--no-stream"]);
        assert!(cli.command.is_none());
        assert_eq!(cli.prompt.as_deref(), Some("hello"));
        assert!(cli.common.no_stream);
    }

    #[test]
    fn run_subcommand_takes_its_own_prompt() {
        let cli = parse(&["run", "-p", "explain main.rs"]);
        assert_eq!(cli.command, Some(Commands::Run { prompt: "explain main.rs".into() }));
    }

    #[test]
    fn repeatable_allowlists_collect() {
        let cli = parse(&[
            "code",
            "--enable-run-command",
            "--allow-cmd-prefix",
            "cargo test",
            "--allow-cmd-prefix",
            "git status",
        ]);
        assert!(cli.common.enable_run_command);
        assert_eq!(cli.common.allow_cmd_prefix, vec!["cargo test", "git status"]);
    }

    #[test]
    fn flags_overlay_config() {
        let mut config = AppConfig::default();
        config.tools.allow_url_prefix = vec!["https://docs.rs/".into()];
        config.tools.enable_duckdb = true;

        let cli = parse(&[
            "chat",
            "--base-url",
            "http://10.0.0.2:8000/v1",
            "--recent-turns",
            "5",
            "--enable-http-get",
            "--web-search-max-results",
            "3",
            "--no-stream",
        ]);
        cli.common.apply(&mut config);

        assert_eq!(config.base_url, "http://10.0.0.2:8000/v1");
        assert_eq!(config.recent_turns, 5);
        assert!(!config.stream);
        assert!(config.tools.enable_http_get);
        assert!(config.tools.enable_duckdb);
        assert_eq!(config.tools.allow_url_prefix, vec!["https://docs.rs/"]);
        assert_eq!(config.tools.web_search_max_results, 3);
    }

    #[test]
    fn zero_overrides_are_ignored() {
        let mut config = AppConfig::default();
        let cli = parse(&["tools", "--recent-turns", "0", "--web-search-max-results", "0"]);
        cli.common.apply(&mut config);
        assert_eq!(config.recent_turns, 2);
        assert_eq!(config.tools.web_search_max_results, 8);
    }
}
