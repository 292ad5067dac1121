//! `list_files` — enumerate files under the repository root.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use glob::{MatchOptions, Pattern};
use ignore::WalkBuilder;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use toolweave_core::error::ToolError;
use toolweave_core::schema::Schema;
use toolweave_core::tool::{Tool, ToolContext, ToolResult, parse_arguments};
use tracing::{debug, trace};

const DEFAULT_MAX: usize = 2000;

pub struct ListFilesTool {
    root: PathBuf,
}

impl ListFilesTool {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[derive(Debug, Default, Deserialize)]
struct Input {
    #[serde(default)]
    glob: Option<String>,
    #[serde(default)]
    max: Option<usize>,
}

#[derive(Debug, Serialize)]
struct Listing {
    count: usize,
    paths: Vec<String>,
}

#[async_trait]
impl Tool for ListFilesTool {
    fn name(&self) -> &str {
        "list_files"
    }

    fn description(&self) -> &str {
        "List files under the repo root. Useful for discovering project structure."
    }

    fn input_schema(&self) -> Schema {
        Schema::object()
            .property(
                "glob",
                Schema::string("Optional glob pattern relative to repo root (e.g. \"**/*.rs\")."),
            )
            .property("max", Schema::integer("Maximum number of paths to return (default 2000)."))
    }

    async fn execute(&self, ctx: &ToolContext, arguments: &str) -> Result<ToolResult, ToolError> {
        let input: Input = parse_arguments(arguments)?;
        let max = input.max.filter(|n| *n > 0).unwrap_or(DEFAULT_MAX);
        let pattern = match input.glob.as_deref().map(str::trim).filter(|g| !g.is_empty()) {
            Some(g) => Some(
                Pattern::new(g).map_err(|e| ToolError::InvalidArguments(format!("bad glob {g:?}: {e}")))?,
            ),
            None => None,
        };

        let root = self.root.clone();
        let cancel = ctx.cancellation().clone();
        let paths = tokio::task::spawn_blocking(move || walk(&root, pattern.as_ref(), max, &cancel))
            .await
            .map_err(|e| ToolError::failed("list_files", e))?;

        if ctx.is_cancelled() {
            return Err(ToolError::Cancelled);
        }

        debug!(count = paths.len(), "list_files");
        let listing = Listing { count: paths.len(), paths };
        let body = serde_json::to_string_pretty(&listing).map_err(|e| ToolError::failed("list_files", e))?;
        Ok(ToolResult::new(body))
    }
}

/// Walk `root` in file-name order, skipping `.git`, collecting up to `max`
/// slash-separated relative paths that match `pattern`.
fn walk(root: &Path, pattern: Option<&Pattern>, max: usize, cancel: &CancellationToken) -> Vec<String> {
    let options = MatchOptions {
        require_literal_separator: true,
        ..MatchOptions::new()
    };

    let walker = WalkBuilder::new(root)
        .standard_filters(false)
        .hidden(false)
        .follow_links(false)
        .sort_by_file_name(|a, b| a.cmp(b))
        .filter_entry(|entry| entry.file_name() != ".git")
        .build();

    let mut out = Vec::new();
    for entry in walker {
        if cancel.is_cancelled() {
            break;
        }
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                trace!(error = %e, "Skipping unreadable entry");
                continue;
            }
        };
        if entry.file_type().is_none_or(|t| t.is_dir()) {
            continue;
        }
        let Ok(rel) = entry.path().strip_prefix(root) else {
            continue;
        };
        let rel = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        if rel.is_empty() {
            continue;
        }
        if let Some(p) = pattern {
            if !p.matches_with(&rel, options) {
                continue;
            }
        }
        out.push(rel);
        if out.len() >= max {
            break;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (tempfile::TempDir, ListFilesTool) {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join("src/nested")).unwrap();
        std::fs::create_dir_all(root.join(".git/objects")).unwrap();
        std::fs::write(root.join("Cargo.toml"), "[package]").unwrap();
        std::fs::write(root.join("src/lib.rs"), "").unwrap();
        std::fs::write(root.join("src/nested/mod.rs"), "").unwrap();
        std::fs::write(root.join("src/notes.md"), "").unwrap();
        std::fs::write(root.join(".git/HEAD"), "ref").unwrap();
        let tool = ListFilesTool::new(root);
        (dir, tool)
    }

    async fn list(tool: &ListFilesTool, args: &str) -> serde_json::Value {
        let result = tool.execute(&ToolContext::default(), args).await.unwrap();
        serde_json::from_str(&result.content).unwrap()
    }

    #[tokio::test]
    async fn lists_everything_but_git() {
        let (_dir, tool) = setup();
        let v = list(&tool, "").await;
        assert_eq!(v["count"], 4);
        let paths: Vec<&str> = v["paths"].as_array().unwrap().iter().map(|p| p.as_str().unwrap()).collect();
        assert!(paths.contains(&"Cargo.toml"));
        assert!(paths.contains(&"src/nested/mod.rs"));
        assert!(!paths.iter().any(|p| p.starts_with(".git")));
    }

    #[tokio::test]
    async fn double_star_glob_matches_any_depth() {
        let (_dir, tool) = setup();
        let v = list(&tool, r#"{"glob":"**/*.rs"}"#).await;
        assert_eq!(v["count"], 2);
    }

    #[tokio::test]
    async fn single_star_stays_in_one_directory() {
        let (_dir, tool) = setup();
        let v = list(&tool, r#"{"glob":"src/*.rs"}"#).await;
        assert_eq!(v["paths"], serde_json::json!(["src/lib.rs"]));
    }

    #[tokio::test]
    async fn max_caps_result_count() {
        let (_dir, tool) = setup();
        let v = list(&tool, r#"{"max":1}"#).await;
        assert_eq!(v["count"], 1);
    }

    #[tokio::test]
    async fn invalid_glob_is_rejected() {
        let (_dir, tool) = setup();
        let err = tool
            .execute(&ToolContext::default(), r#"{"glob":"src/[.rs"}"#)
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }
}
