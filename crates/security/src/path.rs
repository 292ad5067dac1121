//! Path containment — keep file tools inside the repository root.
//!
//! Every relative path the model hands to a filesystem tool goes through
//! [`resolve_within_root`]. Absolute paths and `..` escapes are rejected
//! lexically; paths that already exist are additionally resolved through
//! symlinks and must still land under the (resolved) root.

use std::path::{Component, Path, PathBuf};

use toolweave_core::ToolError;

/// Error returned when path validation fails.
#[derive(Debug, thiserror::Error)]
pub enum PathValidationError {
    #[error("empty path")]
    EmptyPath,

    #[error("path outside repo root: '{path}'")]
    PathOutsideRoot { path: String },

    #[error("failed to resolve '{path}': {reason}")]
    Io { path: String, reason: String },
}

impl From<PathValidationError> for ToolError {
    fn from(err: PathValidationError) -> Self {
        match err {
            PathValidationError::PathOutsideRoot { path } => ToolError::PathOutsideRoot(path),
            other => ToolError::InvalidArguments(other.to_string()),
        }
    }
}

/// Resolve `rel` under `root`, returning an absolute path inside the root.
///
/// Rejects:
/// 1. empty and absolute paths
/// 2. paths that are `.` or climb above the root after normalization
/// 3. existing targets (or their nearest existing ancestor) whose
///    symlink-resolved location is outside the symlink-resolved root
pub fn resolve_within_root(root: &Path, rel: &str) -> Result<PathBuf, PathValidationError> {
    if rel.is_empty() {
        return Err(PathValidationError::EmptyPath);
    }
    let outside = || PathValidationError::PathOutsideRoot { path: rel.to_string() };

    let rel_path = Path::new(rel);
    if rel_path.is_absolute() || rel_path.has_root() {
        return Err(outside());
    }

    let mut clean = PathBuf::new();
    for component in rel_path.components() {
        match component {
            Component::Normal(part) => clean.push(part),
            Component::CurDir => {}
            Component::ParentDir => {
                if !clean.pop() {
                    return Err(outside());
                }
            }
            Component::RootDir | Component::Prefix(_) => return Err(outside()),
        }
    }
    if clean.as_os_str().is_empty() {
        return Err(outside());
    }

    let abs_root = std::path::absolute(root).map_err(|e| PathValidationError::Io {
        path: root.display().to_string(),
        reason: e.to_string(),
    })?;
    let target = abs_root.join(&clean);
    if !target.starts_with(&abs_root) {
        return Err(outside());
    }

    if let Some(existing) = nearest_existing(&target) {
        let real_root = abs_root.canonicalize().unwrap_or_else(|_| abs_root.clone());
        let real_target = existing.canonicalize().unwrap_or_else(|_| existing.to_path_buf());
        if !real_target.starts_with(&real_root) {
            tracing::warn!(path = rel, resolved = %real_target.display(), "Symlink escapes repo root");
            return Err(outside());
        }
    }

    Ok(target)
}

/// The target itself when it exists, otherwise its closest existing ancestor.
fn nearest_existing(target: &Path) -> Option<&Path> {
    target.ancestors().find(|p| p.exists())
}
