//! JSONL session store — one append-only file per session.
//!
//! Storage location: `<dir>/<session_id>.jsonl`, one `TurnRecord` per line
//! tagged `"type":"turn"`. Lines that fail to parse, or carry another type,
//! are skipped on read. Nothing here ever rewrites or truncates a log.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio_util::sync::CancellationToken;
use toolweave_core::error::SessionError;
use toolweave_core::session::{SessionContext, SessionContextRequest, SessionLog, TurnRecord, last_n};
use tracing::{debug, trace};

/// A file-backed session log using JSONL (one JSON object per line).
///
/// Holds no in-memory state: every read scans the file, every append opens
/// it in append mode. Appends for different sessions never contend.
#[derive(Debug, Clone)]
pub struct JsonlSessionStore {
    dir: PathBuf,
}

impl JsonlSessionStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Log file for a session id.
    pub fn path_for(&self, session_id: &str) -> PathBuf {
        self.dir.join(format!("{session_id}.jsonl"))
    }

    /// Create the session directory if it does not exist.
    pub async fn ensure_dir(&self) -> Result<(), SessionError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|source| SessionError::Io {
                path: self.dir.display().to_string(),
                source,
            })
    }

    /// Every well-formed turn of a session, in file order.
    async fn read_turns(&self, cancel: &CancellationToken, session_id: &str) -> Result<Vec<TurnRecord>, SessionError> {
        check_session_id(session_id)?;
        let path = self.path_for(session_id);
        let io_err = |source| SessionError::Io {
            path: path.display().to_string(),
            source,
        };

        let file = match File::open(&path).await {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_err(e)),
        };

        let mut reader = BufReader::new(file);
        let mut line = Vec::new();
        let mut turns = Vec::new();
        let mut skipped = 0usize;

        loop {
            if cancel.is_cancelled() {
                return Err(SessionError::Cancelled);
            }
            line.clear();
            let n = reader.read_until(b'\n', &mut line).await.map_err(io_err)?;
            if n == 0 {
                break;
            }
            match parse_turn(&line) {
                Some(turn) => turns.push(turn),
                None => skipped += 1,
            }
        }

        if skipped > 0 {
            debug!(session_id, skipped, "Skipped unreadable session log lines");
        }
        Ok(turns)
    }
}

/// Decode one log line; `None` for blanks, garbage and non-turn records.
fn parse_turn(raw: &[u8]) -> Option<TurnRecord> {
    let text = std::str::from_utf8(raw).ok()?.trim();
    if text.is_empty() {
        return None;
    }
    match serde_json::from_str::<TurnRecord>(text) {
        Ok(turn) if turn.is_turn() => Some(turn),
        Ok(_) => None,
        Err(e) => {
            trace!(error = %e, "Skipping malformed session log line");
            None
        }
    }
}

/// Session ids name files, so they must stay a single path component.
fn check_session_id(session_id: &str) -> Result<(), SessionError> {
    let bad = session_id.is_empty()
        || session_id == "."
        || session_id == ".."
        || session_id.contains(['/', '\\', '\0']);
    if bad {
        Err(SessionError::InvalidSessionId(session_id.to_string()))
    } else {
        Ok(())
    }
}

#[async_trait]
impl SessionLog for JsonlSessionStore {
    async fn append_turn(&self, cancel: &CancellationToken, record: &TurnRecord) -> Result<(), SessionError> {
        check_session_id(&record.session_id)?;
        self.ensure_dir().await?;
        if cancel.is_cancelled() {
            return Err(SessionError::Cancelled);
        }

        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');

        let path = self.path_for(&record.session_id);
        let io_err = |source| SessionError::Io {
            path: path.display().to_string(),
            source,
        };
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(io_err)?;
        file.write_all(&line).await.map_err(io_err)?;
        file.flush().await.map_err(io_err)?;

        debug!(
            session_id = %record.session_id,
            tool_calls = record.tool_calls.len(),
            "Turn appended"
        );
        Ok(())
    }

    async fn load_recent_turns(
        &self,
        cancel: &CancellationToken,
        session_id: &str,
        n: usize,
    ) -> Result<Vec<TurnRecord>, SessionError> {
        if n == 0 {
            return Ok(Vec::new());
        }
        let turns = self.read_turns(cancel, session_id).await?;
        Ok(last_n(turns, n))
    }

    async fn session_context(
        &self,
        cancel: &CancellationToken,
        session_id: &str,
        request: &SessionContextRequest,
    ) -> Result<SessionContext, SessionError> {
        let turns = self.read_turns(cancel, session_id).await?;
        Ok(SessionContext::from_turns(session_id, &turns, request))
    }
}
