//! Session log storage for toolweave.
//!
//! All stores implement the `toolweave_core::SessionLog` trait. The only
//! backend is [`JsonlSessionStore`]: one append-only JSON-lines file per
//! session, human-inspectable and safe to tail while a session runs.

pub mod jsonl;

pub use jsonl::JsonlSessionStore;
