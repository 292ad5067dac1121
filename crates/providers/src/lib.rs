//! Completion-service clients for toolweave.
//!
//! [`OpenAiCompatProvider`] implements `toolweave_core::Provider` against any
//! OpenAI-compatible `/chat/completions` endpoint. [`assembler`] turns the
//! chunk stream any provider produces back into one assistant message.

pub mod assembler;
pub mod openai_compat;

pub use assembler::{StreamAssembler, collect_stream};
pub use openai_compat::OpenAiCompatProvider;
