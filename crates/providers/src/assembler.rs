//! Response stream assembler.
//!
//! Rebuilds one assistant [`Message`] from the incremental [`StreamChunk`]s a
//! provider emits. Text fragments are concatenated and handed to the caller
//! as they arrive. Tool-call fragments are merged into per-index builders:
//! `id`, `type` and `name` overwrite when present, `arguments` concatenate.
//! Indices may arrive out of order; gaps are filled with empty placeholders.

use toolweave_core::error::ProviderError;
use toolweave_core::message::{Message, MessageToolCall};
use toolweave_core::provider::{ChunkReceiver, ProviderResponse, StreamChunk};
use tokio_util::sync::CancellationToken;
use tracing::trace;

/// Furthest a tool-call index may reach past the calls seen so far.
const MAX_TOOL_CALL_INDEX_GAP: usize = 128;

/// Accumulator state for one streamed response.
#[derive(Debug, Default)]
pub struct StreamAssembler {
    content: String,
    finish_reason: Option<String>,
    tool_calls: Vec<MessageToolCall>,
}

impl StreamAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge one chunk. Returns the text fragment to surface, if any.
    pub fn push(&mut self, chunk: StreamChunk) -> Option<String> {
        if let Some(reason) = chunk.finish_reason.filter(|r| !r.is_empty()) {
            self.finish_reason = Some(reason);
        }

        for delta in chunk.tool_calls {
            let limit = self.tool_calls.len().saturating_add(MAX_TOOL_CALL_INDEX_GAP);
            let Some(len) = delta.index.checked_add(1).filter(|_| delta.index < limit) else {
                trace!(index = delta.index, "Dropping tool-call delta with out-of-range index");
                continue;
            };
            if self.tool_calls.len() < len {
                self.tool_calls.resize_with(len, MessageToolCall::placeholder);
            }
            let call = &mut self.tool_calls[delta.index];
            if let Some(id) = delta.id {
                call.id = id;
            }
            if let Some(kind) = delta.kind {
                call.kind = kind;
            }
            if let Some(name) = delta.name {
                call.name = name;
            }
            if let Some(arguments) = delta.arguments {
                call.arguments.push_str(&arguments);
            }
        }

        let text = chunk.content.filter(|c| !c.is_empty())?;
        self.content.push_str(&text);
        Some(text)
    }

    /// Text accumulated so far.
    pub fn content(&self) -> &str {
        &self.content
    }

    /// The reconstructed message and finish reason.
    pub fn finish(self) -> ProviderResponse {
        ProviderResponse {
            message: Message::assistant_with_tools(self.content, self.tool_calls),
            finish_reason: self.finish_reason,
            usage: None,
            model: String::new(),
        }
    }
}

/// Drain `rx` into one response, calling `on_text` for every text fragment
/// exactly once, in arrival order.
///
/// Ends when the provider closes the channel. An error item aborts the whole
/// call with that error. Cancelling `cancel` aborts immediately with
/// [`ProviderError::Cancelled`]; no partial message is returned.
pub async fn collect_stream(
    rx: &mut ChunkReceiver,
    cancel: &CancellationToken,
    mut on_text: impl FnMut(&str),
) -> Result<ProviderResponse, ProviderError> {
    let mut assembler = StreamAssembler::new();

    loop {
        let item = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ProviderError::Cancelled),
            item = rx.recv() => item,
        };

        match item {
            Some(Ok(chunk)) => {
                if let Some(text) = assembler.push(chunk) {
                    on_text(&text);
                }
            }
            Some(Err(err)) => return Err(err),
            None => break,
        }
    }

    let response = assembler.finish();
    trace!(
        chars = response.message.content.len(),
        tool_calls = response.message.tool_calls.len(),
        "Stream assembled"
    );
    Ok(response)
}
