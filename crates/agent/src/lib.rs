//! The turn loop of toolweave.
//!
//! An [`Engine`] owns a provider, a tool registry and a session log. Each
//! call to [`Engine::run`] takes one user input through repeated
//! completion/tool rounds:
//!
//! 1. **Seed** the prompt with the system prompt and recent session turns
//! 2. **Complete** via the provider, advertising every registered tool
//! 3. **If tool calls**: dispatch them concurrently, append results, loop
//! 4. **If text**: persist the turn and return the reply
//!
//! [`ToolDispatcher`] runs one batch of tool calls with bounded concurrency
//! and per-call timeouts, returning results in request order.

pub mod dispatcher;
pub mod engine;
pub mod prompt;
pub mod stream_event;

pub use dispatcher::{DispatchOutcome, ToolDispatcher};
pub use engine::{Engine, TurnOutcome};
pub use prompt::{CODING_SYSTEM_PROMPT, DEFAULT_SYSTEM_PROMPT, PromptMode};
pub use stream_event::{AgentStreamEvent, EventSender};
