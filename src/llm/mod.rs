//! Remote language model fallback.
//!
//! Utterances the local matcher cannot handle go to an OpenAI-compatible
//! chat-completions endpoint along with the registry's tool schemas. Any tool
//! calls in the reply are dispatched through the same [`FunctionRegistry`].
//!
//! [`FunctionRegistry`]: crate::functions::FunctionRegistry

pub mod client;
pub mod executor;
pub mod types;

pub use client::{ChatModel, DashScopeChatClient, LEGACY_CALL_ID};
pub use executor::{EMPTY_REPLY, LlmAssistant, ToolCallExecutor, format_report};
pub use types::{ChatReply, ChatRequest, FunctionCall, LlmResult, ToolCall};
