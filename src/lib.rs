//! voicecmd: a voice-command pipeline.
//!
//! Spoken utterances are streamed to a remote recognizer, matched against a
//! local keyword catalog for fast command execution, and otherwise handed to
//! a remote language model whose tool calls dispatch to the same handlers.
//!
//! # Architecture
//!
//! - **Audio**: a bounded ring buffer written by the capture side
//! - **ASR**: a duplex WebSocket task client with per-phase timeouts
//! - **NLU**: a keyword trie and matcher built from a JSON function catalog
//! - **Functions**: a name-keyed registry of typed handlers
//! - **LLM**: chat completions with tool calling, executed in parallel or in order
//! - **Pipeline**: the conversation state machine tying these together

pub mod asr;
pub mod audio;
pub mod config;
pub mod credentials;
pub mod error;
pub mod functions;
pub mod llm;
pub mod nlu;
pub mod paths;
pub mod pipeline;
pub mod runtime;

pub use config::VoiceConfig;
pub use error::{Result, VoiceError};
pub use functions::{Arguments, FunctionMeta, FunctionRegistry};
pub use pipeline::{ConversationOrchestrator, ConversationState, OrchestratorHandle};
pub use runtime::RuntimeEvent;
