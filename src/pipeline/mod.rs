//! Conversation sequencing: session state and the orchestrating state machine.

pub mod orchestrator;
pub mod session;

pub use orchestrator::{ConversationOrchestrator, ConversationState, OrchestratorHandle};
pub use session::ConversationSession;
