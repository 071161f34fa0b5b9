//! Runtime events emitted by the orchestrator for UI and observability.
//!
//! Consumers subscribe to a `broadcast` channel and never feed anything back.

use crate::asr::Sentence;
use crate::pipeline::orchestrator::ConversationState;
use crate::pipeline::session::ConversationSession;

/// What the pipeline is doing right now.
#[derive(Debug, Clone)]
pub enum RuntimeEvent {
    /// The conversation moved between states.
    StateChanged {
        from: ConversationState,
        to: ConversationState,
    },
    /// A recognized sentence while listening.
    Transcript(Sentence),
    /// The local matcher found complete commands in the latest sentence.
    CommandsMatched { functions: Vec<String> },
    /// Snapshot of the session after a change.
    SessionUpdated(ConversationSession),
}
