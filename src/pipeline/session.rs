//! Per-conversation state shown to the user.

use serde::Serialize;

use crate::asr::Sentence;

/// What the current conversation has produced so far.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ConversationSession {
    /// Keyword that woke the assistant.
    pub wake_word: Option<String>,
    pub wake_confidence: f32,
    /// Latest recognized text.
    pub transcript: String,
    /// Latest recognized sentence with word timing.
    pub last_sentence: Option<Sentence>,
    /// Execution report or model reply.
    pub result_text: String,
    /// Short message explaining an `Invalid` outcome.
    pub error_info: String,
}

impl ConversationSession {
    /// Reset everything.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Reset everything except the wake fields.
    pub fn clear_main_info(&mut self) {
        self.transcript.clear();
        self.last_sentence = None;
        self.result_text.clear();
        self.error_info.clear();
    }

    pub fn has_transcript(&self) -> bool {
        !self.transcript.trim().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled() -> ConversationSession {
        ConversationSession {
            wake_word: Some("hey vai".into()),
            wake_confidence: 0.9,
            transcript: "move the cube".into(),
            last_sentence: Some(Sentence::default()),
            result_text: "done".into(),
            error_info: "oops".into(),
        }
    }

    #[test]
    fn clear_main_info_keeps_wake_fields() {
        let mut session = filled();
        session.clear_main_info();
        assert_eq!(session.wake_word.as_deref(), Some("hey vai"));
        assert!((session.wake_confidence - 0.9).abs() < f32::EPSILON);
        assert!(session.transcript.is_empty());
        assert!(session.last_sentence.is_none());
        assert!(session.result_text.is_empty());
        assert!(session.error_info.is_empty());
    }

    #[test]
    fn clear_resets_everything() {
        let mut session = filled();
        session.clear();
        assert_eq!(session, ConversationSession::default());
    }

    #[test]
    fn whitespace_transcript_is_empty() {
        let session = ConversationSession {
            transcript: "  ".into(),
            ..ConversationSession::default()
        };
        assert!(!session.has_transcript());
    }
}
