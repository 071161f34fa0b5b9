//! Wire types for the realtime recognition task protocol (JSON over WebSocket).
//!
//! Client → server: `run-task` (with model and parameters) and `finish-task`.
//! Server → client: `task-started`, `result-generated`, `task-finished`,
//! `task-failed`. Audio travels as binary frames of little-endian PCM16.

use serde::{Deserialize, Serialize};

use crate::config::RecognitionParameters;
use crate::error::{Result, VoiceError};

// ---------------------------------------------------------------------------
// Client → server
// ---------------------------------------------------------------------------

/// Header shared by client messages.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClientHeader {
    pub action: &'static str,
    pub task_id: String,
    pub streaming: &'static str,
}

/// `run-task` parameters: fixed audio format plus the configured toggles.
#[derive(Debug, Clone, Serialize)]
pub struct RunTaskParameters {
    pub format: &'static str,
    pub sample_rate: u32,
    #[serde(flatten)]
    pub recognition: RecognitionParameters,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunTaskPayload {
    pub task_group: &'static str,
    pub task: &'static str,
    pub function: &'static str,
    pub model: String,
    pub parameters: RunTaskParameters,
    pub input: EmptyObject,
}

#[derive(Debug, Clone, Serialize)]
pub struct FinishTaskPayload {
    pub input: EmptyObject,
}

/// Serializes as `{}`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct EmptyObject {}

/// Messages the client sends as text frames.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ClientMessage {
    RunTask {
        header: ClientHeader,
        payload: RunTaskPayload,
    },
    FinishTask {
        header: ClientHeader,
        payload: FinishTaskPayload,
    },
}

impl ClientMessage {
    /// Build a `run-task` request.
    pub fn run_task(
        task_id: &str,
        model: &str,
        sample_rate: u32,
        recognition: &RecognitionParameters,
    ) -> Self {
        Self::RunTask {
            header: ClientHeader {
                action: "run-task",
                task_id: task_id.to_owned(),
                streaming: "duplex",
            },
            payload: RunTaskPayload {
                task_group: "audio",
                task: "asr",
                function: "recognition",
                model: model.to_owned(),
                parameters: RunTaskParameters {
                    format: "pcm",
                    sample_rate,
                    recognition: recognition.clone(),
                },
                input: EmptyObject {},
            },
        }
    }

    /// Build a `finish-task` request.
    pub fn finish_task(task_id: &str) -> Self {
        Self::FinishTask {
            header: ClientHeader {
                action: "finish-task",
                task_id: task_id.to_owned(),
                streaming: "duplex",
            },
            payload: FinishTaskPayload {
                input: EmptyObject {},
            },
        }
    }

    pub fn action(&self) -> &'static str {
        match self {
            Self::RunTask { header, .. } | Self::FinishTask { header, .. } => header.action,
        }
    }

    /// Serialize to the JSON text frame.
    ///
    /// # Errors
    ///
    /// Returns [`VoiceError::Protocol`] if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self)
            .map_err(|e| VoiceError::Protocol(format!("encode {}: {e}", self.action())))
    }
}

// ---------------------------------------------------------------------------
// Server → client
// ---------------------------------------------------------------------------

/// Server lifecycle events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerEvent {
    TaskStarted,
    ResultGenerated,
    TaskFinished,
    TaskFailed,
    Other(String),
}

impl ServerEvent {
    fn parse(name: &str) -> Self {
        match name {
            "task-started" => Self::TaskStarted,
            "result-generated" => Self::ResultGenerated,
            "task-finished" => Self::TaskFinished,
            "task-failed" => Self::TaskFailed,
            other => Self::Other(other.to_owned()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ServerHeader {
    #[serde(default)]
    pub event: Option<String>,
    #[serde(default)]
    pub task_id: Option<String>,
    #[serde(default)]
    pub status_code: Option<i64>,
    #[serde(default)]
    pub error_code: Option<String>,
    #[serde(default)]
    pub error_message: Option<String>,
}

/// One recognized word.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Word {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub punctuation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub begin_time: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<i64>,
}

/// A (partial or final) recognized sentence.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Sentence {
    #[serde(default)]
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub begin_time: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<i64>,
    #[serde(default)]
    pub words: Vec<Word>,
    #[serde(default)]
    pub sentence_end: bool,
}

impl Sentence {
    /// The speaker has finished this sentence.
    pub fn is_speech_final(&self) -> bool {
        self.sentence_end || self.end_time.is_some()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ServerOutput {
    #[serde(default)]
    pub sentence: Option<Sentence>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ServerPayload {
    #[serde(default)]
    pub output: Option<ServerOutput>,
}

/// A parsed server text frame.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ServerMessage {
    pub header: ServerHeader,
    #[serde(default)]
    pub payload: Option<ServerPayload>,
}

impl ServerMessage {
    /// Parse a text frame.
    ///
    /// # Errors
    ///
    /// Returns [`VoiceError::Protocol`] when the text is not JSON or carries no
    /// `header.event`.
    pub fn parse(text: &str) -> Result<Self> {
        let msg: Self = serde_json::from_str(text)
            .map_err(|e| VoiceError::Protocol(format!("invalid server message: {e}")))?;
        if msg.header.event.as_deref().is_none_or(str::is_empty) {
            return Err(VoiceError::Protocol(
                "server message has no header.event".to_owned(),
            ));
        }
        Ok(msg)
    }

    pub fn event(&self) -> ServerEvent {
        ServerEvent::parse(self.header.event.as_deref().unwrap_or_default())
    }

    pub fn sentence(&self) -> Option<&Sentence> {
        self.payload.as_ref()?.output.as_ref()?.sentence.as_ref()
    }

    /// Failure description for `task-failed`.
    pub fn failure_message(&self) -> String {
        self.header
            .error_message
            .clone()
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| "ASR task failed".to_owned())
    }
}

// ---------------------------------------------------------------------------
// Audio encoding
// ---------------------------------------------------------------------------

/// Encode normalized samples as little-endian signed 16-bit PCM.
pub fn encode_pcm16(samples: &[f32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(samples.len() * 2);
    for &s in samples {
        let v = (s * f32::from(i16::MAX)).clamp(f32::from(i16::MIN), f32::from(i16::MAX)) as i16;
        out.extend_from_slice(&v.to_le_bytes());
    }
    out
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;
    use crate::config::LanguageHint;

    #[test]
    fn run_task_wire_shape() {
        let mut params = RecognitionParameters::default();
        params.language_hints = vec![LanguageHint::Zh];
        let json = ClientMessage::run_task("abc123", "paraformer-realtime-v2", 16_000, &params)
            .to_json()
            .unwrap();
        let v: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(v["header"]["action"], "run-task");
        assert_eq!(v["header"]["task_id"], "abc123");
        assert_eq!(v["header"]["streaming"], "duplex");
        let payload = &v["payload"];
        assert_eq!(payload["task_group"], "audio");
        assert_eq!(payload["task"], "asr");
        assert_eq!(payload["function"], "recognition");
        assert_eq!(payload["model"], "paraformer-realtime-v2");
        assert_eq!(payload["input"], serde_json::json!({}));
        let p = &payload["parameters"];
        assert_eq!(p["format"], "pcm");
        assert_eq!(p["sample_rate"], 16_000);
        assert_eq!(p["language_hints"], serde_json::json!(["zh"]));
        assert_eq!(p["max_sentence_silence"], 800);
        assert!(p.get("vocabulary_id").is_none());
    }

    #[test]
    fn finish_task_wire_shape() {
        let json = ClientMessage::finish_task("abc123").to_json().unwrap();
        assert_eq!(
            json,
            r#"{"header":{"action":"finish-task","task_id":"abc123","streaming":"duplex"},"payload":{"input":{}}}"#
        );
    }

    #[test]
    fn parses_result_generated() {
        let text = r#"{
            "header": {"event": "result-generated", "task_id": "t1"},
            "payload": {"output": {"sentence": {
                "begin_time": 170, "end_time": null, "text": "把方块",
                "words": [{"begin_time": 170, "end_time": 295, "text": "把", "punctuation": ""}]
            }}}
        }"#;
        let msg = ServerMessage::parse(text).unwrap();
        assert_eq!(msg.event(), ServerEvent::ResultGenerated);
        let sentence = msg.sentence().unwrap();
        assert_eq!(sentence.text, "把方块");
        assert_eq!(sentence.words.len(), 1);
        assert!(!sentence.is_speech_final());
    }

    #[test]
    fn end_time_or_sentence_end_is_final() {
        let a = Sentence {
            end_time: Some(3_000),
            ..Sentence::default()
        };
        let b = Sentence {
            sentence_end: true,
            ..Sentence::default()
        };
        assert!(a.is_speech_final());
        assert!(b.is_speech_final());
        assert!(!Sentence::default().is_speech_final());
    }

    #[test]
    fn missing_event_is_protocol_error() {
        match ServerMessage::parse(r#"{"header": {"task_id": "t1"}}"#) {
            Err(VoiceError::Protocol(msg)) => assert!(msg.contains("header.event")),
            other => unreachable!("expected protocol error, got {other:?}"),
        }
        assert!(ServerMessage::parse("not json").is_err());
    }

    #[test]
    fn task_failed_message() {
        let msg = ServerMessage::parse(
            r#"{"header": {"event": "task-failed", "error_message": "quota"}}"#,
        )
        .unwrap();
        assert_eq!(msg.event(), ServerEvent::TaskFailed);
        assert_eq!(msg.failure_message(), "quota");

        let bare = ServerMessage::parse(r#"{"header": {"event": "task-failed"}}"#).unwrap();
        assert_eq!(bare.failure_message(), "ASR task failed");
    }

    #[test]
    fn pcm16_encoding_clamps() {
        let bytes = encode_pcm16(&[0.0, 1.0, -1.0, 2.0, 0.5]);
        let values: Vec<i16> = bytes
            .chunks_exact(2)
            .map(|b| i16::from_le_bytes([b[0], b[1]]))
            .collect();
        assert_eq!(values, vec![0, 32767, -32767, 32767, 16383]);
    }
}
