//! Streaming speech recognition over a duplex task protocol.
//!
//! - [`protocol`]: `run-task` / `finish-task` requests and server events
//! - [`transport`]: the socket abstraction and its WebSocket implementation
//! - [`silence`]: local end-of-speech detection
//! - [`client`]: the per-task lifecycle driver

pub mod client;
pub mod protocol;
pub mod silence;
pub mod transport;

pub use client::{
    RecognitionClient, RecognitionEvent, RecognitionOutcome, Recognizer, TaskState,
};
pub use protocol::{Sentence, Word};
pub use silence::SilenceDetector;
pub use transport::{
    Transport, TransportConnection, TransportFrame, TransportSink, TungsteniteTransport,
};
