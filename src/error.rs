//! Error types for the voice-command pipeline.
//!
//! Each variant carries a stable code (see [`VoiceError::code`]) and maps to a
//! short, display-safe sentence via [`VoiceError::user_message`]. There is no
//! cancellation variant: a cancelled task is an outcome, not an error.

/// Stable error codes for programmatic handling.
pub mod error_codes {
    /// Missing credential, unavailable device, or rejected request.
    pub const VALIDATION: &str = "VALIDATION";
    /// Transport open failure or timeout.
    pub const CONNECTION: &str = "CONNECTION";
    /// Malformed or unexpected server message.
    pub const PROTOCOL: &str = "PROTOCOL";
    /// Remote service explicitly reported failure.
    pub const TASK_FAILURE: &str = "TASK_FAILURE";
    /// Unknown function, argument coercion failure, or handler error.
    pub const DISPATCH: &str = "DISPATCH";
    /// Invalid configuration or catalog.
    pub const CONFIG: &str = "CONFIG";
    /// Filesystem I/O.
    pub const IO: &str = "IO";
}

/// Top-level error type for the voice-command pipeline.
#[derive(Debug, thiserror::Error)]
pub enum VoiceError {
    /// Missing credential or device, or a request rejected before any I/O.
    #[error("validation error: {0}")]
    Validation(String),

    /// Transport could not be opened, or a phase timed out.
    #[error("connection error: {0}")]
    Connection(String),

    /// The remote side sent something we could not interpret.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The remote side reported that the task failed.
    #[error("task failed: {0}")]
    TaskFailure(String),

    /// A single function call could not be dispatched or failed.
    #[error("dispatch error: {0}")]
    Dispatch(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl VoiceError {
    /// Returns the stable error code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => error_codes::VALIDATION,
            Self::Connection(_) => error_codes::CONNECTION,
            Self::Protocol(_) => error_codes::PROTOCOL,
            Self::TaskFailure(_) => error_codes::TASK_FAILURE,
            Self::Dispatch(_) => error_codes::DISPATCH,
            Self::Config(_) => error_codes::CONFIG,
            Self::Io(_) => error_codes::IO,
        }
    }

    /// Short sentence suitable for a status line.
    ///
    /// Never includes server payloads or credentials.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Connection(_) => "Connection failed, please check your network.",
            Self::Validation(_) => "Device or credential unavailable, please try again.",
            _ => "Processing failed, please try again.",
        }
    }
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, VoiceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(VoiceError::Validation("x".into()).code(), "VALIDATION");
        assert_eq!(VoiceError::Connection("x".into()).code(), "CONNECTION");
        assert_eq!(VoiceError::Protocol("x".into()).code(), "PROTOCOL");
        assert_eq!(VoiceError::TaskFailure("x".into()).code(), "TASK_FAILURE");
        assert_eq!(VoiceError::Dispatch("x".into()).code(), "DISPATCH");
        assert_eq!(VoiceError::Config("x".into()).code(), "CONFIG");
    }

    #[test]
    fn display_includes_message() {
        let err = VoiceError::TaskFailure("quota exceeded".into());
        assert_eq!(err.to_string(), "task failed: quota exceeded");
    }

    #[test]
    fn user_message_hides_details() {
        let err = VoiceError::Connection("wss://secret-host timed out".into());
        assert!(!err.user_message().contains("secret-host"));
        assert!(err.user_message().contains("network"));
    }

    #[test]
    fn remaining_variants_share_generic_message() {
        for err in [
            VoiceError::Protocol("x".into()),
            VoiceError::TaskFailure("x".into()),
            VoiceError::Dispatch("x".into()),
            VoiceError::Config("x".into()),
        ] {
            assert_eq!(err.user_message(), "Processing failed, please try again.");
        }
        assert_eq!(
            VoiceError::Validation("x".into()).user_message(),
            "Device or credential unavailable, please try again."
        );
    }

    #[test]
    fn io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: VoiceError = io.into();
        assert_eq!(err.code(), "IO");
    }
}
