//! Credential resolution.
//!
//! Components never read secrets directly; they ask a [`CredentialSource`]
//! by name. Absence is reported by the caller as
//! [`VoiceError::Validation`](crate::error::VoiceError::Validation).

use crate::error::{Result, VoiceError};
use std::collections::HashMap;
use std::fmt;

/// Resolves a credential (API key, token) by name.
pub trait CredentialSource: Send + Sync {
    /// Returns the credential value, or `None` when absent or empty.
    fn resolve(&self, name: &str) -> Option<String>;
}

/// Reads credentials from the process environment.
#[derive(Debug, Default, Clone, Copy)]
pub struct EnvCredentialSource;

impl CredentialSource for EnvCredentialSource {
    fn resolve(&self, name: &str) -> Option<String> {
        std::env::var(name).ok().filter(|v| !v.trim().is_empty())
    }
}

/// Fixed in-memory credentials (tests, embedding hosts).
#[derive(Default, Clone)]
pub struct StaticCredentialSource {
    values: HashMap<String, String>,
}

impl StaticCredentialSource {
    /// Create an empty source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a credential.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }
}

impl fmt::Debug for StaticCredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.values.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("StaticCredentialSource")
            .field("names", &names)
            .field("values", &"[REDACTED]")
            .finish()
    }
}

impl CredentialSource for StaticCredentialSource {
    fn resolve(&self, name: &str) -> Option<String> {
        self.values.get(name).filter(|v| !v.is_empty()).cloned()
    }
}

/// Resolve a required credential.
///
/// # Errors
///
/// Returns [`VoiceError::Validation`] naming the missing credential.
pub fn require(source: &dyn CredentialSource, name: &str) -> Result<String> {
    source.resolve(name).ok_or_else(|| {
        VoiceError::Validation(format!(
            "credential '{name}' not found, please set it in the environment"
        ))
    })
}

/// Redact a secret for logging.
pub fn redact(s: &str) -> &str {
    if s.is_empty() { "" } else { "[REDACTED]" }
}
