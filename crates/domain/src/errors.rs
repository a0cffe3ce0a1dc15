//! Error types used throughout the SDK

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::api_error::ApiError;

/// Main error type for VaultLink
///
/// The variants map onto the fault classes callers need to distinguish:
/// contract violations are never retried, transport faults may be retried by
/// policy, structured API errors carry the remote service's own diagnosis,
/// protocol faults mean the remote violated its error contract, and
/// cancellation is surfaced distinctly so callers can special-case it.
#[derive(Error, Debug, Serialize, Deserialize)]
#[serde(tag = "type", content = "message")]
pub enum VaultError {
    /// Malformed input to a public contract; fatal, never retried.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Network-level failure before any response was obtained.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Well-formed structured error returned by the Vault API.
    #[error("API error {}: {} (reference {})", .0.code, .0.message, .0.reference)]
    Api(ApiError),

    /// Non-ok response whose error body/headers could not be decoded.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The operation was aborted through its cancellation signal.
    #[error("Cancelled: {0}")]
    Cancelled(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Crypto error: {0}")]
    Crypto(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl VaultError {
    /// Whether this error is a user/SDK-initiated abort.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled(_))
    }

    /// The HTTP status attached to a structured API error, if any.
    pub fn api_status(&self) -> Option<u16> {
        match self {
            Self::Api(err) => err.status,
            _ => None,
        }
    }
}

impl From<serde_json::Error> for VaultError {
    fn from(err: serde_json::Error) -> Self {
        Self::Validation(format!("JSON error: {err}"))
    }
}

/// Result type alias for VaultLink operations
pub type Result<T> = std::result::Result<T, VaultError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_error_display_includes_reference() {
        let err = VaultError::Api(ApiError {
            code: "SessionInvalid".to_string(),
            message: "session key expired".to_string(),
            reference: "ref-123".to_string(),
            status: Some(401),
        });

        let rendered = err.to_string();
        assert!(rendered.contains("SessionInvalid"));
        assert!(rendered.contains("ref-123"));
        assert_eq!(err.api_status(), Some(401));
    }

    #[test]
    fn cancelled_is_distinguishable() {
        let err = VaultError::Cancelled("caller aborted".to_string());
        assert!(err.is_cancelled());
        assert!(!VaultError::Transport("reset".to_string()).is_cancelled());
    }
}
