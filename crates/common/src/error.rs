//! Common error type for the utility layer
//!
//! Module-specific code in `common` reports failures through [`CommonError`];
//! the conversion into the public `VaultError` taxonomy happens at the
//! infrastructure boundary.

use std::time::Duration;

use thiserror::Error;

/// Error type shared by the utility modules.
#[derive(Error, Debug)]
pub enum CommonError {
    #[error("Operation '{operation}' timed out after {elapsed:?}")]
    Timeout { operation: String, elapsed: Duration },

    /// The operation was aborted through its cancellation token.
    #[error("Cancelled: {0}")]
    Cancelled(String),

    #[error("Crypto error: {0}")]
    Crypto(String),

    #[error("Compression error: {0}")]
    Compression(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CommonError {
    pub fn timeout(operation: impl Into<String>, elapsed: Duration) -> Self {
        Self::Timeout { operation: operation.into(), elapsed }
    }

    pub fn cancelled(message: impl Into<String>) -> Self {
        Self::Cancelled(message.into())
    }

    pub fn crypto(message: impl Into<String>) -> Self {
        Self::Crypto(message.into())
    }

    pub fn compression(message: impl Into<String>) -> Self {
        Self::Compression(message.into())
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Whether the failure is a cancellation rather than a fault.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled(_))
    }
}

impl From<serde_json::Error> for CommonError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(format!("JSON error: {err}"))
    }
}

/// Result type alias for utility operations
pub type CommonResult<T> = std::result::Result<T, CommonError>;

#[cfg(test)]
mod tests {
    //! Unit tests for error.
    use super::*;

    /// Validates `CommonError::timeout` behavior for the display formatting
    /// scenario.
    ///
    /// Assertions:
    /// - Ensures the rendered message names the operation and duration.
    #[test]
    fn timeout_display_names_operation() {
        let err = CommonError::timeout("fetch_file_list", Duration::from_secs(5));
        let rendered = err.to_string();

        assert!(rendered.contains("fetch_file_list"));
        assert!(rendered.contains("5s"));
    }

    /// Validates `CommonError::cancelled` behavior for the classification
    /// scenario.
    ///
    /// Assertions:
    /// - Ensures `err.is_cancelled()` evaluates to true.
    /// - Ensures a crypto error is not classified as cancelled.
    #[test]
    fn cancelled_classification() {
        assert!(CommonError::cancelled("stop").is_cancelled());
        assert!(!CommonError::crypto("bad padding").is_cancelled());
    }
}
