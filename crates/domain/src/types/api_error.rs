//! Structured error shape returned by the Vault API
//!
//! The service reports failures either as a JSON body or as three response
//! headers (`X-Error-Code`, `X-Error-Message`, `X-Error-Reference`). Both
//! forms decode into [`ApiError`]; header decoding lives in the HTTP layer.

use serde::{Deserialize, Serialize};

/// Header carrying the machine-readable error code.
pub const ERROR_CODE_HEADER: &str = "x-error-code";
/// Header carrying the human-readable error message.
pub const ERROR_MESSAGE_HEADER: &str = "x-error-message";
/// Header carrying the support reference for the failure.
pub const ERROR_REFERENCE_HEADER: &str = "x-error-reference";

/// Three-field structured error used by the remote service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiError {
    /// Machine-readable error code (e.g. `"SessionInvalid"`).
    pub code: String,
    /// Human-readable message.
    pub message: String,
    /// Opaque support reference for correlating with the service's logs.
    pub reference: String,
    /// HTTP status the error arrived with. Not part of the wire shape;
    /// attached by the HTTP layer when decoding.
    #[serde(skip)]
    pub status: Option<u16>,
}

impl ApiError {
    /// Build an error from the three decoded header values.
    pub fn from_parts(code: String, message: String, reference: String) -> Self {
        Self { code, message, reference, status: None }
    }

    /// Attach the HTTP status the error was delivered with.
    #[must_use]
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }
}

/// JSON body envelope form: `{"error": {code, message, reference}}`.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorBody {
    pub error: ApiError,
}
