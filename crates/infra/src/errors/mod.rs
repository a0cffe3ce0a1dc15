//! Error conversions at the infrastructure boundary
//!
//! `common` and the HTTP stack report their own error types; everything
//! crossing into the public API surfaces as `VaultError`. The mapping is
//! funneled through [`InfraError`] so each foreign error is classified in
//! exactly one place.

use thiserror::Error;
use vaultlink_common::CommonError;
use vaultlink_domain::VaultError;

/// Intermediate error for infrastructure-layer failures.
#[derive(Debug, Error)]
pub enum InfraError {
    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Common(#[from] CommonError),

    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),
}

impl From<InfraError> for VaultError {
    fn from(err: InfraError) -> Self {
        match err {
            InfraError::Http(e) => from_reqwest(&e),
            InfraError::Common(e) => from_common(e),
            InfraError::Url(e) => VaultError::Config(format!("invalid URL: {e}")),
        }
    }
}

/// Classify a reqwest error into the public taxonomy.
///
/// Everything reqwest reports before a response is obtained is a transport
/// fault; request-construction problems are internal SDK faults.
pub fn from_reqwest(err: &reqwest::Error) -> VaultError {
    if err.is_builder() || err.is_request() && err.url().is_none() {
        return VaultError::Internal(format!("request construction failed: {err}"));
    }
    if err.is_decode() {
        return VaultError::Protocol(format!("response decode failed: {err}"));
    }
    VaultError::Transport(format!("HTTP error: {err}"))
}

/// Map a utility-layer error into the public taxonomy.
///
/// Compression failures of downloaded payloads are classified with the
/// crypto faults: both mean the sealed payload did not open cleanly.
pub fn from_common(err: CommonError) -> VaultError {
    match err {
        CommonError::Cancelled(msg) => VaultError::Cancelled(msg),
        CommonError::Timeout { operation, elapsed } => {
            VaultError::Transport(format!("operation '{operation}' timed out after {elapsed:?}"))
        }
        CommonError::Crypto(msg) => VaultError::Crypto(msg),
        CommonError::Compression(msg) => VaultError::Crypto(msg),
        CommonError::Config(msg) => VaultError::Config(msg),
        CommonError::Serialization(msg) => VaultError::Validation(msg),
        CommonError::Internal(msg) => VaultError::Internal(msg),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancellation_survives_the_boundary() {
        let err = from_common(CommonError::cancelled("stop"));
        assert!(err.is_cancelled());
    }

    #[test]
    fn crypto_and_compression_share_a_class() {
        assert!(matches!(from_common(CommonError::crypto("pad")), VaultError::Crypto(_)));
        assert!(matches!(from_common(CommonError::compression("gz")), VaultError::Crypto(_)));
    }
}
