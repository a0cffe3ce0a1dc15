//! OAuth-like token types
//!
//! The Vault API issues short-lived access tokens against a signed
//! assertion, with an optional refresh token for renewing them. This module
//! holds the token container and its expiry arithmetic; the exchange and
//! refresh flows live in the HTTP layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Access and refresh tokens with expiry metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenSet {
    /// Bearer token for API authentication.
    pub access_token: String,

    /// Refresh token for obtaining new access tokens.
    /// Optional because some grants don't issue one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    /// Access token lifetime in seconds.
    pub expires_in: i64,

    /// Absolute expiration timestamp (UTC), calculated from `expires_in`
    /// at token creation time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl TokenSet {
    /// Create a new `TokenSet` with calculated expiration time.
    #[must_use]
    pub fn new(access_token: String, refresh_token: Option<String>, expires_in: i64) -> Self {
        let expires_at =
            (expires_in > 0).then(|| Utc::now() + chrono::Duration::seconds(expires_in));

        Self { access_token, refresh_token, expires_in, expires_at }
    }

    /// Check if the access token is expired or will expire within the given
    /// threshold.
    ///
    /// Returns `false` when no expiry is recorded: a token without expiry
    /// metadata is assumed valid until the service rejects it.
    #[must_use]
    pub fn is_expired(&self, threshold_seconds: i64) -> bool {
        match self.expires_at {
            Some(expires_at) => Utc::now() + chrono::Duration::seconds(threshold_seconds) >= expires_at,
            None => false,
        }
    }

    /// Seconds until token expiration, `None` if no expiry is recorded.
    #[must_use]
    pub fn seconds_until_expiry(&self) -> Option<i64> {
        self.expires_at.map(|expires_at| (expires_at - Utc::now()).num_seconds())
    }
}
