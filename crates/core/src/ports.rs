//! Port interfaces for the SDK's external collaborators

use async_trait::async_trait;
use vaultlink_domain::{Result, Session, SessionFileList};

/// Trait for creating remote sessions.
#[async_trait]
pub trait SessionSource: Send + Sync {
    /// Create a fresh session against the remote job.
    async fn create_session(&self) -> Result<Session>;
}

/// Trait for polling a session's file listing.
#[async_trait]
pub trait FileListSource: Send + Sync {
    /// Fetch the current file listing for a session key.
    async fn fetch_file_list(&self, session_key: &str) -> Result<SessionFileList>;
}

/// Trait for processing one ready session file.
///
/// Fetching the file body and consuming its pipeline happen behind this
/// boundary; the orchestrator only sequences the invocations.
#[async_trait]
pub trait FileProcessor: Send + Sync {
    /// Process a single file of the session.
    async fn process_file(&self, session_key: &str, file_name: &str) -> Result<()>;
}

/// Signing/verification collaborator for authenticated requests.
///
/// Contract: `sign(claims) -> token`, `verify(token) -> claims`. Key
/// management and trust-list refresh live behind this trait; the SDK only
/// consumes the two operations.
#[async_trait]
pub trait RequestSigner: Send + Sync {
    /// Sign a claims object into a compact token.
    async fn sign(&self, claims: &serde_json::Value) -> Result<String>;

    /// Verify a compact token and return its claims.
    async fn verify(&self, token: &str) -> Result<serde_json::Value>;
}

/// Trait for supplying a valid bearer token to API calls.
#[async_trait]
pub trait AccessTokenProvider: Send + Sync {
    /// Return a currently valid access token, refreshing if needed.
    async fn access_token(&self) -> Result<String>;
}
