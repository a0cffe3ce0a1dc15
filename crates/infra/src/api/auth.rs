//! Token exchange and refresh
//!
//! The Vault API issues tokens against a signed assertion built by the
//! [`RequestSigner`] collaborator; this module owns the exchange calls and
//! the refresh decision rule: refresh when the access token is expired or
//! within the configured threshold of expiry. Refreshes are single-flight:
//! concurrent callers wait for one refresh rather than racing their own.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Method;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};
use uuid::Uuid;
use vaultlink_common::cache::{TtlCache, TtlCacheConfig};
use vaultlink_core::ports::{AccessTokenProvider, RequestSigner};
use vaultlink_domain::{Result, TokenSet, VaultError};

use crate::http::executor::{FnFactory, RequestExecutor};

/// Configuration for the auth flow.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Full URL of the token endpoint.
    pub token_url: String,
    /// Client identifier issued at onboarding.
    pub client_id: String,
    /// Refresh tokens this many seconds before expiry.
    pub refresh_threshold_seconds: i64,
}

impl AuthConfig {
    /// Build config for the standard token endpoint under `base_url`.
    pub fn new(base_url: &str, client_id: impl Into<String>, refresh_threshold_seconds: i64) -> Self {
        Self {
            token_url: format!("{}/oauth/token", base_url.trim_end_matches('/')),
            client_id: client_id.into(),
            refresh_threshold_seconds,
        }
    }
}

/// Wire shape of a token endpoint response.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    expires_in: i64,
}

/// Authenticated session: holds the current token set and refreshes it on
/// demand.
pub struct AuthSession {
    executor: Arc<RequestExecutor>,
    signer: Arc<dyn RequestSigner>,
    config: AuthConfig,
    current: tokio::sync::RwLock<Option<TokenSet>>,
    refresh_gate: tokio::sync::Mutex<()>,
    cancel: CancellationToken,
}

impl AuthSession {
    pub fn new(
        executor: Arc<RequestExecutor>,
        signer: Arc<dyn RequestSigner>,
        config: AuthConfig,
    ) -> Self {
        Self {
            executor,
            signer,
            config,
            current: tokio::sync::RwLock::new(None),
            refresh_gate: tokio::sync::Mutex::new(()),
            cancel: CancellationToken::new(),
        }
    }

    /// Exchange an authorization code for a token set.
    #[instrument(skip(self, code))]
    pub async fn exchange_code(&self, code: &str) -> Result<TokenSet> {
        let claims = serde_json::json!({
            "client_id": self.config.client_id,
            "grant_type": "authorization_code",
            "code": code,
            "jti": Uuid::new_v4().to_string(),
            "iat": Utc::now().timestamp(),
        });

        let tokens = self.post_assertion(&claims).await?;
        info!("authorization code exchanged");
        self.store_tokens(tokens.clone()).await;
        Ok(tokens)
    }

    /// Refresh the access token using the stored refresh token.
    ///
    /// # Errors
    /// Fails with an auth error when no tokens are stored or no refresh
    /// token was issued.
    #[instrument(skip(self))]
    pub async fn refresh(&self) -> Result<TokenSet> {
        let refresh_token = {
            let current = self.current.read().await;
            match current.as_ref() {
                Some(tokens) => tokens
                    .refresh_token
                    .clone()
                    .ok_or_else(|| VaultError::Auth("no refresh token available".to_string()))?,
                None => return Err(VaultError::Auth("not authenticated".to_string())),
            }
        };

        let claims = serde_json::json!({
            "client_id": self.config.client_id,
            "grant_type": "refresh_token",
            "refresh_token": refresh_token,
            "jti": Uuid::new_v4().to_string(),
            "iat": Utc::now().timestamp(),
        });

        let tokens = self.post_assertion(&claims).await?;
        info!("access token refreshed");
        self.store_tokens(tokens.clone()).await;
        Ok(tokens)
    }

    /// Seed the session with tokens obtained elsewhere.
    pub async fn store_tokens(&self, tokens: TokenSet) {
        *self.current.write().await = Some(tokens);
    }

    /// Current token set, if authenticated.
    pub async fn tokens(&self) -> Option<TokenSet> {
        self.current.read().await.clone()
    }

    pub async fn is_authenticated(&self) -> bool {
        self.current.read().await.is_some()
    }

    /// Drop the stored tokens.
    pub async fn clear(&self) {
        *self.current.write().await = None;
    }

    async fn should_refresh(&self) -> bool {
        let current = self.current.read().await;
        current
            .as_ref()
            .is_some_and(|tokens| tokens.is_expired(self.config.refresh_threshold_seconds))
    }

    async fn post_assertion(&self, claims: &serde_json::Value) -> Result<TokenSet> {
        let assertion = self.signer.sign(claims).await?;
        let body = serde_json::json!({ "assertion": assertion });
        let url = self.config.token_url.clone();
        let client = self.executor.client().clone();

        let factory = FnFactory(move |_attempt: u32| {
            let client = client.clone();
            let url = url.clone();
            let body = body.clone();
            async move {
                client
                    .request(Method::POST, &url)
                    .json(&body)
                    .build()
                    .map_err(|e| VaultError::Internal(format!("request construction failed: {e}")))
            }
        });

        let response = self.executor.execute(&factory, &self.cancel).await?;
        let decoded: TokenResponse = response
            .json()
            .await
            .map_err(|e| VaultError::Protocol(format!("failed to decode token response: {e}")))?;

        Ok(TokenSet::new(decoded.access_token, decoded.refresh_token, decoded.expires_in))
    }
}

/// Caching wrapper over a [`RequestSigner`]'s verification side.
///
/// Verification walks the remote trust list, so verified claims are kept in
/// a bounded TTL cache keyed by token. Population is idempotent: concurrent
/// misses for the same token both verify and the last write wins.
pub struct CachingVerifier {
    inner: Arc<dyn RequestSigner>,
    verified: TtlCache<String, serde_json::Value>,
}

impl CachingVerifier {
    pub fn new(inner: Arc<dyn RequestSigner>, config: TtlCacheConfig) -> Self {
        Self { inner, verified: TtlCache::new(config) }
    }

    /// Drop every cached verification, forcing fresh trust-list walks.
    pub fn clear(&self) {
        self.verified.clear();
    }
}

#[async_trait]
impl RequestSigner for CachingVerifier {
    async fn sign(&self, claims: &serde_json::Value) -> Result<String> {
        self.inner.sign(claims).await
    }

    async fn verify(&self, token: &str) -> Result<serde_json::Value> {
        if let Some(claims) = self.verified.get(&token.to_string()) {
            debug!("verification cache hit");
            return Ok(claims);
        }

        let claims = self.inner.verify(token).await?;
        self.verified.insert(token.to_string(), claims.clone());
        Ok(claims)
    }
}

#[async_trait]
impl AccessTokenProvider for AuthSession {
    async fn access_token(&self) -> Result<String> {
        if self.should_refresh().await {
            // Single-flight: the first caller refreshes, the rest wait and
            // re-check.
            let _gate = self.refresh_gate.lock().await;
            if self.should_refresh().await {
                debug!("access token near expiry, refreshing");
                self.refresh().await?;
            }
        }

        let current = self.current.read().await;
        current
            .as_ref()
            .map(|tokens| tokens.access_token.clone())
            .ok_or_else(|| VaultError::Auth("not authenticated".to_string()))
    }
}
