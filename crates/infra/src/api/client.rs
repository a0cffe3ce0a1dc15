//! Vault API client
//!
//! Thin, typed endpoints over the resilient request executor. Every call
//! signs itself with a bearer token from the configured
//! [`AccessTokenProvider`], regenerated per attempt so retried sends never
//! reuse a stale token, and carries a correlation id for the service's
//! request tracing.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::ACCEPT;
use reqwest::{Method, Request, Response, Url};
use rsa::RsaPrivateKey;
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};
use uuid::Uuid;
use vaultlink_common::cache::{TtlCache, TtlCacheConfig};
use vaultlink_common::retry::RetryOptions;
use vaultlink_core::ports::AccessTokenProvider;
use vaultlink_domain::{
    FileMetadata, Result, Session, SessionFileList, VaultError,
};

use crate::config::SdkConfig;
use crate::files::SessionFile;
use crate::http::executor::{RequestExecutor, RequestFactory};

/// Header carrying the file metadata of a file-fetch response,
/// base64-encoded JSON.
pub const FILE_METADATA_HEADER: &str = "x-file-metadata";

const SESSION_CACHE_KEY: &str = "session";

/// Client for the Vault personal-data API.
pub struct ApiClient {
    executor: Arc<RequestExecutor>,
    config: SdkConfig,
    retry_options: RetryOptions,
    tokens: Arc<dyn AccessTokenProvider>,
    private_key: Arc<RsaPrivateKey>,
    session_cache: TtlCache<String, Session>,
    cancel: CancellationToken,
}

impl ApiClient {
    /// Start building a client.
    pub fn builder() -> ApiClientBuilder {
        ApiClientBuilder::default()
    }

    /// Token that aborts every in-flight and future call when cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// The client's configuration.
    pub fn config(&self) -> &SdkConfig {
        &self.config
    }

    /// The private key session files are decrypted with.
    pub fn private_key(&self) -> Arc<RsaPrivateKey> {
        Arc::clone(&self.private_key)
    }

    /// Create a fresh session against the remote job.
    ///
    /// The session is cached for exactly its remaining lifetime, so
    /// [`session`](Self::session) can reuse it until it expires remotely.
    #[instrument(skip(self))]
    pub async fn create_session(&self) -> Result<Session> {
        let url = self.endpoint(&["sessions"])?;
        let session: Session = self.execute_json(Method::POST, url, None).await?;

        if let Some(ttl) = session.time_to_live(Utc::now()) {
            self.session_cache.insert_with_ttl(
                SESSION_CACHE_KEY.to_string(),
                session.clone(),
                ttl,
            );
        }

        info!(session_key = %session.key, expiry = %session.expiry, "session created");
        Ok(session)
    }

    /// Return the cached session, creating one when none is live.
    pub async fn session(&self) -> Result<Session> {
        if let Some(session) = self.session_cache.get(&SESSION_CACHE_KEY.to_string()) {
            debug!(session_key = %session.key, "session cache hit");
            return Ok(session);
        }
        self.create_session().await
    }

    /// Fetch the current file listing of a session.
    #[instrument(skip(self))]
    pub async fn fetch_file_list(&self, session_key: &str) -> Result<SessionFileList> {
        let url = self.endpoint(&["sessions", session_key, "files"])?;
        self.execute_json(Method::GET, url, None).await
    }

    /// Fetch one session file as a lazily-consumable [`SessionFile`].
    ///
    /// The body stays a stream; only the metadata header is decoded here.
    #[instrument(skip(self))]
    pub async fn fetch_file(&self, session_key: &str, file_name: &str) -> Result<SessionFile> {
        let url = self.endpoint(&["sessions", session_key, "files", file_name])?;
        let response = self.send(Method::GET, url, None).await?;

        let metadata = decode_file_metadata(&response)?;
        let stream = crate::files::pipeline::response_stream(response);

        Ok(SessionFile::new(
            stream,
            Arc::clone(&self.private_key),
            metadata,
            Some(file_name.to_string()),
        ))
    }

    /// List the source accounts contributing to a session.
    #[instrument(skip(self))]
    pub async fn accounts(&self, session_key: &str) -> Result<serde_json::Value> {
        let url = self.endpoint(&["sessions", session_key, "accounts"])?;
        self.execute_json(Method::GET, url, None).await
    }

    /// Enumerate the services available for onboarding.
    #[instrument(skip(self))]
    pub async fn discovery_services(&self) -> Result<serde_json::Value> {
        let url = self.endpoint(&["discovery", "services"])?;
        self.execute_json(Method::GET, url, None).await
    }

    /// Delete the user and every stored artefact.
    #[instrument(skip(self))]
    pub async fn delete_user(&self) -> Result<()> {
        let url = self.endpoint(&["user"])?;
        self.send(Method::DELETE, url, None).await?;
        info!("user deletion accepted");
        Ok(())
    }

    /// Download a portability report for a service type.
    #[instrument(skip(self))]
    pub async fn portability_report(
        &self,
        service_type: &str,
        format: &str,
        from: i64,
        to: i64,
    ) -> Result<String> {
        let mut url = self.endpoint(&["export", service_type, "report"])?;
        url.query_pairs_mut()
            .append_pair("format", format)
            .append_pair("from", &from.to_string())
            .append_pair("to", &to.to_string());

        let response = self.send(Method::GET, url, None).await?;
        response
            .text()
            .await
            .map_err(|e| VaultError::Protocol(format!("failed to read report body: {e}")))
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = Url::parse(&self.config.base_url)
            .map_err(|e| VaultError::Config(format!("invalid base URL: {e}")))?;
        url.path_segments_mut()
            .map_err(|()| VaultError::Config("base URL cannot be a base".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn send(
        &self,
        method: Method,
        url: Url,
        body: Option<serde_json::Value>,
    ) -> Result<Response> {
        let factory = EndpointFactory {
            client: self.executor.client().clone(),
            tokens: Arc::clone(&self.tokens),
            method,
            url,
            body,
            correlation_id: Uuid::new_v4().to_string(),
        };

        self.executor
            .execute_with_options(&factory, self.retry_options.clone(), &self.cancel.child_token())
            .await
    }

    async fn execute_json<T: DeserializeOwned>(
        &self,
        method: Method,
        url: Url,
        body: Option<serde_json::Value>,
    ) -> Result<T> {
        let response = self.send(method, url, body).await?;
        response
            .json()
            .await
            .map_err(|e| VaultError::Protocol(format!("failed to decode response: {e}")))
    }
}

fn decode_file_metadata(response: &Response) -> Result<FileMetadata> {
    use base64::engine::general_purpose::STANDARD as BASE64;
    use base64::Engine;

    let Some(value) = response.headers().get(FILE_METADATA_HEADER) else {
        return Ok(FileMetadata::default());
    };

    let raw = value
        .to_str()
        .map_err(|_| VaultError::Validation("file metadata header is not ASCII".to_string()))?;
    let decoded = BASE64
        .decode(raw)
        .map_err(|e| VaultError::Validation(format!("file metadata header is not base64: {e}")))?;
    serde_json::from_slice(&decoded)
        .map_err(|e| VaultError::Validation(format!("file metadata header is not valid: {e}")))
}

/// Builds a fresh signed request per attempt.
struct EndpointFactory {
    client: reqwest::Client,
    tokens: Arc<dyn AccessTokenProvider>,
    method: Method,
    url: Url,
    body: Option<serde_json::Value>,
    correlation_id: String,
}

#[async_trait]
impl RequestFactory for EndpointFactory {
    async fn create(&self, _attempt: u32) -> Result<Request> {
        let token = self.tokens.access_token().await?;

        let mut builder = self
            .client
            .request(self.method.clone(), self.url.clone())
            .bearer_auth(token)
            .header(ACCEPT, "application/json")
            .header("X-Correlation-Id", &self.correlation_id);
        if let Some(body) = &self.body {
            builder = builder.json(body);
        }

        builder
            .build()
            .map_err(|e| VaultError::Internal(format!("request construction failed: {e}")))
    }
}

/// Builder for [`ApiClient`].
#[derive(Default)]
pub struct ApiClientBuilder {
    config: Option<SdkConfig>,
    tokens: Option<Arc<dyn AccessTokenProvider>>,
    private_key: Option<Arc<RsaPrivateKey>>,
    cancel: Option<CancellationToken>,
}

impl ApiClientBuilder {
    pub fn config(mut self, config: SdkConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn tokens(mut self, tokens: Arc<dyn AccessTokenProvider>) -> Self {
        self.tokens = Some(tokens);
        self
    }

    /// Private key used to open sealed session files.
    pub fn private_key(mut self, key: Arc<RsaPrivateKey>) -> Self {
        self.private_key = Some(key);
        self
    }

    /// Use an externally owned cancellation token.
    pub fn cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// # Errors
    /// Fails when a required component is missing or the retry
    /// configuration is invalid.
    pub fn build(self) -> Result<ApiClient> {
        let config = self.config.unwrap_or_default();
        let tokens = self
            .tokens
            .ok_or_else(|| VaultError::Config("access token provider is required".to_string()))?;
        let private_key = self
            .private_key
            .ok_or_else(|| VaultError::Config("private key is required".to_string()))?;

        let retry_options = config.retry_options()?;
        let executor = RequestExecutor::builder()
            .timeout(config.timeout())
            .retry_options(retry_options.clone())
            .build()?;

        let session_cache = TtlCache::new(TtlCacheConfig {
            max_capacity: config.session_cache_capacity,
            ..Default::default()
        });

        Ok(ApiClient {
            executor: Arc::new(executor),
            config,
            retry_options,
            tokens,
            private_key,
            session_cache,
            cancel: self.cancel.unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use base64::engine::general_purpose::STANDARD as BASE64;
    use base64::Engine;
    use rsa::RsaPublicKey;
    use vaultlink_common::crypto::seal;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    struct StaticTokens;

    #[async_trait]
    impl AccessTokenProvider for StaticTokens {
        async fn access_token(&self) -> Result<String> {
            Ok("test-token".to_string())
        }
    }

    fn test_key() -> Arc<RsaPrivateKey> {
        static KEY: std::sync::OnceLock<RsaPrivateKey> = std::sync::OnceLock::new();
        Arc::new(
            KEY.get_or_init(|| {
                RsaPrivateKey::new(&mut rand::thread_rng(), 2048).expect("test key generation")
            })
            .clone(),
        )
    }

    fn client(base_url: String) -> ApiClient {
        let config = SdkConfig { base_url, max_attempts: 0, ..Default::default() };
        ApiClient::builder()
            .config(config)
            .tokens(Arc::new(StaticTokens))
            .private_key(test_key())
            .build()
            .expect("api client")
    }

    #[tokio::test]
    async fn create_session_decodes_and_caches() {
        let server = MockServer::start().await;
        let expiry = Utc::now() + chrono::Duration::minutes(10);
        Mock::given(method("POST"))
            .and(path("/sessions"))
            .and(header("Authorization", "Bearer test-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "key": "sess-1",
                "expiry": expiry,
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client(server.uri());

        let session = client.create_session().await.unwrap();
        assert_eq!(session.key, "sess-1");

        // Second call hits the cache, not the server.
        let cached = client.session().await.unwrap();
        assert_eq!(cached.key, "sess-1");
        assert_eq!(server.received_requests().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn fetch_file_list_decodes_the_listing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/sessions/sess-1/files"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": {"state": "running"},
                "fileList": [{"name": "a.json", "updatedDate": 1700000000000i64}],
            })))
            .mount(&server)
            .await;

        let client = client(server.uri());
        let listing = client.fetch_file_list("sess-1").await.unwrap();

        assert_eq!(listing.files.len(), 1);
        assert_eq!(listing.files[0].name, "a.json");
    }

    #[tokio::test]
    async fn fetch_file_reads_sealed_body_end_to_end() {
        let server = MockServer::start().await;
        let key = test_key();
        let sealed = seal(br#"{"ok": true}"#, &RsaPublicKey::from(key.as_ref())).unwrap();
        let metadata = BASE64.encode(serde_json::json!({"metadata": {"mime": "application/json"}}).to_string());

        Mock::given(method("GET"))
            .and(path("/sessions/sess-1/files/a.json"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("X-File-Metadata", metadata.as_str())
                    .set_body_bytes(sealed),
            )
            .mount(&server)
            .await;

        let client = client(server.uri());
        let file = client.fetch_file("sess-1", "a.json").await.unwrap();

        assert_eq!(file.name(), Some("a.json"));
        assert_eq!(file.json().await.unwrap(), serde_json::json!({"ok": true}));
    }

    #[tokio::test]
    async fn malformed_metadata_header_is_a_validation_fault() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("X-File-Metadata", "%%% not base64 %%%")
                    .set_body_bytes(vec![0u8; 16]),
            )
            .mount(&server)
            .await;

        let client = client(server.uri());
        let result = client.fetch_file("sess-1", "a.json").await;

        assert!(matches!(result, Err(VaultError::Validation(_))));
    }

    #[tokio::test]
    async fn delete_user_sends_delete() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/user"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let client = client(server.uri());
        client.delete_user().await.unwrap();
    }

    #[tokio::test]
    async fn portability_report_returns_body_text() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/export/medical/report"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<report/>"))
            .mount(&server)
            .await;

        let client = client(server.uri());
        let report = client.portability_report("medical", "xml", 0, 100).await.unwrap();

        assert_eq!(report, "<report/>");
    }
}
