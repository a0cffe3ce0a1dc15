//! Resilient request executor
//!
//! A finite-state machine wrapping one logical request: build a fresh
//! request, send it, classify the outcome, then retry with backoff, fail,
//! or complete. The explicit state enum keeps retry and cancellation
//! behaviour testable without a live endpoint.
//!
//! Guarantees:
//! - at most `max_attempts + 1` physical sends per run
//! - attempts are strictly sequential, never two sends in flight
//! - cancellation is observed at the backoff delay and aborts the in-flight
//!   send

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Request, Response};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use vaultlink_common::retry::{parse_retry_after, DelayContext, RetryDecision, RetryOptions};
use vaultlink_common::time::delay;
use vaultlink_domain::types::api_error::{
    ERROR_CODE_HEADER, ERROR_MESSAGE_HEADER, ERROR_REFERENCE_HEADER,
};
use vaultlink_domain::{ApiError, Result, VaultError};

use crate::errors::from_reqwest;

/// Classifier deciding whether a transport-level error is worth retrying.
type TransportClassifier = Arc<dyn Fn(&reqwest::Error) -> bool + Send + Sync>;

/// Produces a fresh request for every attempt.
///
/// A request body may not be resendable once consumed, and signed requests
/// embed timestamps, so the executor never reuses a request value: each
/// attempt asks the factory for a new one. The factory may be async (e.g.
/// to sign a token).
#[async_trait]
pub trait RequestFactory: Send + Sync {
    /// Build the request for the given attempt number (1-based).
    async fn create(&self, attempt: u32) -> Result<Request>;
}

/// Adapter for using a closure as a [`RequestFactory`].
pub struct FnFactory<F>(pub F);

#[async_trait]
impl<F, Fut> RequestFactory for FnFactory<F>
where
    F: Fn(u32) -> Fut + Send + Sync,
    Fut: std::future::Future<Output = Result<Request>> + Send,
{
    async fn create(&self, attempt: u32) -> Result<Request> {
        (self.0)(attempt).await
    }
}

/// States of the delivery machine.
enum ExecutorState {
    CreatingRequest,
    Fetching(Request),
    ResolvingResponseError(Response),
    WaitingToRetry(Duration),
    Complete(Response),
    Failed(VaultError),
}

/// Retry/backoff state machine wrapping a single logical network request.
///
/// Cheap to clone; independent executions own independent machine state,
/// so concurrent calls on one executor are safe.
#[derive(Clone)]
pub struct RequestExecutor {
    client: reqwest::Client,
    defaults: RetryOptions,
    transport_retryable: TransportClassifier,
}

impl RequestExecutor {
    /// Start building an executor.
    pub fn builder() -> RequestExecutorBuilder {
        RequestExecutorBuilder::default()
    }

    /// Convenience constructor with default configuration.
    pub fn new() -> Result<Self> {
        Self::builder().build()
    }

    /// The underlying HTTP client, for building requests.
    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    /// Execute with the executor's default retry options.
    pub async fn execute(
        &self,
        factory: &dyn RequestFactory,
        cancel: &CancellationToken,
    ) -> Result<Response> {
        self.execute_with_options(factory, self.defaults.clone(), cancel).await
    }

    /// Execute with per-run retry option overrides.
    ///
    /// # Errors
    ///
    /// Fails with the last observed error on retry exhaustion, with the
    /// decoded [`ApiError`] on a non-retryable status, with a protocol
    /// fault when an error response cannot be decoded, and with a
    /// cancellation error when the token fires.
    pub async fn execute_with_options(
        &self,
        factory: &dyn RequestFactory,
        options: RetryOptions,
        cancel: &CancellationToken,
    ) -> Result<Response> {
        let mut attempts: u32 = 0;
        let mut last_error: Option<VaultError> = None;
        let mut state = ExecutorState::CreatingRequest;

        loop {
            state = match state {
                ExecutorState::CreatingRequest => {
                    attempts += 1;
                    match factory.create(attempts).await {
                        Ok(request) => ExecutorState::Fetching(request),
                        Err(err) => ExecutorState::Failed(err),
                    }
                }

                ExecutorState::Fetching(request) => {
                    let method = request.method().clone();
                    let url = request.url().clone();
                    debug!(attempt = attempts, %method, %url, "sending request");

                    let send = self.client.execute(request);
                    let outcome = tokio::select! {
                        _ = cancel.cancelled() => {
                            return Err(VaultError::Cancelled("request aborted".to_string()));
                        }
                        outcome = send => outcome,
                    };

                    match outcome {
                        Ok(response) if response.status().is_success() => {
                            debug!(attempt = attempts, %method, %url, status = %response.status(), "request complete");
                            ExecutorState::Complete(response)
                        }
                        Ok(response) => ExecutorState::ResolvingResponseError(response),
                        Err(err) => {
                            debug!(attempt = attempts, %method, %url, error = %err, "transport failure");
                            if (self.transport_retryable)(&err) {
                                last_error = Some(from_reqwest(&err));
                                self.decide(&options, attempts, None, &mut last_error)
                            } else {
                                ExecutorState::Failed(from_reqwest(&err))
                            }
                        }
                    }
                }

                ExecutorState::ResolvingResponseError(response) => {
                    let status = response.status();
                    let retry_after = retry_after_hint(response.headers());

                    match decode_api_error(response.headers()) {
                        Some(api_error) => {
                            let api_error = api_error.with_status(status.as_u16());
                            if options.is_status_retryable(status.as_u16()) {
                                warn!(
                                    attempt = attempts,
                                    status = %status,
                                    code = %api_error.code,
                                    "retryable API error"
                                );
                                last_error = Some(VaultError::Api(api_error));
                                self.decide(&options, attempts, retry_after, &mut last_error)
                            } else {
                                ExecutorState::Failed(VaultError::Api(api_error))
                            }
                        }
                        // The API's own error contract was violated: intent
                        // is unknown, so never retry.
                        None => ExecutorState::Failed(VaultError::Protocol(format!(
                            "received unexpected error response with status {status}"
                        ))),
                    }
                }

                ExecutorState::WaitingToRetry(wait) => {
                    debug!(attempt = attempts, delay = ?wait, "waiting to retry");
                    match delay(wait, cancel).await {
                        Ok(()) => ExecutorState::CreatingRequest,
                        Err(_) => ExecutorState::Failed(VaultError::Cancelled(
                            "retry delay aborted".to_string(),
                        )),
                    }
                }

                ExecutorState::Complete(response) => return Ok(response),
                ExecutorState::Failed(err) => return Err(err),
            };
        }
    }

    /// Consult the retry policy after a failed attempt.
    fn decide(
        &self,
        options: &RetryOptions,
        attempts: u32,
        retry_after: Option<Duration>,
        last_error: &mut Option<VaultError>,
    ) -> ExecutorState {
        let ctx = DelayContext { attempts, retry_after };
        match options.evaluate(&ctx) {
            RetryDecision::RetryAfter(wait) => ExecutorState::WaitingToRetry(wait),
            RetryDecision::Exhausted => {
                warn!(attempts, "retry budget exhausted");
                ExecutorState::Failed(take_last_error(last_error))
            }
            RetryDecision::HintExceedsCeiling(hint) => {
                warn!(attempts, hint = ?hint, "Retry-After hint exceeds ceiling");
                ExecutorState::Failed(take_last_error(last_error))
            }
        }
    }
}

fn take_last_error(last_error: &mut Option<VaultError>) -> VaultError {
    last_error
        .take()
        .unwrap_or_else(|| VaultError::Internal("retry failed without an error".to_string()))
}

fn retry_after_hint(headers: &HeaderMap) -> Option<Duration> {
    headers.get(RETRY_AFTER).and_then(|v| v.to_str().ok()).and_then(parse_retry_after)
}

/// Decode the structured API error from response headers.
///
/// Returns `None` when any of the three error headers is missing or not
/// valid UTF-8; the caller treats that as a protocol fault.
pub fn decode_api_error(headers: &HeaderMap) -> Option<ApiError> {
    let field = |name: &str| {
        headers.get(name).and_then(|v| v.to_str().ok()).map(str::to_string)
    };

    Some(ApiError::from_parts(
        field(ERROR_CODE_HEADER)?,
        field(ERROR_MESSAGE_HEADER)?,
        field(ERROR_REFERENCE_HEADER)?,
    ))
}

/// Builder for [`RequestExecutor`].
pub struct RequestExecutorBuilder {
    timeout: Duration,
    defaults: RetryOptions,
    transport_retryable: TransportClassifier,
    user_agent: Option<String>,
}

impl Default for RequestExecutorBuilder {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            defaults: RetryOptions::default(),
            transport_retryable: Arc::new(default_transport_retryable),
            user_agent: None,
        }
    }
}

impl RequestExecutorBuilder {
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Default retry options applied when a call passes no overrides.
    pub fn retry_options(mut self, options: RetryOptions) -> Self {
        self.defaults = options;
        self
    }

    /// Replace the transport-error classifier.
    pub fn transport_retryable<F>(mut self, classifier: F) -> Self
    where
        F: Fn(&reqwest::Error) -> bool + Send + Sync + 'static,
    {
        self.transport_retryable = Arc::new(classifier);
        self
    }

    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    pub fn build(self) -> Result<RequestExecutor> {
        let mut builder = reqwest::Client::builder().timeout(self.timeout).no_proxy();
        if let Some(agent) = self.user_agent {
            builder = builder.user_agent(agent);
        }

        let client = builder.build().map_err(|e| {
            VaultError::Internal(format!("failed to build HTTP client: {e}"))
        })?;

        Ok(RequestExecutor {
            client,
            defaults: self.defaults,
            transport_retryable: self.transport_retryable,
        })
    }
}

/// Default classifier: only network-level failures (connect, timeout) are
/// transient; everything else the transport reports is fatal.
fn default_transport_retryable(err: &reqwest::Error) -> bool {
    err.is_connect() || err.is_timeout()
}
