//! Session observer facade
//!
//! Thin lifecycle wrapper over the polling orchestrator: `start` spawns the
//! poller task against the API client, `stop` cancels it and joins with a
//! timeout, and the status getters read the shared snapshot without side
//! effects. The join handle is tracked so a panicking poller surfaces
//! instead of leaking.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};
use vaultlink_core::session::poller::{
    PollerConfig, SessionOutcome, SessionPoller, SessionSnapshot,
};
use vaultlink_domain::{JobState, Result, SessionFileList, VaultError};

use crate::api::client::ApiClient;
use crate::session::runner::{
    ApiFileListSource, ApiSessionSource, FileHandler, PipelineFileProcessor,
};

/// Observer over one session's polling lifecycle.
pub struct SessionObserver {
    api: Arc<ApiClient>,
    config: PollerConfig,
    join_timeout: Duration,
    cancellation: CancellationToken,
    task: Option<JoinHandle<Result<SessionOutcome>>>,
    snapshot: Option<Arc<RwLock<SessionSnapshot>>>,
}

impl SessionObserver {
    pub fn new(api: Arc<ApiClient>, config: PollerConfig) -> Self {
        Self {
            api,
            config,
            join_timeout: Duration::from_secs(5),
            cancellation: CancellationToken::new(),
            task: None,
            snapshot: None,
        }
    }

    /// How long `stop` waits for the poller task to wind down.
    #[must_use]
    pub fn with_join_timeout(mut self, timeout: Duration) -> Self {
        self.join_timeout = timeout;
        self
    }

    /// Whether the polling task is currently alive.
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Start observing: spawn the poller with the given file handler.
    ///
    /// Pass a `session_key` to resume an existing session; omit it to let
    /// the poller create one.
    ///
    /// # Errors
    /// Fails when the observer is already running.
    #[instrument(skip(self, handler, session_key))]
    pub fn start(
        &mut self,
        handler: Arc<dyn FileHandler>,
        session_key: Option<String>,
    ) -> Result<()> {
        if self.is_running() {
            return Err(VaultError::Validation("observer already running".to_string()));
        }

        info!("starting session observer");

        // Fresh token per run so a previous stop doesn't poison this one.
        self.cancellation = CancellationToken::new();

        let mut poller = SessionPoller::new(
            Arc::new(ApiSessionSource::new(Arc::clone(&self.api))),
            Arc::new(ApiFileListSource::new(Arc::clone(&self.api))),
            Arc::new(PipelineFileProcessor::new(Arc::clone(&self.api), handler)),
            self.config.clone(),
        )
        .with_cancellation(self.cancellation.child_token());

        if let Some(key) = session_key {
            poller = poller.with_session_key(key);
        }

        self.snapshot = Some(poller.snapshot_handle());
        self.task = Some(tokio::spawn(poller.run()));

        Ok(())
    }

    /// Stop observing: cancel the poller and join it.
    ///
    /// Returns the outcome when the poller had already finished cleanly,
    /// `None` when it was interrupted mid-run.
    ///
    /// # Errors
    /// Fails when the observer is not running, when the task panicked, or
    /// when it does not wind down within the join timeout.
    #[instrument(skip(self))]
    pub async fn stop(&mut self) -> Result<Option<SessionOutcome>> {
        let Some(task) = self.task.take() else {
            return Err(VaultError::Validation("observer not running".to_string()));
        };

        info!("stopping session observer");
        self.cancellation.cancel();

        match tokio::time::timeout(self.join_timeout, task).await {
            Ok(Ok(Ok(outcome))) => Ok(Some(outcome)),
            Ok(Ok(Err(err))) if err.is_cancelled() => Ok(None),
            Ok(Ok(Err(err))) => Err(err),
            Ok(Err(join_err)) => {
                warn!(error = %join_err, "observer task panicked");
                Err(VaultError::Internal("observer task panicked".to_string()))
            }
            Err(_) => {
                warn!("observer task did not stop within timeout");
                Err(VaultError::Internal("observer task did not stop in time".to_string()))
            }
        }
    }

    /// Wait for the poller to reach its terminal state.
    ///
    /// # Errors
    /// Propagates the poller's terminal error; fails when the observer was
    /// never started.
    pub async fn wait(&mut self) -> Result<SessionOutcome> {
        let Some(task) = self.task.take() else {
            return Err(VaultError::Validation("observer not running".to_string()));
        };
        task.await.map_err(|_| VaultError::Internal("observer task panicked".to_string()))?
    }

    /// Current remote job state, if a listing has been fetched.
    pub fn status(&self) -> Option<JobState> {
        self.read_snapshot(|snapshot| {
            snapshot.listing.as_ref().map(|listing| listing.status.state)
        })
    }

    /// Latest fetched file listing.
    pub fn file_list(&self) -> Option<SessionFileList> {
        self.read_snapshot(|snapshot| snapshot.listing.clone())
    }

    /// Session key in use, once known.
    pub fn session_key(&self) -> Option<String> {
        self.read_snapshot(|snapshot| snapshot.session_key.clone())
    }

    /// Number of distinct files processed so far.
    pub fn processed_count(&self) -> usize {
        self.read_snapshot(|snapshot| Some(snapshot.processed_count)).unwrap_or(0)
    }

    fn read_snapshot<T>(&self, read: impl FnOnce(&SessionSnapshot) -> Option<T>) -> Option<T> {
        let snapshot = self.snapshot.as_ref()?;
        let guard = snapshot.read().unwrap_or_else(|e| e.into_inner());
        read(&guard)
    }
}
