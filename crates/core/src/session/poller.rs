//! Session polling state machine
//!
//! Drives repeated list-and-process cycles against a remote session until
//! the job reports a terminal state. The machine is an explicit state enum
//! with a transition loop; every suspension (collaborator calls, the
//! adaptive wait) observes the cancellation token.
//!
//! Ordering guarantees: file processing is strictly sequential, and a
//! listing fetch never starts while a file is being processed.

use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use vaultlink_common::time::delay;
use vaultlink_domain::{FileListEntry, JobState, Result, SessionFileList, VaultError};

use crate::ports::{FileListSource, FileProcessor, SessionSource};
use crate::session::tracker::ProcessedFiles;

/// Configuration for the session poller.
#[derive(Debug, Clone)]
pub struct PollerConfig {
    /// Upper bound of the adaptive wait between listing fetches.
    pub max_wait: Duration,
    /// Timeout for a single listing fetch.
    pub fetch_timeout: Duration,
    /// Timeout for processing a single file.
    pub process_timeout: Duration,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            max_wait: Duration::from_millis(1000),
            fetch_timeout: Duration::from_secs(30),
            process_timeout: Duration::from_secs(300),
        }
    }
}

/// Read-only view of the poller's progress, shared with the observer facade.
#[derive(Debug, Clone, Default)]
pub struct SessionSnapshot {
    pub session_key: Option<String>,
    pub listing: Option<SessionFileList>,
    pub processed_count: usize,
}

/// Terminal summary returned when the poller reaches `Done`.
#[derive(Debug, Clone)]
pub struct SessionOutcome {
    pub session_key: String,
    pub processed_count: usize,
    pub final_state: JobState,
}

/// States of the polling machine.
#[derive(Debug)]
enum PollerState {
    CreatingSession,
    FetchingFileList,
    FindingReadyFile,
    ProcessingFile(FileListEntry),
    Waiting(Duration),
    Done,
}

/// The session polling orchestrator.
///
/// Owns one run: construct, optionally seed a session key, then `run()` to
/// completion. Each instance is independent; concurrent polls against
/// different sessions need separate instances.
pub struct SessionPoller {
    sessions: Arc<dyn SessionSource>,
    listings: Arc<dyn FileListSource>,
    processor: Arc<dyn FileProcessor>,
    config: PollerConfig,
    cancel: CancellationToken,
    snapshot: Arc<RwLock<SessionSnapshot>>,
    tracker: ProcessedFiles,
    session_key: Option<String>,
    listing: Option<SessionFileList>,
    last_fetch: Option<Instant>,
}

impl SessionPoller {
    pub fn new(
        sessions: Arc<dyn SessionSource>,
        listings: Arc<dyn FileListSource>,
        processor: Arc<dyn FileProcessor>,
        config: PollerConfig,
    ) -> Self {
        Self {
            sessions,
            listings,
            processor,
            config,
            cancel: CancellationToken::new(),
            snapshot: Arc::new(RwLock::new(SessionSnapshot::default())),
            tracker: ProcessedFiles::new(),
            session_key: None,
            listing: None,
            last_fetch: None,
        }
    }

    /// Resume against an existing session instead of creating one.
    #[must_use]
    pub fn with_session_key(mut self, key: impl Into<String>) -> Self {
        self.session_key = Some(key.into());
        self
    }

    /// Use an externally owned cancellation token.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Token that aborts this run when cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Handle to the shared progress snapshot.
    pub fn snapshot_handle(&self) -> Arc<RwLock<SessionSnapshot>> {
        Arc::clone(&self.snapshot)
    }

    /// Drive the machine to a terminal state.
    ///
    /// # Errors
    ///
    /// Fails when session creation or a listing fetch fails, or when the
    /// run is cancelled. Processing failures are logged and swallowed per
    /// the at-most-once-per-version contract.
    pub async fn run(mut self) -> Result<SessionOutcome> {
        let mut state = if self.session_key.is_some() {
            PollerState::FetchingFileList
        } else {
            PollerState::CreatingSession
        };

        loop {
            if self.cancel.is_cancelled() {
                return Err(VaultError::Cancelled("session polling aborted".to_string()));
            }

            state = match state {
                PollerState::CreatingSession => self.create_session().await?,
                PollerState::FetchingFileList => self.fetch_file_list().await?,
                PollerState::FindingReadyFile => self.find_ready_file(),
                PollerState::ProcessingFile(entry) => self.process_file(entry).await?,
                PollerState::Waiting(wait) => {
                    delay(wait, &self.cancel)
                        .await
                        .map_err(|_| VaultError::Cancelled("session polling aborted".to_string()))?;
                    PollerState::FetchingFileList
                }
                PollerState::Done => break,
            };
        }

        let final_state = self
            .listing
            .as_ref()
            .map(|listing| listing.status.state)
            .ok_or_else(|| VaultError::Internal("poller finished without a listing".to_string()))?;

        let session_key = self
            .session_key
            .clone()
            .ok_or_else(|| VaultError::Internal("poller finished without a session".to_string()))?;

        info!(
            session_key = %session_key,
            processed = self.tracker.len(),
            state = ?final_state,
            "session polling finished"
        );

        Ok(SessionOutcome { session_key, processed_count: self.tracker.len(), final_state })
    }

    async fn create_session(&mut self) -> Result<PollerState> {
        let session = tokio::select! {
            _ = self.cancel.cancelled() => {
                return Err(VaultError::Cancelled("session polling aborted".to_string()));
            }
            result = self.sessions.create_session() => result?,
        };

        debug!(session_key = %session.key, expiry = %session.expiry, "session created");
        self.session_key = Some(session.key.clone());
        self.update_snapshot(|snapshot| snapshot.session_key = Some(session.key.clone()));

        Ok(PollerState::FetchingFileList)
    }

    async fn fetch_file_list(&mut self) -> Result<PollerState> {
        let key = self
            .session_key
            .clone()
            .ok_or_else(|| VaultError::Internal("fetching without a session key".to_string()))?;

        let fetch = self.listings.fetch_file_list(&key);
        let listing = tokio::select! {
            _ = self.cancel.cancelled() => {
                return Err(VaultError::Cancelled("session polling aborted".to_string()));
            }
            result = tokio::time::timeout(self.config.fetch_timeout, fetch) => result
                .map_err(|_| VaultError::Transport("file list fetch timed out".to_string()))??,
        };

        debug!(
            session_key = %key,
            state = ?listing.status.state,
            files = listing.files.len(),
            "file listing fetched"
        );

        self.last_fetch = Some(Instant::now());
        self.update_snapshot(|snapshot| snapshot.listing = Some(listing.clone()));
        self.listing = Some(listing);

        Ok(PollerState::FindingReadyFile)
    }

    /// Pure decision step: next ready file, termination, or wait.
    fn find_ready_file(&self) -> PollerState {
        let Some(listing) = self.listing.as_ref() else {
            return PollerState::Waiting(self.adaptive_wait());
        };

        if let Some(entry) = self.tracker.find_ready(&listing.files) {
            return PollerState::ProcessingFile(entry.clone());
        }

        if listing.is_terminal() {
            return PollerState::Done;
        }

        PollerState::Waiting(self.adaptive_wait())
    }

    async fn process_file(&mut self, entry: FileListEntry) -> Result<PollerState> {
        let key = self
            .session_key
            .clone()
            .ok_or_else(|| VaultError::Internal("processing without a session key".to_string()))?;

        // Mark at selection time: this version gets at most one delivery,
        // even if processing fails below.
        self.tracker.mark_processed(&entry.name, entry.updated);

        let work = self.processor.process_file(&key, &entry.name);
        let result = tokio::select! {
            _ = self.cancel.cancelled() => {
                return Err(VaultError::Cancelled("session polling aborted".to_string()));
            }
            result = tokio::time::timeout(self.config.process_timeout, work) => result
                .unwrap_or_else(|_| {
                    Err(VaultError::Transport("file processing timed out".to_string()))
                }),
        };

        match result {
            Ok(()) => {
                debug!(file = %entry.name, updated = entry.updated, "file processed");
            }
            Err(err) => {
                warn!(
                    file = %entry.name,
                    updated = entry.updated,
                    error = %err,
                    "file processing failed; continuing"
                );
            }
        }

        let processed_count = self.tracker.len();
        self.update_snapshot(|snapshot| snapshot.processed_count = processed_count);

        Ok(PollerState::FindingReadyFile)
    }

    /// Adaptive wait: poll quickly right after activity, throttle to at
    /// most one fetch per `max_wait` once the listing goes quiet.
    fn adaptive_wait(&self) -> Duration {
        match self.last_fetch {
            Some(at) => at.elapsed().min(self.config.max_wait),
            None => Duration::ZERO,
        }
    }

    fn update_snapshot(&self, apply: impl FnOnce(&mut SessionSnapshot)) {
        let mut snapshot = self.snapshot.write().unwrap_or_else(|e| e.into_inner());
        apply(&mut snapshot);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::Utc;
    use vaultlink_domain::{Session, SessionStatus};

    use super::*;

    struct StaticSessions;

    #[async_trait]
    impl SessionSource for StaticSessions {
        async fn create_session(&self) -> Result<Session> {
            Ok(Session {
                key: "session-1".to_string(),
                expiry: Utc::now() + chrono::Duration::minutes(5),
            })
        }
    }

    /// Serves a scripted sequence of listings; repeats the last one.
    struct ScriptedListings {
        script: Mutex<Vec<SessionFileList>>,
        fetches: AtomicUsize,
    }

    impl ScriptedListings {
        fn new(script: Vec<SessionFileList>) -> Self {
            let mut script = script;
            script.reverse();
            Self { script: Mutex::new(script), fetches: AtomicUsize::new(0) }
        }

        fn fetch_count(&self) -> usize {
            self.fetches.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl FileListSource for ScriptedListings {
        async fn fetch_file_list(&self, _session_key: &str) -> Result<SessionFileList> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            let mut script = self.script.lock().unwrap();
            if script.len() > 1 {
                Ok(script.pop().unwrap())
            } else {
                Ok(script.last().cloned().expect("script must not be empty"))
            }
        }
    }

    #[derive(Default)]
    struct RecordingProcessor {
        calls: Mutex<Vec<String>>,
        fail: bool,
    }

    #[async_trait]
    impl FileProcessor for RecordingProcessor {
        async fn process_file(&self, _session_key: &str, file_name: &str) -> Result<()> {
            self.calls.lock().unwrap().push(file_name.to_string());
            if self.fail {
                Err(VaultError::Transport("simulated processing failure".to_string()))
            } else {
                Ok(())
            }
        }
    }

    fn listing(state: JobState, files: Vec<(&str, i64)>) -> SessionFileList {
        SessionFileList {
            status: SessionStatus { state, details: None },
            files: files
                .into_iter()
                .map(|(name, updated)| FileListEntry {
                    name: name.to_string(),
                    updated,
                    schema: None,
                })
                .collect(),
        }
    }

    fn poller(
        listings: Arc<ScriptedListings>,
        processor: Arc<RecordingProcessor>,
    ) -> SessionPoller {
        SessionPoller::new(Arc::new(StaticSessions), listings, processor, PollerConfig::default())
    }

    #[tokio::test]
    async fn processes_each_file_once_per_version() {
        let listings = Arc::new(ScriptedListings::new(vec![
            listing(JobState::Running, vec![("a", 100)]),
            // Same timestamp again: no re-delivery.
            listing(JobState::Running, vec![("a", 100)]),
            // Newer version: delivered again.
            listing(JobState::Completed, vec![("a", 200)]),
        ]));
        let processor = Arc::new(RecordingProcessor::default());

        let outcome = poller(Arc::clone(&listings), Arc::clone(&processor)).run().await.unwrap();

        let calls = processor.calls.lock().unwrap().clone();
        assert_eq!(calls, vec!["a", "a"]);
        assert_eq!(outcome.final_state, JobState::Completed);
        assert_eq!(outcome.session_key, "session-1");
    }

    #[tokio::test]
    async fn terminates_on_completed_with_no_further_fetches() {
        let listings = Arc::new(ScriptedListings::new(vec![listing(
            JobState::Completed,
            vec![("a", 100)],
        )]));
        let processor = Arc::new(RecordingProcessor::default());

        let outcome = poller(Arc::clone(&listings), Arc::clone(&processor)).run().await.unwrap();

        // One fetch sufficed: the file was processed from the terminal
        // listing and the machine reached Done without polling again.
        assert_eq!(listings.fetch_count(), 1);
        assert_eq!(outcome.processed_count, 1);
    }

    #[tokio::test]
    async fn partial_state_is_terminal() {
        let listings =
            Arc::new(ScriptedListings::new(vec![listing(JobState::Partial, vec![("a", 1)])]));
        let processor = Arc::new(RecordingProcessor::default());

        let outcome = poller(listings, processor).run().await.unwrap();
        assert_eq!(outcome.final_state, JobState::Partial);
    }

    #[tokio::test]
    async fn processing_failure_is_swallowed_and_marked() {
        let listings = Arc::new(ScriptedListings::new(vec![
            listing(JobState::Running, vec![("a", 100), ("b", 100)]),
            listing(JobState::Completed, vec![("a", 100), ("b", 100)]),
        ]));
        let processor = Arc::new(RecordingProcessor { fail: true, ..Default::default() });

        let outcome = poller(Arc::clone(&listings), Arc::clone(&processor)).run().await.unwrap();

        // Both files attempted exactly once despite every attempt failing.
        let calls = processor.calls.lock().unwrap().clone();
        assert_eq!(calls, vec!["a", "b"]);
        assert_eq!(outcome.processed_count, 2);
    }

    #[tokio::test]
    async fn pending_listing_keeps_polling_until_data_arrives() {
        let listings = Arc::new(ScriptedListings::new(vec![
            listing(JobState::Pending, vec![]),
            listing(JobState::Running, vec![("a", 10)]),
            listing(JobState::Completed, vec![("a", 10)]),
        ]));
        let processor = Arc::new(RecordingProcessor::default());

        let outcome = poller(Arc::clone(&listings), Arc::clone(&processor)).run().await.unwrap();

        assert!(listings.fetch_count() >= 3);
        assert_eq!(outcome.processed_count, 1);
    }

    #[tokio::test]
    async fn resumes_with_supplied_session_key() {
        struct PanickingSessions;

        #[async_trait]
        impl SessionSource for PanickingSessions {
            async fn create_session(&self) -> Result<Session> {
                Err(VaultError::Internal("create_session must not be called".to_string()))
            }
        }

        let listings = Arc::new(ScriptedListings::new(vec![listing(JobState::Completed, vec![])]));
        let processor = Arc::new(RecordingProcessor::default());

        let outcome = SessionPoller::new(
            Arc::new(PanickingSessions),
            listings,
            processor,
            PollerConfig::default(),
        )
        .with_session_key("resumed-key")
        .run()
        .await
        .unwrap();

        assert_eq!(outcome.session_key, "resumed-key");
    }

    #[tokio::test]
    async fn cancellation_aborts_the_run() {
        // A listing that never terminates keeps the poller waiting.
        let listings =
            Arc::new(ScriptedListings::new(vec![listing(JobState::Running, vec![])]));
        let processor = Arc::new(RecordingProcessor::default());

        let poller = poller(listings, processor);
        let cancel = poller.cancellation_token();

        let handle = tokio::spawn(poller.run());
        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.cancel();

        let result = handle.await.unwrap();
        assert!(matches!(result, Err(VaultError::Cancelled(_))));
    }

    #[tokio::test]
    async fn snapshot_tracks_progress() {
        let listings = Arc::new(ScriptedListings::new(vec![
            listing(JobState::Running, vec![("a", 1)]),
            listing(JobState::Completed, vec![("a", 1)]),
        ]));
        let processor = Arc::new(RecordingProcessor::default());

        let poller = poller(listings, processor);
        let snapshot = poller.snapshot_handle();

        poller.run().await.unwrap();

        let view = snapshot.read().unwrap();
        assert_eq!(view.session_key.as_deref(), Some("session-1"));
        assert_eq!(view.processed_count, 1);
        assert_eq!(
            view.listing.as_ref().map(|l| l.status.state),
            Some(JobState::Completed)
        );
    }
}
