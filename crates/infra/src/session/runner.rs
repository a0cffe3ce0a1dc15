//! Port adapters over the API client
//!
//! The core orchestrator only knows its three ports; these adapters
//! implement them with real endpoint calls. File processing fetches the
//! sealed body and hands the pipeline-ready [`SessionFile`] to the caller's
//! handler; consumption strategy (text, JSON, streaming) is the handler's
//! choice.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;
use vaultlink_core::ports::{FileListSource, FileProcessor, SessionSource};
use vaultlink_domain::{Result, Session, SessionFileList};

use crate::api::client::ApiClient;
use crate::files::SessionFile;

/// Handler invoked once per ready file version.
#[async_trait]
pub trait FileHandler: Send + Sync {
    /// Consume one downloaded session file.
    async fn on_file_ready(&self, file: SessionFile) -> Result<()>;
}

/// [`SessionSource`] over the session-create endpoint.
pub struct ApiSessionSource {
    api: Arc<ApiClient>,
}

impl ApiSessionSource {
    pub fn new(api: Arc<ApiClient>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl SessionSource for ApiSessionSource {
    async fn create_session(&self) -> Result<Session> {
        self.api.create_session().await
    }
}

/// [`FileListSource`] over the file-listing endpoint.
pub struct ApiFileListSource {
    api: Arc<ApiClient>,
}

impl ApiFileListSource {
    pub fn new(api: Arc<ApiClient>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl FileListSource for ApiFileListSource {
    async fn fetch_file_list(&self, session_key: &str) -> Result<SessionFileList> {
        self.api.fetch_file_list(session_key).await
    }
}

/// [`FileProcessor`] that downloads the file and runs the caller's handler.
pub struct PipelineFileProcessor {
    api: Arc<ApiClient>,
    handler: Arc<dyn FileHandler>,
}

impl PipelineFileProcessor {
    pub fn new(api: Arc<ApiClient>, handler: Arc<dyn FileHandler>) -> Self {
        Self { api, handler }
    }
}

#[async_trait]
impl FileProcessor for PipelineFileProcessor {
    async fn process_file(&self, session_key: &str, file_name: &str) -> Result<()> {
        debug!(file = %file_name, "downloading session file");
        let file = self.api.fetch_file(session_key, file_name).await?;
        self.handler.on_file_ready(file).await
    }
}
