//! Downloaded session file with its single-use pipeline accessors

use std::sync::{Arc, Mutex};

use futures::stream::BoxStream;
use futures::TryStreamExt;
use rsa::RsaPrivateKey;
use vaultlink_domain::{FileMetadata, Result, VaultError};

use crate::files::json_stream::json_array_stream;
use crate::files::pipeline::{self, bytes_stream, ByteStream};

/// A downloaded session file.
///
/// Owns the raw byte stream exactly once: the first accessor that needs it
/// locks it, and any later acquisition fails with a validation fault. All
/// pipeline accessors (`processed_stream`, `text`, `json`, ...) consume the
/// raw stream, so a file supports exactly one read, in one form.
pub struct SessionFile {
    name: Option<String>,
    metadata: FileMetadata,
    private_key: Arc<RsaPrivateKey>,
    raw: Mutex<Option<ByteStream>>,
}

impl std::fmt::Debug for SessionFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionFile")
            .field("name", &self.name)
            .field("metadata", &self.metadata)
            .field("consumed", &self.raw.lock().map(|s| s.is_none()).unwrap_or(true))
            .finish()
    }
}

impl SessionFile {
    /// Wrap a raw sealed byte stream.
    pub fn new(
        raw: ByteStream,
        private_key: Arc<RsaPrivateKey>,
        metadata: FileMetadata,
        name: Option<String>,
    ) -> Self {
        Self { name, metadata, private_key, raw: Mutex::new(Some(raw)) }
    }

    /// Wrap an already-downloaded sealed buffer.
    pub fn from_bytes(
        sealed: Vec<u8>,
        private_key: Arc<RsaPrivateKey>,
        metadata: FileMetadata,
        name: Option<String>,
    ) -> Self {
        Self::new(bytes_stream(sealed, 64 * 1024), private_key, metadata, name)
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn metadata(&self) -> &FileMetadata {
        &self.metadata
    }

    /// Take the raw sealed byte stream.
    ///
    /// # Errors
    ///
    /// Fails with a validation fault when the stream was already taken by
    /// this or any other accessor.
    pub fn raw_stream(&self) -> Result<ByteStream> {
        self.raw
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
            .ok_or_else(|| VaultError::Validation("file stream already consumed".to_string()))
    }

    /// Decrypted and decompressed byte stream.
    ///
    /// # Errors
    ///
    /// Fails immediately when the raw stream was already consumed; decrypt
    /// and inflate failures surface through the stream items.
    pub fn processed_stream(&self) -> Result<ByteStream> {
        let raw = self.raw_stream()?;
        Ok(pipeline::processed_stream(
            raw,
            Arc::clone(&self.private_key),
            self.metadata.compression,
        ))
    }

    /// UTF-8 decoded text stream over the processed bytes.
    pub fn text_stream(&self) -> Result<BoxStream<'static, Result<String>>> {
        Ok(pipeline::text_stream(self.processed_stream()?))
    }

    /// Materialise the whole file as text. Terminal, eager operation.
    pub async fn text(&self) -> Result<String> {
        let parts: Vec<String> = self.text_stream()?.try_collect().await?;
        Ok(parts.concat())
    }

    /// Parse the whole file as a JSON document.
    pub async fn json(&self) -> Result<serde_json::Value> {
        let text = self.text().await?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Lazily stream the elements of a JSON array file.
    ///
    /// Single-pass and not restartable; the underlying stream is consumed
    /// as elements are pulled.
    pub fn json_stream(&self) -> Result<BoxStream<'static, Result<serde_json::Value>>> {
        Ok(json_array_stream(self.processed_stream()?))
    }
}
