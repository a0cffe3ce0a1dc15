//! Processed-file ledger
//!
//! The orchestrator processes each file exactly once per observed version.
//! This ledger records, per file name, the `updated` timestamp it was last
//! selected with; a file is ready again only when the listing carries a
//! strictly greater timestamp.

use std::collections::HashMap;

use vaultlink_domain::FileListEntry;

/// Mapping from file name to the last processed `updated` timestamp.
#[derive(Debug, Clone, Default)]
pub struct ProcessedFiles {
    processed: HashMap<String, i64>,
}

impl ProcessedFiles {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a listing entry is newer than anything recorded for its name.
    pub fn is_ready(&self, entry: &FileListEntry) -> bool {
        match self.processed.get(&entry.name) {
            Some(&last) => entry.updated > last,
            None => true,
        }
    }

    /// Select the first ready file in listing order.
    ///
    /// Tie-break is positional: the earliest listed ready file wins, not the
    /// most recently updated one.
    pub fn find_ready<'a>(&self, files: &'a [FileListEntry]) -> Option<&'a FileListEntry> {
        files.iter().find(|entry| self.is_ready(entry))
    }

    /// Record a file as processed at the given timestamp.
    ///
    /// Called at selection time, before the processing collaborator runs:
    /// a version observed is a version owed at most one delivery, even if
    /// processing then fails.
    pub fn mark_processed(&mut self, name: &str, updated: i64) {
        self.processed.insert(name.to_string(), updated);
    }

    /// Number of distinct files ever processed.
    pub fn len(&self) -> usize {
        self.processed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processed.is_empty()
    }
}
