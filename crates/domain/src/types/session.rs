//! Session and file-listing types polled from the Vault API

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Remote job handle returned when a session is created.
///
/// Sessions are time-bounded: file listings can only be polled against a
/// session key until `expiry`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Opaque key identifying the remote job.
    pub key: String,
    /// Absolute expiry timestamp (UTC).
    pub expiry: DateTime<Utc>,
}

impl Session {
    /// Remaining lifetime of the session, `None` once expired.
    #[must_use]
    pub fn time_to_live(&self, now: DateTime<Utc>) -> Option<std::time::Duration> {
        (self.expiry - now).to_std().ok()
    }
}

/// State of the remote collection job backing a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    /// Job accepted but no data gathered yet; the file list is absent.
    Pending,
    /// Data is being gathered; the file list may grow or update.
    Running,
    /// Job finished with some sources failing; listing is final.
    Partial,
    /// Job finished successfully; listing is final.
    Completed,
}

impl JobState {
    /// Whether the remote job will produce no further listing changes.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Partial | Self::Completed)
    }
}

/// Status block of a file-listing response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStatus {
    pub state: JobState,
    /// Per-source detail map, present on partial/completed listings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Map<String, serde_json::Value>>,
}

/// Data standard and version a session file conforms to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaInfo {
    pub standard: String,
    pub version: String,
}

/// One entry of a session file listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileListEntry {
    pub name: String,
    /// Last update time of the file, in milliseconds since the epoch.
    ///
    /// This is the value the polling orchestrator compares against its
    /// processed ledger; a strictly greater timestamp means a new version.
    #[serde(rename = "updatedDate")]
    pub updated: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<SchemaInfo>,
}

/// Response of the session file-listing endpoint.
///
/// Invariant: `status.state == Pending` implies `files` is empty; the
/// listing is only populated once the job starts producing data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionFileList {
    pub status: SessionStatus,
    #[serde(rename = "fileList", default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<FileListEntry>,
}

impl SessionFileList {
    /// Whether the listing reports a terminal job state.
    pub fn is_terminal(&self) -> bool {
        self.status.state.is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_state_terminality() {
        assert!(JobState::Completed.is_terminal());
        assert!(JobState::Partial.is_terminal());
        assert!(!JobState::Running.is_terminal());
        assert!(!JobState::Pending.is_terminal());
    }

    #[test]
    fn file_list_round_trips_wire_names() {
        let json = r#"{
            "status": {"state": "running"},
            "fileList": [
                {"name": "a.json", "updatedDate": 1700000000000,
                 "schema": {"standard": "fhir", "version": "4.0"}}
            ]
        }"#;

        let listing: SessionFileList = serde_json::from_str(json).unwrap();
        assert_eq!(listing.status.state, JobState::Running);
        assert_eq!(listing.files.len(), 1);
        assert_eq!(listing.files[0].updated, 1_700_000_000_000);
        assert_eq!(listing.files[0].schema.as_ref().unwrap().standard, "fhir");
    }

    #[test]
    fn pending_listing_has_empty_files() {
        let json = r#"{"status": {"state": "pending"}}"#;
        let listing: SessionFileList = serde_json::from_str(json).unwrap();

        assert_eq!(listing.status.state, JobState::Pending);
        assert!(listing.files.is_empty());
    }

    #[test]
    fn session_ttl_is_none_when_expired() {
        let now = Utc::now();
        let session = Session { key: "k".into(), expiry: now - chrono::Duration::seconds(5) };
        assert!(session.time_to_live(now).is_none());

        let live = Session { key: "k".into(), expiry: now + chrono::Duration::seconds(60) };
        let ttl = live.time_to_live(now).unwrap();
        assert!(ttl >= std::time::Duration::from_secs(59));
    }
}
