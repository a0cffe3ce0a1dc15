//! Per-file metadata types for downloaded session files

use serde::{Deserialize, Serialize};

/// Compression applied to a session file's plaintext before sealing.
///
/// Absent compression means the decrypted bytes are the payload as-is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionKind {
    Gzip,
    Brotli,
}

/// Metadata delivered alongside a downloaded session file.
///
/// Arrives base64-JSON-encoded in the `X-File-Metadata` response header of
/// the file-fetch endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compression: Option<CompressionKind>,
    /// Source-specific descriptor (mime type, account, object counts...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compression_uses_lowercase_tags() {
        assert_eq!(serde_json::to_string(&CompressionKind::Gzip).unwrap(), "\"gzip\"");
        assert_eq!(serde_json::to_string(&CompressionKind::Brotli).unwrap(), "\"brotli\"");

        let parsed: CompressionKind = serde_json::from_str("\"brotli\"").unwrap();
        assert_eq!(parsed, CompressionKind::Brotli);
    }

    #[test]
    fn unknown_compression_tag_is_rejected() {
        let parsed: std::result::Result<CompressionKind, _> = serde_json::from_str("\"zstd\"");
        assert!(parsed.is_err());
    }

    #[test]
    fn metadata_defaults_to_empty() {
        let meta: FileMetadata = serde_json::from_str("{}").unwrap();
        assert!(meta.compression.is_none());
        assert!(meta.metadata.is_none());
    }
}
