//! # VaultLink Domain
//!
//! Wire/data types and the public error taxonomy shared across the SDK.
//!
//! This crate contains:
//! - Session and file-listing DTOs polled from the Vault API
//! - The structured API error shape and the `VaultError` taxonomy
//! - Token types with expiry helpers
//!
//! ## Architecture Principles
//! - No I/O, no async, no infrastructure dependencies
//! - Everything here serialises cleanly with serde

pub mod errors;
pub mod types;

pub use errors::{Result, VaultError};
pub use types::api_error::ApiError;
pub use types::auth::TokenSet;
pub use types::files::{CompressionKind, FileMetadata};
pub use types::session::{
    FileListEntry, JobState, SchemaInfo, Session, SessionFileList, SessionStatus,
};
