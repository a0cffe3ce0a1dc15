//! # VaultLink Core
//!
//! Pure orchestration layer - no infrastructure dependencies.
//!
//! This crate contains:
//! - Port/adapter interfaces (traits) for the external collaborators
//! - The session polling state machine and its processed-file ledger
//!
//! ## Architecture Principles
//! - Only depends on `vaultlink-common` and `vaultlink-domain`
//! - No HTTP or crypto code; all external effects via traits
//! - State machines are explicit enums so transitions are testable in
//!   isolation

pub mod ports;
pub mod session;

pub use ports::{AccessTokenProvider, FileListSource, FileProcessor, RequestSigner, SessionSource};
pub use session::poller::{PollerConfig, SessionOutcome, SessionPoller, SessionSnapshot};
pub use session::tracker::ProcessedFiles;
