//! Session polling orchestration
//!
//! - **[`tracker`]**: processed-file ledger and ready-file selection
//! - **[`poller`]**: the polling state machine driving list-and-process
//!   cycles until the remote job completes

pub mod poller;
pub mod tracker;
