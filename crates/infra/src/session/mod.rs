//! Session observation
//!
//! - **[`runner`]**: adapters plugging the API client into the core
//!   orchestrator's ports
//! - **[`observer`]**: the start/stop facade owning the polling task

pub mod observer;
pub mod runner;

pub use observer::SessionObserver;
pub use runner::{ApiFileListSource, ApiSessionSource, FileHandler, PipelineFileProcessor};
