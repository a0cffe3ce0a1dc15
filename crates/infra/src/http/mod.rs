//! HTTP delivery layer
//!
//! [`executor`] hosts the resilient request executor: a retry/backoff state
//! machine wrapping a single logical network request.

pub mod executor;

pub use executor::{decode_api_error, FnFactory, RequestExecutor, RequestFactory};
