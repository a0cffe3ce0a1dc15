//! # VaultLink Infrastructure
//!
//! I/O implementations of the core ports.
//!
//! This crate contains:
//! - The resilient request executor (retry/backoff state machine over HTTP)
//! - Thin Vault API endpoints and the auth/token-exchange flow
//! - The session file pipeline (decrypt, inflate, decode, parse)
//! - The session observer facade wrapping the polling orchestrator
//!
//! ## Architecture
//! - Implements traits defined in `vaultlink-core`
//! - Depends on `vaultlink-common` and `vaultlink-domain`
//! - Contains all "impure" code (network, streams, config loading)

pub mod api;
pub mod config;
pub mod errors;
pub mod files;
pub mod http;
pub mod session;

pub use api::auth::{AuthConfig, AuthSession, CachingVerifier};
pub use api::client::ApiClient;
pub use config::SdkConfig;
pub use errors::InfraError;
pub use files::{ByteStream, SessionFile};
pub use http::executor::{FnFactory, RequestExecutor, RequestFactory};
pub use session::observer::SessionObserver;
pub use session::runner::FileHandler;
