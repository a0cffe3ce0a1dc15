//! Thin Vault API endpoints
//!
//! Each endpoint is a simple request/response call; all delivery runs
//! through the resilient request executor. [`auth`] hosts the token
//! exchange and the refresh decision rule.

pub mod auth;
pub mod client;

pub use auth::{AuthConfig, AuthSession, CachingVerifier};
pub use client::{ApiClient, ApiClientBuilder};
