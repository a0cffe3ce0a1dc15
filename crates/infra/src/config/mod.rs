//! SDK configuration
//!
//! Defaults are production values; every knob can be overridden through
//! `VAULTLINK_*` environment variables. Invalid override values fail the
//! load rather than being silently ignored.
//!
//! ## Environment Variables
//! - `VAULTLINK_BASE_URL`: API base URL
//! - `VAULTLINK_TIMEOUT_SECONDS`: per-request timeout
//! - `VAULTLINK_MAX_ATTEMPTS`: retries after the initial attempt
//! - `VAULTLINK_MAX_RETRY_AFTER_SECONDS`: `Retry-After` ceiling
//! - `VAULTLINK_REFRESH_THRESHOLD_SECONDS`: refresh tokens this many
//!   seconds before expiry
//! - `VAULTLINK_SESSION_CACHE_CAPACITY`: max cached session keys

use std::time::Duration;

use serde::{Deserialize, Serialize};
use vaultlink_domain::{Result, VaultError};

/// Configuration for the VaultLink SDK.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SdkConfig {
    /// Base URL of the Vault API.
    pub base_url: String,
    /// Per-request timeout in seconds.
    pub timeout_seconds: u64,
    /// Number of retries after the initial attempt.
    pub max_attempts: u32,
    /// Ceiling for honoured `Retry-After` hints, in seconds.
    pub max_retry_after_seconds: u64,
    /// Refresh access tokens this many seconds before expiry.
    pub refresh_threshold_seconds: i64,
    /// Maximum number of cached session keys.
    pub session_cache_capacity: u64,
}

impl Default for SdkConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.vaultlink.example/v1".to_string(),
            timeout_seconds: 30,
            max_attempts: 3,
            max_retry_after_seconds: 60,
            refresh_threshold_seconds: 300,
            session_cache_capacity: 100,
        }
    }
}

impl SdkConfig {
    /// Load configuration: defaults overridden by environment variables.
    ///
    /// # Errors
    /// Returns `VaultError::Config` when an override is present but fails
    /// to parse.
    pub fn load() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(value) = std::env::var("VAULTLINK_BASE_URL") {
            config.base_url = value;
        }
        if let Some(value) = env_parsed::<u64>("VAULTLINK_TIMEOUT_SECONDS")? {
            config.timeout_seconds = value;
        }
        if let Some(value) = env_parsed::<u32>("VAULTLINK_MAX_ATTEMPTS")? {
            config.max_attempts = value;
        }
        if let Some(value) = env_parsed::<u64>("VAULTLINK_MAX_RETRY_AFTER_SECONDS")? {
            config.max_retry_after_seconds = value;
        }
        if let Some(value) = env_parsed::<i64>("VAULTLINK_REFRESH_THRESHOLD_SECONDS")? {
            config.refresh_threshold_seconds = value;
        }
        if let Some(value) = env_parsed::<u64>("VAULTLINK_SESSION_CACHE_CAPACITY")? {
            config.session_cache_capacity = value;
        }

        tracing::debug!(base_url = %config.base_url, "SDK configuration loaded");
        Ok(config)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn max_retry_after(&self) -> Duration {
        Duration::from_secs(self.max_retry_after_seconds)
    }

    /// Retry options derived from this configuration.
    ///
    /// # Errors
    /// Returns `VaultError::Config` when `max_attempts` is out of range.
    pub fn retry_options(&self) -> Result<vaultlink_common::retry::RetryOptions> {
        Ok(vaultlink_common::retry::RetryOptions::new()
            .with_max_attempts(self.max_attempts)
            .map_err(crate::errors::from_common)?
            .with_max_retry_after(self.max_retry_after()))
    }
}

fn env_parsed<T: std::str::FromStr>(name: &str) -> Result<Option<T>>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(value) => value
            .parse::<T>()
            .map(Some)
            .map_err(|e| VaultError::Config(format!("invalid {name}: {e}"))),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = SdkConfig::default();

        assert_eq!(config.timeout(), Duration::from_secs(30));
        assert_eq!(config.max_retry_after(), Duration::from_secs(60));
        assert!(config.retry_options().is_ok());
    }

    #[test]
    fn retry_options_carry_the_configured_budget() {
        let config = SdkConfig { max_attempts: 7, ..Default::default() };
        let options = config.retry_options().unwrap();

        assert_eq!(options.max_attempts(), 7);
    }
}
