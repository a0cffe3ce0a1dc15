//! Retry policy constants

use std::time::Duration;

/// Default number of retries after the initial attempt.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Base unit for exponential backoff.
pub const DEFAULT_BACKOFF_BASE: Duration = Duration::from_millis(1000);

/// Upper bound on the random jitter added to each backoff delay.
pub const DEFAULT_JITTER: Duration = Duration::from_millis(100);

/// A `Retry-After` hint above this ceiling is treated as non-retryable.
pub const DEFAULT_MAX_RETRY_AFTER: Duration = Duration::from_secs(60);

/// Cap on the backoff exponent to keep the multiplication from overflowing.
pub const MAX_BACKOFF_EXPONENT: i32 = 16;

/// Bounds accepted by the `max_attempts` setter.
pub const MIN_MAX_ATTEMPTS: u32 = 0;
pub const MAX_MAX_ATTEMPTS: u32 = 100;

/// HTTP status codes eligible for another attempt under the default policy.
pub const RETRYABLE_STATUS_CODES: [u16; 9] = [408, 429, 500, 502, 503, 504, 521, 522, 524];
