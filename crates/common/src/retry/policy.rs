//! Retry options and the delay decision function

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rand::Rng;

use crate::error::{CommonError, CommonResult};
use crate::retry::constants::{
    DEFAULT_BACKOFF_BASE, DEFAULT_JITTER, DEFAULT_MAX_ATTEMPTS, DEFAULT_MAX_RETRY_AFTER,
    MAX_BACKOFF_EXPONENT, MAX_MAX_ATTEMPTS, RETRYABLE_STATUS_CODES,
};

/// Type alias for the optional delay-calculation override hook.
type DelayOverride = Arc<dyn Fn(&DelayContext) -> Option<Duration> + Send + Sync>;

/// Inputs to a single retry decision.
#[derive(Debug, Clone, Copy)]
pub struct DelayContext {
    /// Number of sends performed so far (the failed one included).
    pub attempts: u32,
    /// Parsed `Retry-After` hint from the failing response, if any.
    pub retry_after: Option<Duration>,
}

/// Outcome of evaluating the policy after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Wait this long, then send a fresh attempt.
    RetryAfter(Duration),
    /// The retry budget is spent; surface the last error.
    Exhausted,
    /// The server asked for a wait beyond the configured ceiling; treat the
    /// error as non-retryable rather than stalling the caller.
    HintExceedsCeiling(Duration),
}

/// Immutable retry configuration for one executor run.
///
/// Invariant: a continuously failing retryable operation performs exactly
/// `max_attempts + 1` sends before [`RetryDecision::Exhausted`] is returned.
#[derive(Clone)]
pub struct RetryOptions {
    max_attempts: u32,
    backoff_base: Duration,
    jitter: Duration,
    max_retry_after: Duration,
    retryable_status_codes: HashSet<u16>,
    calculate_delay: Option<DelayOverride>,
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff_base: DEFAULT_BACKOFF_BASE,
            jitter: DEFAULT_JITTER,
            max_retry_after: DEFAULT_MAX_RETRY_AFTER,
            retryable_status_codes: RETRYABLE_STATUS_CODES.into_iter().collect(),
            calculate_delay: None,
        }
    }
}

impl fmt::Debug for RetryOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryOptions")
            .field("max_attempts", &self.max_attempts)
            .field("backoff_base", &self.backoff_base)
            .field("jitter", &self.jitter)
            .field("max_retry_after", &self.max_retry_after)
            .field("retryable_status_codes", &self.retryable_status_codes)
            .field("calculate_delay", &self.calculate_delay.is_some().then_some("<override>"))
            .finish()
    }
}

impl RetryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of retries allowed after the initial attempt.
    pub fn with_max_attempts(mut self, attempts: u32) -> CommonResult<Self> {
        if attempts > MAX_MAX_ATTEMPTS {
            return Err(CommonError::config(format!(
                "max_attempts must be at most {MAX_MAX_ATTEMPTS}, got {attempts}"
            )));
        }
        self.max_attempts = attempts;
        Ok(self)
    }

    /// Set the base unit for exponential backoff.
    pub fn with_backoff_base(mut self, base: Duration) -> Self {
        self.backoff_base = base;
        self
    }

    /// Set the upper bound of the random jitter added to backoff delays.
    pub fn with_jitter(mut self, jitter: Duration) -> Self {
        self.jitter = jitter;
        self
    }

    /// Set the ceiling above which a `Retry-After` hint is non-retryable.
    pub fn with_max_retry_after(mut self, ceiling: Duration) -> Self {
        self.max_retry_after = ceiling;
        self
    }

    /// Replace the retryable status code set.
    pub fn with_retryable_status_codes(
        mut self,
        codes: impl IntoIterator<Item = u16>,
    ) -> Self {
        self.retryable_status_codes = codes.into_iter().collect();
        self
    }

    /// Install a delay-calculation override. When the hook returns `Some`,
    /// its value is used verbatim; `None` falls through to the default
    /// policy.
    pub fn with_calculate_delay<F>(mut self, hook: F) -> Self
    where
        F: Fn(&DelayContext) -> Option<Duration> + Send + Sync + 'static,
    {
        self.calculate_delay = Some(Arc::new(hook));
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Whether a response status is eligible for another attempt.
    pub fn is_status_retryable(&self, status: u16) -> bool {
        self.retryable_status_codes.contains(&status)
    }

    /// Decide whether (and how long) to wait before the next attempt.
    ///
    /// Order of evaluation: the override hook, the retry budget, the
    /// `Retry-After` hint against its ceiling, then exponential backoff with
    /// jitter. Jitter de-correlates simultaneous retries from independent
    /// clients.
    pub fn evaluate(&self, ctx: &DelayContext) -> RetryDecision {
        if let Some(hook) = &self.calculate_delay {
            if let Some(delay) = hook(ctx) {
                return RetryDecision::RetryAfter(delay);
            }
        }

        if ctx.attempts > self.max_attempts {
            return RetryDecision::Exhausted;
        }

        if let Some(hint) = ctx.retry_after {
            if hint > self.max_retry_after {
                return RetryDecision::HintExceedsCeiling(hint);
            }
            return RetryDecision::RetryAfter(hint);
        }

        RetryDecision::RetryAfter(self.backoff_delay(ctx.attempts))
    }

    /// Exponential backoff: `2^(attempts - 2) * base` plus random jitter.
    fn backoff_delay(&self, attempts: u32) -> Duration {
        let exponent = (attempts as i32 - 2).clamp(-1, MAX_BACKOFF_EXPONENT);
        let factor = 2f64.powi(exponent);
        let base_ms = self.backoff_base.as_millis() as f64;

        let jitter_ms = if self.jitter.is_zero() {
            0u64
        } else {
            rand::thread_rng().gen_range(0..=self.jitter.as_millis() as u64)
        };

        Duration::from_millis((base_ms * factor) as u64 + jitter_ms)
    }
}

/// Parse a `Retry-After` header value into a delay.
///
/// Accepts the integer-seconds form or the HTTP-date form (resolved against
/// the current time, clamped at zero for past dates). Malformed values
/// return `None` and the caller falls back to exponential backoff; a bad
/// hint must never fail the request.
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    let value = value.trim();

    if let Ok(seconds) = value.parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }

    chrono::DateTime::parse_from_rfc2822(value)
        .ok()
        .map(|date| (date.with_timezone(&Utc) - Utc::now()).to_std().unwrap_or(Duration::ZERO))
}
