//! Cancellable delay primitive
//!
//! Every suspension point in the SDK waits through this function so that
//! cancellation is observed promptly and uniformly. The timer is dropped on
//! both exits; nothing keeps ticking after settlement.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::error::{CommonError, CommonResult};

/// Wait for `duration`, aborting early if `cancel` fires.
///
/// A token that is already cancelled rejects immediately without starting
/// the timer. Cancellation mid-wait resolves within the scheduler's next
/// poll, not after the remaining delay.
///
/// # Errors
///
/// Returns [`CommonError::Cancelled`] when the token fires before the
/// duration elapses.
pub async fn delay(duration: Duration, cancel: &CancellationToken) -> CommonResult<()> {
    if cancel.is_cancelled() {
        return Err(CommonError::cancelled("delay aborted before start"));
    }

    tokio::select! {
        _ = cancel.cancelled() => Err(CommonError::cancelled("delay interrupted")),
        _ = tokio::time::sleep(duration) => Ok(()),
    }
}
