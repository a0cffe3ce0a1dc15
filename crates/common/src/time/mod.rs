//! Time utilities and abstractions
//!
//! - **[`clock`]**: trait-based clock with a mock implementation for
//!   deterministic tests
//! - **[`delay`]**: cancellable delay primitive used at every suspension
//!   point in the SDK

pub mod clock;
pub mod delay;

pub use clock::{Clock, MockClock, SystemClock};
pub use delay::delay;
