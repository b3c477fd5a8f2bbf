//! Utility functions and helpers.

pub mod http;
pub mod url;

use std::time::Duration;

/// Exponential backoff delay before retry number `attempt` (1-based).
///
/// `base * 2^(attempt - 1)`, capped at `max`.
pub fn backoff_delay(attempt: u32, base: Duration, max: Duration) -> Duration {
    let exponent = attempt.saturating_sub(1).min(31);
    base.saturating_mul(1u32 << exponent).min(max)
}
