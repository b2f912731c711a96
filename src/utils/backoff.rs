//! Exponential delay schedules shared by the retry loops.

use std::time::Duration;
use tokio_retry::strategy::ExponentialBackoff;

/// Delays doubling from `base` and capped at `max`, `attempts` items long.
///
/// `ExponentialBackoff::from_millis(2)` yields 2, 4, 8... ms; the factor scales
/// that to `base`, 2 x `base`, 4 x `base`...
pub fn doubling_delays(base: Duration, max: Duration, attempts: usize) -> impl Iterator<Item = Duration> {
    let factor = (base.as_millis() as u64 / 2).max(1);
    ExponentialBackoff::from_millis(2)
        .factor(factor)
        .max_delay(max)
        .take(attempts)
}

/// Delay before retry number `attempt` (zero-based).
pub fn delay_for_attempt(base: Duration, max: Duration, attempt: u32) -> Duration {
    doubling_delays(base, max, attempt as usize + 1)
        .last()
        .unwrap_or(base)
}
