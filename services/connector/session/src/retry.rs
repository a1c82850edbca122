//! Delay between connection attempts.

use std::time::Duration;

/// How long to wait before the next candidate after a failed attempt
///
/// Resolution retries immediately by default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RetryDelay {
    /// No delay
    #[default]
    Immediate,
    /// Same delay before every retry
    Fixed(Duration),
    /// Doubling delay starting at `initial`, capped at `max`
    Exponential {
        /// Delay before the first retry
        initial: Duration,
        /// Upper bound
        max: Duration,
    },
}

impl RetryDelay {
    /// Delay before retry number `retry` (1 for the first retry)
    pub fn delay_for(&self, retry: u32) -> Duration {
        match *self {
            RetryDelay::Immediate => Duration::ZERO,
            RetryDelay::Fixed(delay) => delay,
            RetryDelay::Exponential { initial, max } => {
                let factor = 2u32.saturating_pow(retry.saturating_sub(1));
                initial.saturating_mul(factor).min(max)
            }
        }
    }
}
