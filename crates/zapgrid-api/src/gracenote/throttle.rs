//! Fixed-delay request throttle.

use std::time::Duration;

/// Default extra pause added between retry attempts.
const DEFAULT_BACKOFF_STEP: Duration = Duration::from_secs(1);

/// Fixed-delay throttle.
///
/// Sleeps the configured delay before every attempt and
/// `delay + backoff_step` between retry attempts. There is no adaptive
/// or exponential backoff.
#[derive(Debug, Clone, Copy)]
pub struct Throttle {
    /// Pause before every attempt.
    delay: Duration,
    /// Extra pause between retries.
    backoff_step: Duration,
}

impl Throttle {
    /// Creates a throttle with the given delay and retry backoff step.
    pub(crate) const fn new(delay: Duration, backoff_step: Duration) -> Self {
        Self {
            delay,
            backoff_step,
        }
    }

    /// Creates a throttle with the default 1s backoff step.
    pub(crate) const fn with_delay(delay: Duration) -> Self {
        Self::new(delay, DEFAULT_BACKOFF_STEP)
    }

    /// Pause taken before an attempt.
    pub(crate) const fn delay(&self) -> Duration {
        self.delay
    }

    /// Pause taken between two attempts.
    pub(crate) const fn backoff(&self) -> Duration {
        self.delay.saturating_add(self.backoff_step)
    }

    /// Waits before issuing an attempt.
    pub async fn pause(&self) {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
    }

    /// Waits between a failed attempt and the next one.
    pub async fn pause_before_retry(&self) {
        let backoff = self.backoff();
        if !backoff.is_zero() {
            tokio::time::sleep(backoff).await;
        }
    }
}
