use std::time::Duration;
use tokio::time::Instant;

/// Spaces out fetches while the errands service keeps failing
///
/// After `k` consecutive failures the next fetch waits
/// `min(base * 2^k, max)`. Any successful fetch resets the streak.
#[derive(Debug)]
pub(crate) struct FetchBackoff {
    base: Duration,
    max: Duration,
    failures: u32,
    not_before: Option<Instant>,
}

impl FetchBackoff {
    pub(crate) fn new(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max,
            failures: 0,
            not_before: None,
        }
    }

    /// Whether a fetch may be attempted at `now`
    pub(crate) fn ready(&self, now: Instant) -> bool {
        self.not_before.is_none_or(|at| now >= at)
    }

    /// Records a failed fetch and returns the delay before the next attempt
    pub(crate) fn record_failure(&mut self, now: Instant) -> Duration {
        self.failures = self.failures.saturating_add(1);
        let delay = self.current_delay();
        self.not_before = Some(now + delay);
        delay
    }

    pub(crate) fn reset(&mut self) {
        self.failures = 0;
        self.not_before = None;
    }

    pub(crate) fn failures(&self) -> u32 {
        self.failures
    }

    fn current_delay(&self) -> Duration {
        // 2^16 multiples of any sane interval already exceed `max`
        let factor = 1u32 << self.failures.min(16);
        self.base.saturating_mul(factor).min(self.max)
    }
}
