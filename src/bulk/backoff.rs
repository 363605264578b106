use std::time::Duration;

/// Exponential retry schedule for failed commits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    retries: u32,
}

impl Backoff {
    pub fn exponential(initial: Duration, max: Duration, retries: u32) -> Self {
        Self {
            initial,
            max: max.max(initial),
            retries,
        }
    }

    /// Never retry; a failed commit is reported straight away.
    pub fn none() -> Self {
        Self {
            initial: Duration::ZERO,
            max: Duration::ZERO,
            retries: 0,
        }
    }

    pub fn retries(&self) -> u32 {
        self.retries
    }

    /// Delay before retry number `attempt` (1-based), or `None` once exhausted.
    pub fn delay(&self, attempt: u32) -> Option<Duration> {
        if attempt == 0 || attempt > self.retries {
            return None;
        }
        let exp = attempt - 1;
        let delay = self.initial.saturating_mul(2u32.saturating_pow(exp));
        Some(delay.min(self.max))
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::exponential(Duration::from_millis(200), Duration::from_secs(10), 3)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doubles_until_capped() {
        let backoff = Backoff::exponential(Duration::from_millis(100), Duration::from_millis(350), 4);
        assert_eq!(backoff.delay(1), Some(Duration::from_millis(100)));
        assert_eq!(backoff.delay(2), Some(Duration::from_millis(200)));
        assert_eq!(backoff.delay(3), Some(Duration::from_millis(350)));
        assert_eq!(backoff.delay(4), Some(Duration::from_millis(350)));
        assert_eq!(backoff.delay(5), None);
    }

    #[test]
    fn none_never_retries() {
        assert_eq!(Backoff::none().delay(1), None);
    }
}
