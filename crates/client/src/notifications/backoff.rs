//! Exponential reconnect delays with an attempt cap.

use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    base: Duration,
    cap: Duration,
    max_attempts: u32,
    attempt: u32,
}

impl Backoff {
    pub fn new(base: Duration, cap: Duration, max_attempts: u32) -> Self {
        Self {
            base,
            cap,
            max_attempts,
            attempt: 0,
        }
    }

    /// `min(cap, base * 2^attempt)`, saturating at `cap` on overflow.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        2u32.checked_pow(attempt)
            .and_then(|factor| self.base.checked_mul(factor))
            .map_or(self.cap, |delay| delay.min(self.cap))
    }

    /// Delay before the next attempt, or `None` once the budget is spent.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.attempt >= self.max_attempts {
            return None;
        }
        let delay = self.delay_for(self.attempt);
        self.attempt += 1;
        Some(delay)
    }

    /// Call after a confirmed open.
    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    /// Attempts scheduled since the last reset
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(n: u64) -> Duration {
        Duration::from_secs(n)
    }

    #[test]
    fn delays_double_until_cap() {
        let mut backoff = Backoff::new(secs(1), secs(10), 6);
        let delays: Vec<_> = std::iter::from_fn(|| backoff.next_delay()).collect();
        assert_eq!(
            delays,
            vec![secs(1), secs(2), secs(4), secs(8), secs(10), secs(10)]
        );
        assert_eq!(backoff.next_delay(), None);
    }

    #[test]
    fn reset_restarts_from_base() {
        let mut backoff = Backoff::new(secs(1), secs(30), 5);
        backoff.next_delay();
        backoff.next_delay();
        assert_eq!(backoff.attempt(), 2);

        backoff.reset();
        assert_eq!(backoff.attempt(), 0);
        assert_eq!(backoff.next_delay(), Some(secs(1)));
    }

    #[test]
    fn huge_attempt_saturates_at_cap() {
        let backoff = Backoff::new(secs(1), secs(30), u32::MAX);
        assert_eq!(backoff.delay_for(40), secs(30));
        assert_eq!(backoff.delay_for(u32::MAX), secs(30));
    }

    #[test]
    fn zero_budget_never_schedules() {
        let mut backoff = Backoff::new(secs(1), secs(30), 0);
        assert_eq!(backoff.next_delay(), None);
    }
}
