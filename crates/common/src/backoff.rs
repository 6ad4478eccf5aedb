use rand::Rng;
use std::time::Duration;

/// Exponential backoff with jitter and an optional attempt budget.
///
/// Delay for attempt `n` is `min(max_delay, base * 2^n)` plus up to
/// `jitter_factor` of that value in either direction.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    base: Duration,
    max_delay: Duration,
    jitter_factor: f64,
    max_attempts: Option<u32>,
    attempt: u32,
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self::new(Duration::from_millis(500), Duration::from_secs(30), 0.1)
    }
}

impl ExponentialBackoff {
    /// Create an unbounded backoff. Negative jitter is clamped to 0.
    pub fn new(base: Duration, max_delay: Duration, jitter_factor: f64) -> Self {
        Self {
            base,
            max_delay,
            jitter_factor: jitter_factor.clamp(0.0, 1.0),
            max_attempts: None,
            attempt: 0,
        }
    }

    /// Stop handing out delays after `max_attempts` consecutive attempts.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    /// Next delay, or `None` once the attempt budget is spent.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.is_exhausted() {
            return None;
        }

        let exp_delay = self.base.saturating_mul(2u32.saturating_pow(self.attempt));
        let capped = exp_delay.min(self.max_delay).as_secs_f64();

        let jitter_range = capped * self.jitter_factor;
        let jitter = if jitter_range > 0.0 {
            rand::thread_rng().gen_range(-jitter_range..=jitter_range)
        } else {
            0.0
        };

        self.attempt = self.attempt.saturating_add(1);
        Some(Duration::from_secs_f64((capped + jitter).max(0.0)))
    }

    /// Record an attempt that is retried without waiting.
    pub fn skip(&mut self) {
        self.attempt = self.attempt.saturating_add(1);
    }

    /// Returns true when no further attempts are allowed.
    pub fn is_exhausted(&self) -> bool {
        self.max_attempts.is_some_and(|max| self.attempt >= max)
    }

    /// Reset the attempt counter after a healthy run.
    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    /// Number of attempts handed out since the last reset.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_jitter(base_ms: u64, max_ms: u64) -> ExponentialBackoff {
        ExponentialBackoff::new(
            Duration::from_millis(base_ms),
            Duration::from_millis(max_ms),
            0.0,
        )
    }

    #[test]
    fn test_backoff_doubles_until_cap() {
        let mut backoff = no_jitter(100, 500);

        let delays: Vec<_> = (0..5).map(|_| backoff.next_delay().unwrap()).collect();
        assert_eq!(
            delays,
            vec![
                Duration::from_millis(100),
                Duration::from_millis(200),
                Duration::from_millis(400),
                Duration::from_millis(500),
                Duration::from_millis(500),
            ]
        );
    }

    #[test]
    fn test_backoff_budget_exhausts() {
        let mut backoff = no_jitter(100, 1000).with_max_attempts(2);

        assert!(backoff.next_delay().is_some());
        backoff.skip();
        assert!(backoff.is_exhausted());
        assert!(backoff.next_delay().is_none());

        backoff.reset();
        assert_eq!(backoff.attempt(), 0);
        assert_eq!(backoff.next_delay(), Some(Duration::from_millis(100)));
    }

    #[test]
    fn test_backoff_jitter_stays_in_range() {
        let mut backoff =
            ExponentialBackoff::new(Duration::from_secs(10), Duration::from_secs(60), 0.2);

        let secs = backoff.next_delay().unwrap().as_secs_f64();
        assert!((8.0..=12.0).contains(&secs), "delay was {}", secs);
    }

    #[test]
    fn test_negative_jitter_clamped() {
        let mut backoff =
            ExponentialBackoff::new(Duration::from_secs(1), Duration::from_secs(60), -0.5);
        assert_eq!(backoff.next_delay(), Some(Duration::from_secs(1)));
    }
}
