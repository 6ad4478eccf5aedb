use std::time::Duration;

use common::{env_parse, ExponentialBackoff};

/// Default cap on events buffered while the snapshot is in flight.
pub const DEFAULT_MAX_BUFFERED_EVENTS: usize = 5_000;

/// Reconciler and resubscribe settings.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Events held before the snapshot lands; one more is a `BufferOverflow`.
    pub max_buffered_events: usize,
    /// Consecutive failed subscriptions tolerated by the supervisor.
    pub max_resubscribes: u32,
    /// First resubscribe delay; doubles per consecutive failure.
    pub resubscribe_base_delay: Duration,
    /// Upper bound on the resubscribe delay.
    pub resubscribe_max_delay: Duration,
    /// A subscription that lived this long resets the backoff.
    pub stable_after: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_buffered_events: DEFAULT_MAX_BUFFERED_EVENTS,
            max_resubscribes: 10,
            resubscribe_base_delay: Duration::from_millis(500),
            resubscribe_max_delay: Duration::from_secs(30),
            stable_after: Duration::from_secs(60),
        }
    }
}

impl SyncConfig {
    /// Reads `DEPTH_MAX_BUFFERED_EVENTS` and `DEPTH_MAX_RESUBSCRIBES`,
    /// keeping defaults for anything unset or unparsable.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(cap) = env_parse::<usize>("DEPTH_MAX_BUFFERED_EVENTS") {
            config.max_buffered_events = cap.max(1);
        }
        if let Some(max) = env_parse("DEPTH_MAX_RESUBSCRIBES") {
            config.max_resubscribes = max;
        }

        config
    }

    pub(crate) fn resubscribe_backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff::new(
            self.resubscribe_base_delay,
            self.resubscribe_max_delay,
            0.1,
        )
        .with_max_attempts(self.max_resubscribes)
    }
}
