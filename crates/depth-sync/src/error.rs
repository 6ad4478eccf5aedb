//! Terminal subscription errors.

use std::time::Duration;

use connector_core::FeedError;
use thiserror::Error;

/// Conditions that end a subscription.
///
/// Every variant is terminal: the reconciler moves to `Closed` and the
/// caller must start over with a fresh snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    /// Connection or HTTP failure, including a stream that ended early.
    #[error("transport error: {0}")]
    Transport(String),

    /// The snapshot source asked for a pause before the next request.
    #[error("rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    /// The snapshot source refused the request outright; resubscribing
    /// cannot succeed.
    #[error("request rejected: {0}")]
    Rejected(String),

    /// Malformed payload from either source.
    #[error("decode error: {0}")]
    Decode(String),

    /// The next event does not continue from the watermark.
    #[error("sequence gap: expected update {expected}, got range [{first}, {last}]")]
    SequenceGap { expected: u64, first: u64, last: u64 },

    /// The snapshot took too long and the pre-snapshot buffer filled up.
    #[error("buffer overflow: more than {capacity} events buffered before snapshot")]
    BufferOverflow { capacity: usize },
}

impl SyncError {
    /// Short label used in structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Transport(_) => "transport",
            Self::RateLimited { .. } => "rate_limited",
            Self::Rejected(_) => "rejected",
            Self::Decode(_) => "decode",
            Self::SequenceGap { .. } => "sequence_gap",
            Self::BufferOverflow { .. } => "buffer_overflow",
        }
    }

    /// Whether a resubscribe may be attempted without waiting first.
    ///
    /// A gap is a normal consequence of a dropped packet and a fresh
    /// snapshot usually fixes it; the other kinds point at an upstream
    /// problem that deserves a backoff.
    pub fn retry_immediately(&self) -> bool {
        matches!(self, Self::SequenceGap { .. })
    }

    /// Whether a fresh subscription can ever succeed.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Rejected(_))
    }

    /// Minimum wait requested by the source before the next attempt.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after_ms } => Some(Duration::from_millis(*retry_after_ms)),
            _ => None,
        }
    }
}

impl From<FeedError> for SyncError {
    fn from(err: FeedError) -> Self {
        match err {
            FeedError::Transport(msg) => Self::Transport(msg),
            FeedError::Decode(msg) => Self::Decode(msg),
            FeedError::RateLimited { retry_after_ms } => Self::RateLimited { retry_after_ms },
            FeedError::Rejected(msg) => Self::Rejected(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feed_error_conversion_keeps_category() {
        assert_eq!(
            SyncError::from(FeedError::Transport("reset".into())),
            SyncError::Transport("reset".into())
        );
        assert_eq!(
            SyncError::from(FeedError::Decode("bad".into())).kind(),
            "decode"
        );
    }

    #[test]
    fn test_retry_hints_carried_from_feed() {
        let limited = SyncError::from(FeedError::RateLimited {
            retry_after_ms: 2_500,
        });
        assert_eq!(limited.retry_after(), Some(Duration::from_millis(2_500)));
        assert!(limited.is_retryable());
        assert_eq!(limited.kind(), "rate_limited");

        let rejected = SyncError::from(FeedError::Rejected("invalid symbol".into()));
        assert!(!rejected.is_retryable());
        assert_eq!(rejected.retry_after(), None);
        assert!(SyncError::Transport("reset".into()).is_retryable());
    }

    #[test]
    fn test_only_gaps_retry_immediately() {
        let gap = SyncError::SequenceGap {
            expected: 6,
            first: 7,
            last: 9,
        };
        assert!(gap.retry_immediately());
        assert!(!SyncError::BufferOverflow { capacity: 1 }.retry_immediately());
        assert_eq!(
            gap.to_string(),
            "sequence gap: expected update 6, got range [7, 9]"
        );
    }
}
