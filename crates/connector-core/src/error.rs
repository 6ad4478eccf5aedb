use thiserror::Error;

/// Failures raised by snapshot fetchers and depth feeds.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FeedError {
    /// Connection, HTTP status or timeout failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// Payload could not be decoded into the expected shape.
    #[error("decode error: {0}")]
    Decode(String),

    /// The server asked the client to back off for at least `retry_after_ms`.
    #[error("rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    /// The request was refused and repeating it will not help
    /// (unknown symbol, invalid parameter).
    #[error("request rejected: {0}")]
    Rejected(String),
}

impl FeedError {
    pub fn is_decode(&self) -> bool {
        matches!(self, Self::Decode(_))
    }
}
