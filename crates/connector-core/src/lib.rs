//! Feed abstractions shared by exchange connectors and the depth synchronizer.
//!
//! A subscription is built from two independent sources:
//!
//! - a [`SnapshotFetcher`] that performs one full-depth fetch per call, and
//! - a [`DepthFeed`] that opens a lazy, cancellable [`DepthStream`] of diff events.
//!
//! Neither source retries on its own; retry policy belongs to the caller.

mod config;
mod error;
mod stream;

pub use config::ConnectorConfig;
pub use error::FeedError;
pub use stream::{CancelHandle, DepthStream, DepthStreamSender, FeedItem};

use async_trait::async_trait;
use model::DepthSnapshot;

/// One-shot fetch of the authoritative full-depth snapshot for a symbol.
#[async_trait]
pub trait SnapshotFetcher: Send + Sync {
    /// Performs a single fetch attempt.
    async fn fetch(&self, symbol: &str) -> Result<DepthSnapshot, FeedError>;
}

/// Source of incremental depth events for a symbol.
pub trait DepthFeed: Send + Sync {
    /// Opens a new stream. Delivery starts in the background; the
    /// returned stream ends when the underlying connection drops.
    fn open(&self, symbol: &str) -> DepthStream;
}
