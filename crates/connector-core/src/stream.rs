//! Cancellable depth event stream.

use std::sync::Arc;

use model::DepthUpdate;
use tokio::sync::{mpsc, watch};

use crate::error::FeedError;

/// A single delivery from a depth feed.
pub type FeedItem = Result<DepthUpdate, FeedError>;

/// Idempotent cancellation switch shared between a stream and its producer.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelHandle {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Stop delivery. Safe to call any number of times.
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

impl Default for CancelHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// Producer half of a [`DepthStream`], held by the connector task.
#[derive(Debug)]
pub struct DepthStreamSender {
    tx: mpsc::Sender<FeedItem>,
    cancelled: watch::Receiver<bool>,
}

impl DepthStreamSender {
    /// Deliver an item. Returns `false` once the consumer is gone or has
    /// cancelled, which tells the producer to release its connection.
    pub async fn send(&self, item: FeedItem) -> bool {
        if self.is_cancelled() {
            return false;
        }
        self.tx.send(item).await.is_ok()
    }

    pub fn is_cancelled(&self) -> bool {
        *self.cancelled.borrow() || self.tx.is_closed()
    }

    /// Resolves when the consumer cancels or drops the stream.
    pub async fn cancelled(&mut self) {
        let Self { tx, cancelled } = self;
        tokio::select! {
            _ = cancel_requested(cancelled) => {}
            _ = tx.closed() => {}
        }
    }
}

async fn cancel_requested(rx: &mut watch::Receiver<bool>) {
    loop {
        let cancelled = *rx.borrow_and_update();
        if cancelled || rx.changed().await.is_err() {
            return;
        }
    }
}

/// Lazy, arrival-ordered sequence of depth events for one symbol.
///
/// Ends (`None`) when the producer disconnects or after [`cancel`](Self::cancel).
/// Dropping the stream cancels it.
#[derive(Debug)]
pub struct DepthStream {
    rx: mpsc::Receiver<FeedItem>,
    cancel: CancelHandle,
}

impl DepthStream {
    /// Create a connected producer/consumer pair.
    pub fn channel(capacity: usize) -> (DepthStreamSender, DepthStream) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let cancel = CancelHandle::new();
        let sender = DepthStreamSender {
            tx,
            cancelled: cancel.subscribe(),
        };
        (sender, DepthStream { rx, cancel })
    }

    /// Next delivered item, or `None` once the stream is over.
    pub async fn next(&mut self) -> Option<FeedItem> {
        if self.cancel.is_cancelled() {
            return None;
        }
        let item = self.rx.recv().await?;
        if self.cancel.is_cancelled() {
            return None;
        }
        Some(item)
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Terminate delivery and release the producer.
    pub fn cancel(&mut self) {
        self.cancel.cancel();
        self.rx.close();
    }
}

impl Drop for DepthStream {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
