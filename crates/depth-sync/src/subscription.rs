//! Subscription driver: one task per symbol owning one reconciler.

use std::sync::Arc;

use connector_core::{CancelHandle, DepthFeed, DepthStream, SnapshotFetcher};
use metrics::SharedMetrics;
use orderbook::BookView;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::config::SyncConfig;
use crate::error::SyncError;
use crate::publish::{ViewCallback, ViewPublisher};
use crate::reconciler::{BookReconciler, EventOutcome, SnapshotOutcome, SyncState};

/// Starts depth subscriptions from a snapshot source and a diff feed.
///
/// Cheap to clone; every clone shares the same sources and metrics.
#[derive(Clone)]
pub struct DepthSubscriber {
    fetcher: Arc<dyn SnapshotFetcher>,
    feed: Arc<dyn DepthFeed>,
    config: SyncConfig,
    metrics: SharedMetrics,
}

impl DepthSubscriber {
    pub fn new(
        fetcher: Arc<dyn SnapshotFetcher>,
        feed: Arc<dyn DepthFeed>,
        config: SyncConfig,
        metrics: SharedMetrics,
    ) -> Self {
        Self {
            fetcher,
            feed,
            config,
            metrics,
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn metrics(&self) -> &SharedMetrics {
        &self.metrics
    }

    /// Open the diff stream and start reconciling. The snapshot is requested
    /// once the first event has arrived.
    ///
    /// Must be called from within a tokio runtime.
    pub fn subscribe(&self, symbol: &str) -> SubscriptionHandle {
        self.start(symbol, None)
    }

    /// Like [`subscribe`](Self::subscribe) with `callback` registered before
    /// the first view can be published.
    pub fn subscribe_with(&self, symbol: &str, callback: ViewCallback) -> SubscriptionHandle {
        self.start(symbol, Some(callback))
    }

    fn start(&self, symbol: &str, callback: Option<ViewCallback>) -> SubscriptionHandle {
        let symbol = symbol.to_uppercase();
        let reconciler = BookReconciler::new(symbol.clone(), self.config.max_buffered_events);
        let publisher = reconciler.publisher();
        if let Some(callback) = callback {
            publisher.subscribe(callback);
        }

        let stream = self.feed.open(&symbol);
        let stream_cancel = stream.cancel_handle();
        let (close_tx, close_rx) = watch::channel(false);

        info!(
            symbol = %symbol,
            max_buffered = self.config.max_buffered_events,
            "Starting depth subscription"
        );

        let task = tokio::spawn(drive(
            reconciler,
            stream,
            Arc::clone(&self.fetcher),
            Arc::clone(&self.metrics),
            close_rx,
        ));

        SubscriptionHandle {
            symbol,
            publisher,
            close_tx,
            stream_cancel,
            task: Some(task),
        }
    }
}

impl std::fmt::Debug for DepthSubscriber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DepthSubscriber")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Caller-side handle of a running subscription.
///
/// Dropping the handle closes the subscription.
pub struct SubscriptionHandle {
    symbol: String,
    publisher: ViewPublisher,
    close_tx: watch::Sender<bool>,
    stream_cancel: CancelHandle,
    task: Option<JoinHandle<Result<(), SyncError>>>,
}

impl SubscriptionHandle {
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Latest published view. Empty until the snapshot has been applied.
    pub fn current_view(&self) -> Arc<BookView> {
        self.publisher.current_view()
    }

    /// Register a callback run after every successful apply.
    pub fn on_update<F>(&self, callback: F)
    where
        F: Fn(&BookView) + Send + Sync + 'static,
    {
        self.publisher.subscribe(Arc::new(callback));
    }

    pub fn status(&self) -> SyncState {
        self.publisher.status()
    }

    /// Stop the subscription. Cancels the stream at once and abandons any
    /// in-flight snapshot. Idempotent.
    pub fn close(&self) {
        self.close_tx.send_replace(true);
        self.stream_cancel.cancel();
    }

    /// Wait for the terminal outcome. `Ok(())` means the subscription was
    /// closed by the caller; any error is the reason it stopped on its own.
    pub async fn join(mut self) -> Result<(), SyncError> {
        let Some(task) = self.task.take() else {
            return Ok(());
        };
        match task.await {
            Ok(result) => result,
            Err(e) => Err(SyncError::Transport(format!(
                "subscription task failed: {e}"
            ))),
        }
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for SubscriptionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionHandle")
            .field("symbol", &self.symbol)
            .field("status", &self.status())
            .finish()
    }
}

/// Resolves once `rx` reads `true` or its sender is gone.
pub(crate) async fn signalled(rx: &mut watch::Receiver<bool>) {
    loop {
        let set = *rx.borrow_and_update();
        if set || rx.changed().await.is_err() {
            return;
        }
    }
}

/// Serialized consumer for one subscription.
///
/// Multiplexes the close signal, the snapshot future and the diff stream;
/// every reconciler call happens on this task. The snapshot is not requested
/// until the first event has been buffered, so the stream is known to be
/// live when the snapshot is taken.
async fn drive(
    mut reconciler: BookReconciler,
    mut stream: DepthStream,
    fetcher: Arc<dyn SnapshotFetcher>,
    metrics: SharedMetrics,
    mut close_rx: watch::Receiver<bool>,
) -> Result<(), SyncError> {
    let symbol = reconciler.symbol().to_string();

    let snapshot = {
        let symbol = symbol.clone();
        async move { fetcher.fetch(&symbol).await }
    };
    tokio::pin!(snapshot);
    let mut snapshot_pending = true;
    let mut stream_live = false;

    let result = loop {
        tokio::select! {
            biased;

            _ = signalled(&mut close_rx) => {
                info!(symbol = %symbol, "Depth subscription closed");
                break Ok(());
            }

            fetched = &mut snapshot, if snapshot_pending && stream_live => {
                snapshot_pending = false;
                let snapshot = match fetched {
                    Ok(snapshot) => snapshot,
                    Err(e) => break Err(reconciler.fail(e.into())),
                };
                match reconciler.on_snapshot(snapshot) {
                    Ok(SnapshotOutcome::Synced { replayed, discarded, .. }) => {
                        metrics.inc_snapshots_applied();
                        metrics.add_events_applied(replayed as u64);
                        metrics.add_events_stale(discarded as u64);
                    }
                    Ok(SnapshotOutcome::Ignored) => {}
                    Err(e) => break Err(e),
                }
            }

            item = stream.next() => {
                let event = match item {
                    Some(Ok(event)) => event,
                    Some(Err(e)) => break Err(reconciler.fail(e.into())),
                    None if *close_rx.borrow() => break Ok(()),
                    None => {
                        break Err(reconciler.fail(SyncError::Transport(
                            "depth stream ended".to_string(),
                        )))
                    }
                };
                metrics.inc_events_received();
                match reconciler.on_event(event) {
                    Ok(EventOutcome::Buffered) => {
                        metrics.inc_events_buffered();
                        if !stream_live {
                            stream_live = true;
                            debug!(
                                symbol = %symbol,
                                "First depth event buffered, requesting snapshot"
                            );
                        }
                    }
                    Ok(EventOutcome::Applied) => metrics.add_events_applied(1),
                    Ok(EventOutcome::Stale) => metrics.add_events_stale(1),
                    Ok(EventOutcome::Ignored) => {}
                    Err(e) => break Err(e),
                }
            }
        }
    };

    stream.cancel();
    reconciler.close();

    if let Err(e) = &result {
        record_failure(&metrics, e);
    }
    debug!(
        symbol = %symbol,
        last_sequence = reconciler.last_sequence(),
        "Depth subscription task finished"
    );

    result
}

fn record_failure(metrics: &SharedMetrics, err: &SyncError) {
    match err {
        SyncError::Transport(_) | SyncError::RateLimited { .. } | SyncError::Rejected(_) => {
            metrics.inc_transport_errors()
        }
        SyncError::Decode(_) => metrics.inc_decode_errors(),
        SyncError::SequenceGap { .. } => metrics.inc_sequence_gaps(),
        SyncError::BufferOverflow { .. } => metrics.inc_buffer_overflows(),
    }
}
