//! Resubscribe loop around [`DepthSubscriber`].

use std::time::Instant;

use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::error::SyncError;
use crate::publish::ViewCallback;
use crate::subscription::{signalled, DepthSubscriber};

/// Keep a book for `symbol` alive until shutdown.
///
/// Every terminal error starts a fresh subscription (new stream, new
/// snapshot, new reconciler). The first retry after a sequence gap is
/// immediate; every other retry waits on the configured backoff. A
/// subscription that stayed up for `stable_after` resets the backoff. A
/// rate-limit answer stretches the wait to at least the requested pause.
///
/// Returns `Ok(())` on shutdown, the error itself when the source rejected
/// the request, or the last error once `max_resubscribes` consecutive
/// attempts have failed.
pub async fn supervise(
    subscriber: DepthSubscriber,
    symbol: String,
    on_update: ViewCallback,
    mut shutdown_rx: watch::Receiver<bool>,
) -> Result<(), SyncError> {
    let config = subscriber.config().clone();
    let metrics = subscriber.metrics().clone();
    let mut backoff = config.resubscribe_backoff();

    loop {
        if *shutdown_rx.borrow() {
            return Ok(());
        }

        let started = Instant::now();
        let handle = subscriber.subscribe_with(&symbol, on_update.clone());

        let result = tokio::select! {
            biased;

            _ = signalled(&mut shutdown_rx) => {
                info!(symbol = %symbol, "Shutdown requested, closing depth subscription");
                return Ok(());
            }

            result = handle.join() => result,
        };

        let err = match result {
            Ok(()) => return Ok(()),
            Err(e) => e,
        };

        if started.elapsed() >= config.stable_after {
            backoff.reset();
        }

        if !err.is_retryable() {
            error!(symbol = %symbol, error = %err, "Depth subscription rejected, not retrying");
            return Err(err);
        }

        if backoff.is_exhausted() {
            error!(
                symbol = %symbol,
                attempts = backoff.attempt(),
                error = %err,
                "Giving up on depth subscription"
            );
            return Err(err);
        }

        if err.retry_immediately() && backoff.attempt() == 0 {
            backoff.skip();
            metrics.inc_resubscribes();
            info!(symbol = %symbol, reason = err.kind(), "Resubscribing from a fresh snapshot");
            continue;
        }

        let Some(mut delay) = backoff.next_delay() else {
            return Err(err);
        };
        if let Some(pause) = err.retry_after() {
            delay = delay.max(pause);
        }
        metrics.inc_resubscribes();
        warn!(
            symbol = %symbol,
            reason = err.kind(),
            attempt = backoff.attempt(),
            delay_ms = delay.as_millis() as u64,
            "Resubscribing after backoff"
        );

        tokio::select! {
            biased;
            _ = signalled(&mut shutdown_rx) => return Ok(()),
            _ = tokio::time::sleep(delay) => {}
        }
    }
}
