use std::sync::Arc;
use std::time::Duration;

use binance_rest::BinanceRestClient;
use connector_binance::BinanceDepthFeed;
use connector_core::ConnectorConfig;
use depth_sync::{supervise, DepthSubscriber, SyncConfig, ViewCallback};
use metrics::create_metrics;
use orderbook::BookView;
use tokio::sync::watch;
use tracing::{debug, error, info};

/// Interval for periodic health status logging.
const HEALTH_LOG_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() {
    common::init_logging();

    let symbols = std::env::args()
        .skip(1)
        .map(|s| s.to_uppercase())
        .collect::<Vec<_>>();

    let symbols = if symbols.is_empty() {
        vec!["BTCUSDT".to_string()]
    } else {
        symbols
    };

    let connector_config = ConnectorConfig::from_env();
    let sync_config = SyncConfig::from_env();

    info!(
        symbols = ?symbols,
        environment = %connector_config.environment,
        speed_ms = connector_config.depth_update_speed_ms,
        snapshot_limit = connector_config.snapshot_limit,
        max_buffered = sync_config.max_buffered_events,
        "Starting depth runner"
    );

    let rest_client = match BinanceRestClient::new(&connector_config) {
        Ok(client) => Arc::new(client),
        Err(e) => {
            error!(error = %e, "Failed to build REST client");
            return;
        }
    };
    let feed = Arc::new(BinanceDepthFeed::new(&connector_config));

    let metrics = create_metrics();
    let subscriber = DepthSubscriber::new(rest_client, feed, sync_config, metrics.clone());

    let (shutdown_tx, _) = watch::channel(false);

    let mut tasks = Vec::with_capacity(symbols.len());
    for symbol in symbols {
        let on_update: ViewCallback = Arc::new(log_top_of_book);
        let shutdown_rx = shutdown_tx.subscribe();
        let subscriber = subscriber.clone();
        tasks.push(tokio::spawn(async move {
            let result = supervise(subscriber, symbol.clone(), on_update, shutdown_rx).await;
            if let Err(e) = result {
                error!(symbol = %symbol, error = %e, "Depth book abandoned");
            }
        }));
    }

    // Spawn ctrl_c handler
    let shutdown_tx_clone = shutdown_tx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl+C, initiating shutdown");
            let _ = shutdown_tx_clone.send(true);
        }
    });

    // Spawn periodic health reporter
    let health_metrics = metrics.clone();
    let mut health_shutdown_rx = shutdown_tx.subscribe();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(HEALTH_LOG_INTERVAL);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let snapshot = health_metrics.snapshot();
                    info!(
                        status = %snapshot.health_status(),
                        applied = snapshot.events_applied,
                        applies_per_sec = format!("{:.1}", snapshot.applies_per_second),
                        gaps = snapshot.sequence_gaps,
                        errors = snapshot.total_errors(),
                        resubscribes = snapshot.resubscribes,
                        "Health check"
                    );
                }
                _ = health_shutdown_rx.changed() => {
                    if *health_shutdown_rx.borrow() {
                        break;
                    }
                }
            }
        }
    });

    for task in tasks {
        let _ = task.await;
    }

    let snapshot = metrics.snapshot();
    println!("\n{}", snapshot);

    info!("Shutdown complete");
}

fn log_top_of_book(view: &BookView) {
    debug!(
        symbol = %view.symbol,
        last_sequence = view.last_sequence,
        best_bid = ?view.best_bid.map(|l| l.price),
        best_ask = ?view.best_ask.map(|l| l.price),
        spread = ?view.spread(),
        imbalance = ?view.imbalance(),
        "Book updated"
    );
}
