//! Shared utilities: exchange environment, reconnect backoff and logging setup.

mod backoff;
mod environment;

pub use backoff::ExponentialBackoff;
pub use environment::{env_parse, BinanceEnvironment, ParseEnvironmentError};

use tracing_subscriber::EnvFilter;

/// Install the global `tracing` subscriber.
///
/// Honours `RUST_LOG`; falls back to `info` when it is unset or invalid.
/// Calling this more than once is harmless.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
