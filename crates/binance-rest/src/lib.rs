//! Binance REST API client.
//!
//! Provides the depth snapshot source used to seed local order books:
//!
//! ```rust,ignore
//! use binance_rest::BinanceRestClient;
//! use connector_core::{ConnectorConfig, SnapshotFetcher};
//!
//! let client = BinanceRestClient::new(&ConnectorConfig::from_env())?;
//! let snapshot = client.fetch("BTCUSDT").await?;
//! ```

mod client;
mod error;
mod responses;

pub use client::BinanceRestClient;
pub use error::BinanceRestError;
pub use responses::DepthSnapshotResponse;
