//! Binance REST client for depth snapshots.

use std::time::Duration;

use async_trait::async_trait;
use connector_core::{ConnectorConfig, FeedError, SnapshotFetcher};
use model::DepthSnapshot;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::error::BinanceRestError;
use crate::responses::DepthSnapshotResponse;

/// Request timeout for Binance API calls.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Fallback wait when a 429/418 response carries no `Retry-After` header.
const DEFAULT_RETRY_AFTER_MS: u64 = 60_000;

/// Depth limits accepted by `GET /api/v3/depth`.
const VALID_DEPTH_LIMITS: [u32; 8] = [5, 10, 20, 50, 100, 500, 1000, 5000];

/// Unauthenticated Binance REST client.
///
/// One request per call, no retries; callers own the retry policy.
pub struct BinanceRestClient {
    client: Client,
    base_url: String,
    snapshot_limit: u32,
}

impl BinanceRestClient {
    /// Create a client for the environment and snapshot limit in `config`.
    pub fn new(config: &ConnectorConfig) -> Result<Self, BinanceRestError> {
        Self::with_base_url(
            config.environment.rest_base_url(),
            REQUEST_TIMEOUT,
            config.snapshot_limit,
        )
    }

    /// Create a client against an arbitrary base URL.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn with_base_url(
        base_url: &str,
        timeout: Duration,
        snapshot_limit: u32,
    ) -> Result<Self, BinanceRestError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BinanceRestError::RequestBuild(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            snapshot_limit: normalize_limit(snapshot_limit),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Levels per side requested by [`SnapshotFetcher::fetch`].
    pub fn snapshot_limit(&self) -> u32 {
        self.snapshot_limit
    }

    /// Get order book depth snapshot.
    ///
    /// GET /api/v3/depth
    ///
    /// `limit` is one of 5, 10, 20, 50, 100, 500, 1000, 5000; other values
    /// are rounded up to the next accepted one.
    pub async fn get_depth_snapshot(
        &self,
        symbol: &str,
        limit: u32,
    ) -> Result<DepthSnapshotResponse, BinanceRestError> {
        let symbol = symbol.to_uppercase();
        let query = format!("symbol={}&limit={}", symbol, normalize_limit(limit));

        debug!(symbol = %symbol, limit, "Fetching depth snapshot");

        let response: DepthSnapshotResponse = self.get("/api/v3/depth", Some(&query)).await?;

        debug!(
            symbol = %symbol,
            last_update_id = response.last_update_id,
            bid_levels = response.bids.len(),
            ask_levels = response.asks.len(),
            "Depth snapshot received"
        );

        Ok(response)
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: Option<&str>,
    ) -> Result<T, BinanceRestError> {
        let url = self.build_url(path, query);
        debug!(url = %url, "GET request");

        let response = self.client.get(&url).send().await?;
        handle_response(response).await
    }

    /// Build a full URL from path and optional query string.
    fn build_url(&self, path: &str, query: Option<&str>) -> String {
        match query {
            Some(q) if !q.is_empty() => format!("{}{}?{}", self.base_url, path, q),
            _ => format!("{}{}", self.base_url, path),
        }
    }
}

#[async_trait]
impl SnapshotFetcher for BinanceRestClient {
    async fn fetch(&self, symbol: &str) -> Result<DepthSnapshot, FeedError> {
        let response = self.get_depth_snapshot(symbol, self.snapshot_limit).await?;
        Ok(response.into_snapshot(symbol))
    }
}

impl std::fmt::Debug for BinanceRestClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BinanceRestClient")
            .field("base_url", &self.base_url)
            .field("snapshot_limit", &self.snapshot_limit)
            .finish()
    }
}

/// Deserialize a 2xx body or classify the failure.
async fn handle_response<T: DeserializeOwned>(response: Response) -> Result<T, BinanceRestError> {
    let status = response.status();

    if status.is_success() {
        let body = response.text().await?;
        return serde_json::from_str(&body).map_err(|e| {
            warn!(error = %e, "Failed to parse response");
            BinanceRestError::Parse(e.to_string())
        });
    }

    if matches!(status.as_u16(), 418 | 429) {
        let retry_after_ms = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map_or(DEFAULT_RETRY_AFTER_MS, |secs| secs.saturating_mul(1000));
        return Err(BinanceRestError::RateLimited { retry_after_ms });
    }

    let body = response.text().await.unwrap_or_default();
    Err(BinanceRestError::from_api_response(status.as_u16(), &body))
}

fn normalize_limit(limit: u32) -> u32 {
    VALID_DEPTH_LIMITS
        .iter()
        .copied()
        .find(|valid| *valid >= limit)
        .unwrap_or(5000)
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::BinanceEnvironment;

    fn client(base_url: &str) -> BinanceRestClient {
        BinanceRestClient::with_base_url(base_url, REQUEST_TIMEOUT, 1000).unwrap()
    }

    #[test]
    fn test_new_uses_environment_base_url() {
        let config = ConnectorConfig {
            environment: BinanceEnvironment::Testnet,
            snapshot_limit: 100,
            ..ConnectorConfig::default()
        };
        let client = BinanceRestClient::new(&config).unwrap();
        assert_eq!(client.base_url(), "https://testnet.binance.vision");
        assert_eq!(client.snapshot_limit(), 100);
    }

    #[test]
    fn test_build_url_with_query() {
        let client = client("https://api.example.com");
        assert_eq!(
            client.build_url("/api/v3/depth", Some("symbol=BTCUSDT&limit=1000")),
            "https://api.example.com/api/v3/depth?symbol=BTCUSDT&limit=1000"
        );
    }

    #[test]
    fn test_build_url_strips_trailing_slash() {
        let client = client("https://api.example.com/");
        assert_eq!(
            client.build_url("/api/v3/depth", Some("")),
            "https://api.example.com/api/v3/depth"
        );
    }

    #[test]
    fn test_limit_rounds_up_to_accepted_value() {
        assert_eq!(normalize_limit(1000), 1000);
        assert_eq!(normalize_limit(0), 5);
        assert_eq!(normalize_limit(150), 500);
        assert_eq!(normalize_limit(10_000), 5000);
    }
}
