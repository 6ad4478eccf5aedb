//! Binance REST response types.

use model::{DepthSnapshot, Exchange, PriceLevelUpdate};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer};

/// Response from `GET /api/v3/depth`.
///
/// Prices and quantities arrive as strings; every one must parse as a
/// decimal or the whole response is rejected.
#[derive(Debug, Clone, Deserialize)]
pub struct DepthSnapshotResponse {
    #[serde(rename = "lastUpdateId")]
    pub last_update_id: u64,
    #[serde(deserialize_with = "deserialize_levels")]
    pub bids: Vec<PriceLevelUpdate>,
    #[serde(deserialize_with = "deserialize_levels")]
    pub asks: Vec<PriceLevelUpdate>,
}

impl DepthSnapshotResponse {
    /// Tag the response with the symbol it was requested for.
    pub fn into_snapshot(self, symbol: &str) -> DepthSnapshot {
        DepthSnapshot {
            exchange: Exchange::Binance,
            symbol: symbol.to_uppercase(),
            last_update_id: self.last_update_id,
            bids: self.bids,
            asks: self.asks,
        }
    }
}

/// Deserialize `[["price", "qty"], ...]` into decimal pairs.
fn deserialize_levels<'de, D>(deserializer: D) -> Result<Vec<PriceLevelUpdate>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Vec<(String, String)> = Deserialize::deserialize(deserializer)?;
    raw.iter()
        .map(|(price, qty)| Ok((parse_decimal(price)?, parse_decimal(qty)?)))
        .collect()
}

fn parse_decimal<E: serde::de::Error>(s: &str) -> Result<Decimal, E> {
    s.parse::<Decimal>()
        .map_err(|e| E::custom(format!("invalid decimal {s:?}: {e}")))
}
