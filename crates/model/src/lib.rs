//! Shared market data types for depth book synchronization.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Exchange {
    Binance,
}

/// A single `(price, quantity)` change. Quantity zero means "remove level".
pub type PriceLevelUpdate = (Decimal, Decimal);

/// Incremental depth change covering the update id range
/// `[first_update_id, final_update_id]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepthUpdate {
    pub exchange: Exchange,
    pub symbol: String,
    pub first_update_id: u64,
    pub final_update_id: u64,
    pub bids: Vec<PriceLevelUpdate>,
    pub asks: Vec<PriceLevelUpdate>,
    /// Exchange event time in milliseconds.
    pub timestamp_ms: i64,
}

impl DepthUpdate {
    /// Number of level changes carried by this event on both sides.
    pub fn change_count(&self) -> usize {
        self.bids.len() + self.asks.len()
    }

    /// Returns true if the update id range is well formed.
    pub fn is_well_formed(&self) -> bool {
        self.first_update_id <= self.final_update_id
    }
}

/// Full-depth point-in-time listing tagged with the last update id it reflects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepthSnapshot {
    pub exchange: Exchange,
    pub symbol: String,
    pub last_update_id: u64,
    pub bids: Vec<PriceLevelUpdate>,
    pub asks: Vec<PriceLevelUpdate>,
}
