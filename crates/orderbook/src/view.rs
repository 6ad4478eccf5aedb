//! Read-only sorted projection of an [`OrderBookState`].

use rust_decimal::Decimal;

use crate::level::PriceLevel;
use crate::state::OrderBookState;

/// Sorted, immutable copy of the book at one sequence point.
///
/// - `bids` are ordered by price descending (best first)
/// - `asks` are ordered by price ascending (best first)
///
/// Prices are unique within a side, so no secondary sort key exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookView {
    pub symbol: String,
    pub bids: Vec<PriceLevel>,
    pub asks: Vec<PriceLevel>,
    pub best_bid: Option<PriceLevel>,
    pub best_ask: Option<PriceLevel>,
    /// Watermark of the state this view was taken from.
    pub last_sequence: u64,
}

impl BookView {
    /// View of a book that has not been seeded yet.
    pub fn empty(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            bids: Vec::new(),
            asks: Vec::new(),
            best_bid: None,
            best_ask: None,
            last_sequence: 0,
        }
    }

    /// Builds a view from the current state. Never mutates the state.
    pub fn materialize(state: &OrderBookState) -> Self {
        let mut bids: Vec<PriceLevel> = state
            .bids()
            .map(|(price, qty)| PriceLevel::new(*price, *qty))
            .collect();
        bids.sort_unstable_by(|a, b| b.price.cmp(&a.price));

        let mut asks: Vec<PriceLevel> = state
            .asks()
            .map(|(price, qty)| PriceLevel::new(*price, *qty))
            .collect();
        asks.sort_unstable_by(|a, b| a.price.cmp(&b.price));

        Self {
            symbol: state.symbol().to_string(),
            best_bid: bids.first().copied(),
            best_ask: asks.first().copied(),
            bids,
            asks,
            last_sequence: state.last_sequence(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.bids.is_empty() && self.asks.is_empty()
    }

    /// Average of best bid and best ask.
    pub fn mid_price(&self) -> Option<Decimal> {
        let bid = self.best_bid?;
        let ask = self.best_ask?;
        Some((bid.price + ask.price) / Decimal::TWO)
    }

    /// Best ask minus best bid.
    pub fn spread(&self) -> Option<Decimal> {
        let bid = self.best_bid?;
        let ask = self.best_ask?;
        Some(ask.price - bid.price)
    }

    /// Spread in basis points of the mid price.
    pub fn spread_bps(&self) -> Option<Decimal> {
        let spread = self.spread()?;
        let mid = self.mid_price()?;
        if mid.is_zero() {
            return None;
        }
        Some(spread / mid * Decimal::from(10_000))
    }

    /// Top-of-book imbalance: `bid_qty / (bid_qty + ask_qty)`.
    ///
    /// 1 means all resting size at the touch is on the bid, 0 all on the ask.
    pub fn imbalance(&self) -> Option<Decimal> {
        let bid = self.best_bid?;
        let ask = self.best_ask?;
        let total = bid.quantity + ask.quantity;
        if total.is_zero() {
            return None;
        }
        Some(bid.quantity / total)
    }

    /// A crossed view means the upstream data is inconsistent.
    pub fn is_crossed(&self) -> bool {
        matches!((self.best_bid, self.best_ask), (Some(b), Some(a)) if b.price >= a.price)
    }

    /// Up to `n` best bids, highest first.
    pub fn top_bids(&self, n: usize) -> &[PriceLevel] {
        &self.bids[..n.min(self.bids.len())]
    }

    /// Up to `n` best asks, lowest first.
    pub fn top_asks(&self, n: usize) -> &[PriceLevel] {
        &self.asks[..n.min(self.asks.len())]
    }

    /// Total bid quantity at or above `price`.
    pub fn bid_depth_at(&self, price: Decimal) -> Decimal {
        self.bids
            .iter()
            .take_while(|level| level.price >= price)
            .map(|level| level.quantity)
            .sum()
    }

    /// Total ask quantity at or below `price`.
    pub fn ask_depth_at(&self, price: Decimal) -> Decimal {
        self.asks
            .iter()
            .take_while(|level| level.price <= price)
            .map(|level| level.quantity)
            .sum()
    }
}
