//! Mutable two-sided depth state with a sequence watermark.

use std::collections::HashMap;

use rust_decimal::Decimal;
use tracing::debug;

use crate::error::OrderBookError;

/// Materialized bid/ask quantities keyed by price, plus the highest update
/// id reflected in them.
///
/// Sides are unordered `HashMap`s; ordering is produced only when a
/// [`BookView`](crate::BookView) is materialized. Every stored quantity is
/// strictly positive, and `last_sequence` never moves backwards once the
/// state has been seeded.
#[derive(Debug, Clone)]
pub struct OrderBookState {
    symbol: String,
    bids: HashMap<Decimal, Decimal>,
    asks: HashMap<Decimal, Decimal>,
    last_sequence: u64,
    initialized: bool,
}

impl OrderBookState {
    /// Creates an empty, unseeded state.
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            bids: HashMap::new(),
            asks: HashMap::new(),
            last_sequence: 0,
            initialized: false,
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Whether a snapshot has seeded this state.
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Highest applied update id; 0 before seeding.
    pub fn last_sequence(&self) -> u64 {
        self.last_sequence
    }

    pub fn bid_levels(&self) -> usize {
        self.bids.len()
    }

    pub fn ask_levels(&self) -> usize {
        self.asks.len()
    }

    pub fn bid_quantity(&self, price: Decimal) -> Option<Decimal> {
        self.bids.get(&price).copied()
    }

    pub fn ask_quantity(&self, price: Decimal) -> Option<Decimal> {
        self.asks.get(&price).copied()
    }

    pub(crate) fn bids(&self) -> impl Iterator<Item = (&Decimal, &Decimal)> {
        self.bids.iter()
    }

    pub(crate) fn asks(&self) -> impl Iterator<Item = (&Decimal, &Decimal)> {
        self.asks.iter()
    }

    /// Replaces the whole book with a snapshot.
    ///
    /// Levels with a non-positive quantity are not valid snapshot content
    /// and are dropped. Returns the number of dropped levels.
    pub fn seed(
        &mut self,
        bids: &[(Decimal, Decimal)],
        asks: &[(Decimal, Decimal)],
        last_update_id: u64,
    ) -> usize {
        self.bids.clear();
        self.asks.clear();

        let mut dropped = 0;
        for (side, levels) in [(&mut self.bids, bids), (&mut self.asks, asks)] {
            for (price, quantity) in levels {
                if *quantity > Decimal::ZERO {
                    side.insert(*price, *quantity);
                } else {
                    dropped += 1;
                }
            }
        }

        if dropped > 0 {
            debug!(
                symbol = %self.symbol,
                dropped,
                "dropped non-positive levels from snapshot"
            );
        }

        self.last_sequence = last_update_id;
        self.initialized = true;
        dropped
    }

    /// Applies one diff's level changes and advances the watermark to
    /// `final_update_id`.
    ///
    /// A zero quantity removes the price; any other quantity inserts or
    /// overwrites it. The change set is validated up front, so on error
    /// the state is left untouched. Staleness and gap decisions belong to
    /// the caller.
    pub fn apply_changes(
        &mut self,
        bids: &[(Decimal, Decimal)],
        asks: &[(Decimal, Decimal)],
        final_update_id: u64,
    ) -> Result<(), OrderBookError> {
        if !self.initialized {
            return Err(OrderBookError::NotInitialized);
        }

        if final_update_id < self.last_sequence {
            return Err(OrderBookError::SequenceRegression {
                current: self.last_sequence,
                update: final_update_id,
            });
        }

        if let Some((price, quantity)) = bids
            .iter()
            .chain(asks.iter())
            .find(|(_, quantity)| *quantity < Decimal::ZERO)
        {
            return Err(OrderBookError::InvalidQuantity {
                price: *price,
                quantity: *quantity,
            });
        }

        apply_side(&mut self.bids, bids);
        apply_side(&mut self.asks, asks);

        self.last_sequence = final_update_id;
        Ok(())
    }
}

fn apply_side(side: &mut HashMap<Decimal, Decimal>, changes: &[(Decimal, Decimal)]) {
    for (price, quantity) in changes {
        if quantity.is_zero() {
            side.remove(price);
        } else {
            side.insert(*price, *quantity);
        }
    }
}
