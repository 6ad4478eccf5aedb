//! Order book error types.

use rust_decimal::Decimal;
use thiserror::Error;

/// Errors raised while mutating [`OrderBookState`](crate::OrderBookState).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderBookError {
    /// Diff applied before any snapshot seeded the book.
    #[error("order book not initialized - apply snapshot first")]
    NotInitialized,

    /// Update would move the sequence watermark backwards.
    #[error("sequence regression: watermark {current}, update {update}")]
    SequenceRegression { current: u64, update: u64 },

    /// Negative quantity in a level change.
    #[error("invalid quantity {quantity} at price {price}")]
    InvalidQuantity { price: Decimal, quantity: Decimal },
}
