//! Local depth book state and its sorted views.
//!
//! [`OrderBookState`] stores each side as an unordered price→quantity map
//! keyed by `Decimal`, so repeated price strings always land on the same
//! key. Sorting happens only when a [`BookView`] is materialized.
//!
//! # Example
//!
//! ```rust
//! use orderbook::{BookView, OrderBookState};
//! use rust_decimal_macros::dec;
//!
//! let mut state = OrderBookState::new("BTCUSDT");
//! state.seed(&[(dec!(100), dec!(1))], &[(dec!(101), dec!(1))], 10);
//! state
//!     .apply_changes(&[(dec!(100), dec!(0))], &[(dec!(102), dec!(2))], 12)
//!     .unwrap();
//!
//! let view = BookView::materialize(&state);
//! assert!(view.bids.is_empty());
//! assert_eq!(view.asks.len(), 2);
//! assert_eq!(view.last_sequence, 12);
//! ```

mod error;
mod level;
mod state;
mod view;

pub use error::OrderBookError;
pub use level::PriceLevel;
pub use state::OrderBookState;
pub use view::BookView;
