//! Binance WebSocket diff-depth connector.

mod feed;
mod parser;

pub use feed::BinanceDepthFeed;
pub use parser::{parse_message, BinanceDepthRaw, ParseError, ParsedMessage};
