//! Binance diff-depth message parsing.
//!
//! Accepts both the raw stream format (`/ws/<symbol>@depth`) and the
//! combined format (`/stream?streams=...`) that wraps the payload in
//! `{"stream": ..., "data": ...}`.

use model::{DepthUpdate, Exchange, PriceLevelUpdate};
use rust_decimal::Decimal;
use serde::Deserialize;
use thiserror::Error;

use connector_core::FeedError;

/// Raw Binance depth update event.
#[derive(Debug, Deserialize)]
pub struct BinanceDepthRaw {
    #[serde(rename = "E")]
    pub event_time: i64,
    #[serde(rename = "s")]
    pub symbol: String,
    #[serde(rename = "U")]
    pub first_update_id: u64,
    #[serde(rename = "u")]
    pub final_update_id: u64,
    #[serde(rename = "b")]
    pub bids: Vec<(String, String)>,
    #[serde(rename = "a")]
    pub asks: Vec<(String, String)>,
}

/// Combined stream envelope.
#[derive(Debug, Deserialize)]
struct CombinedStreamWrapper {
    #[allow(dead_code)]
    stream: String,
    data: serde_json::Value,
}

#[derive(Debug)]
pub enum ParsedMessage {
    DepthUpdate(DepthUpdate),
    /// Subscription acks and any non-depth event.
    Unknown,
}

/// Reasons a depth payload could not be decoded.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid decimal {value:?} in {side} levels")]
    InvalidDecimal { side: &'static str, value: String },
}

impl From<ParseError> for FeedError {
    fn from(err: ParseError) -> Self {
        FeedError::Decode(err.to_string())
    }
}

impl TryFrom<BinanceDepthRaw> for DepthUpdate {
    type Error = ParseError;

    fn try_from(raw: BinanceDepthRaw) -> Result<Self, Self::Error> {
        Ok(DepthUpdate {
            exchange: Exchange::Binance,
            bids: parse_price_levels(&raw.bids, "bid")?,
            asks: parse_price_levels(&raw.asks, "ask")?,
            symbol: raw.symbol,
            first_update_id: raw.first_update_id,
            final_update_id: raw.final_update_id,
            timestamp_ms: raw.event_time,
        })
    }
}

/// Parse string price/qty pairs. A single bad value rejects the event.
fn parse_price_levels(
    levels: &[(String, String)],
    side: &'static str,
) -> Result<Vec<PriceLevelUpdate>, ParseError> {
    let parse = |value: &String| {
        value
            .parse::<Decimal>()
            .map_err(|_| ParseError::InvalidDecimal {
                side,
                value: value.clone(),
            })
    };

    levels
        .iter()
        .map(|(price, qty)| Ok((parse(price)?, parse(qty)?)))
        .collect()
}

fn parse_event(value: serde_json::Value) -> Result<ParsedMessage, ParseError> {
    match value.get("e").and_then(|v| v.as_str()) {
        Some("depthUpdate") => {
            let raw: BinanceDepthRaw = serde_json::from_value(value)?;
            Ok(ParsedMessage::DepthUpdate(raw.try_into()?))
        }
        _ => Ok(ParsedMessage::Unknown),
    }
}

pub fn parse_message(text: &str) -> Result<ParsedMessage, ParseError> {
    if text.contains("\"stream\"") {
        let wrapper: CombinedStreamWrapper = serde_json::from_str(text)?;
        return parse_event(wrapper.data);
    }

    let raw: serde_json::Value = serde_json::from_str(text)?;
    parse_event(raw)
}
