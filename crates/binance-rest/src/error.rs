//! Binance REST error types.

use connector_core::FeedError;
use thiserror::Error;

/// Errors returned by [`BinanceRestClient`](crate::BinanceRestClient).
#[derive(Debug, Error)]
pub enum BinanceRestError {
    /// Non-2xx response without a recognizable Binance error body.
    #[error("HTTP error: {status} - {message}")]
    HttpError { status: u16, message: String },

    /// Binance error body (`{"code": -1121, "msg": "Invalid symbol."}`).
    #[error("Binance API error {code}: {message}")]
    ApiError { code: i32, message: String },

    /// Request timed out.
    #[error("Request timeout")]
    Timeout,

    /// Network-level failure.
    #[error("Connection error: {0}")]
    Connection(String),

    /// Rate limited (HTTP 429) or IP banned (HTTP 418).
    #[error("Rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    /// Response body did not match the expected shape.
    #[error("Parse error: {0}")]
    Parse(String),

    /// The HTTP client could not be built.
    #[error("Request build error: {0}")]
    RequestBuild(String),
}

impl BinanceRestError {
    /// Classify a non-2xx response body.
    pub fn from_api_response(status: u16, body: &str) -> Self {
        #[derive(serde::Deserialize)]
        struct ApiError {
            code: i32,
            msg: String,
        }

        match serde_json::from_str::<ApiError>(body) {
            Ok(err) => Self::ApiError {
                code: err.code,
                message: err.msg,
            },
            Err(_) => Self::HttpError {
                status,
                message: body.to_string(),
            },
        }
    }

    /// Whether the same request may succeed if repeated later.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout | Self::Connection(_) | Self::RateLimited { .. } => true,
            Self::HttpError { status, .. } => *status >= 500,
            // -1003 too many requests, -1001 disconnected, -1000 unknown
            Self::ApiError { code, .. } => matches!(code, -1000 | -1001 | -1003),
            Self::Parse(_) | Self::RequestBuild(_) => false,
        }
    }
}

impl From<reqwest::Error> for BinanceRestError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_decode() {
            Self::Parse(err.to_string())
        } else if let Some(status) = err.status() {
            Self::HttpError {
                status: status.as_u16(),
                message: err.to_string(),
            }
        } else {
            Self::Connection(err.to_string())
        }
    }
}

impl From<BinanceRestError> for FeedError {
    fn from(err: BinanceRestError) -> Self {
        match err {
            BinanceRestError::RateLimited { retry_after_ms } => {
                FeedError::RateLimited { retry_after_ms }
            }
            BinanceRestError::Parse(_) => FeedError::Decode(err.to_string()),
            _ if err.is_retryable() => FeedError::Transport(err.to_string()),
            _ => FeedError::Rejected(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_body_classified() {
        let err = BinanceRestError::from_api_response(400, r#"{"code":-1121,"msg":"Invalid symbol."}"#);
        assert!(matches!(
            err,
            BinanceRestError::ApiError { code: -1121, ref message } if message == "Invalid symbol."
        ));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_plain_body_kept_as_http_error() {
        let err = BinanceRestError::from_api_response(502, "<html>Bad Gateway</html>");
        assert!(matches!(err, BinanceRestError::HttpError { status: 502, .. }));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_feed_error_mapping() {
        assert_eq!(
            FeedError::from(BinanceRestError::Parse("invalid decimal".into())),
            FeedError::Decode("Parse error: invalid decimal".into())
        );
        assert_eq!(
            FeedError::from(BinanceRestError::Timeout),
            FeedError::Transport("Request timeout".into())
        );
        assert_eq!(
            FeedError::from(BinanceRestError::HttpError {
                status: 503,
                message: "unavailable".into()
            }),
            FeedError::Transport("HTTP error: 503 - unavailable".into())
        );
    }

    #[test]
    fn test_rate_limit_hint_survives_mapping() {
        assert_eq!(
            FeedError::from(BinanceRestError::RateLimited {
                retry_after_ms: 120_000
            }),
            FeedError::RateLimited {
                retry_after_ms: 120_000
            }
        );
    }

    #[test]
    fn test_non_retryable_api_error_is_rejected() {
        let err = BinanceRestError::from_api_response(400, r#"{"code":-1121,"msg":"Invalid symbol."}"#);
        assert_eq!(
            FeedError::from(err),
            FeedError::Rejected("Binance API error -1121: Invalid symbol.".into())
        );

        let busy = BinanceRestError::from_api_response(503, r#"{"code":-1003,"msg":"Too many requests."}"#);
        assert!(matches!(FeedError::from(busy), FeedError::Transport(_)));
    }
}
