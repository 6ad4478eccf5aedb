//! Binance environment configuration.
//!
//! Resolves the REST and WebSocket endpoints used for depth synchronization.

use std::fmt;
use std::str::FromStr;

/// Binance environment (production or testnet).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BinanceEnvironment {
    #[default]
    Production,
    Testnet,
}

impl BinanceEnvironment {
    /// REST API base URL.
    pub fn rest_base_url(&self) -> &'static str {
        match self {
            Self::Production => "https://api.binance.com",
            Self::Testnet => "https://testnet.binance.vision",
        }
    }

    /// WebSocket base URL for market data streams.
    pub fn ws_base_url(&self) -> &'static str {
        match self {
            Self::Production => "wss://stream.binance.com:9443",
            Self::Testnet => "wss://stream.testnet.binance.vision:9443",
        }
    }

    /// Load environment from `BINANCE_ENVIRONMENT` env var.
    ///
    /// Returns `Production` if not set or invalid.
    pub fn from_env() -> Self {
        env_parse("BINANCE_ENVIRONMENT").unwrap_or_default()
    }
}

/// Read `key` from the process environment and parse it, trimming
/// surrounding whitespace. `None` if unset or unparsable.
pub fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

impl fmt::Display for BinanceEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Production => "production",
            Self::Testnet => "testnet",
        })
    }
}

impl FromStr for BinanceEnvironment {
    type Err = ParseEnvironmentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "production" | "prod" | "mainnet" => Ok(Self::Production),
            "testnet" | "test" => Ok(Self::Testnet),
            _ => Err(ParseEnvironmentError(s.to_string())),
        }
    }
}

/// Error parsing environment string.
#[derive(Debug, Clone)]
pub struct ParseEnvironmentError(String);

impl fmt::Display for ParseEnvironmentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid environment '{}', expected 'production' or 'testnet'",
            self.0
        )
    }
}

impl std::error::Error for ParseEnvironmentError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoints() {
        assert_eq!(
            BinanceEnvironment::Production.ws_base_url(),
            "wss://stream.binance.com:9443"
        );
        assert_eq!(
            BinanceEnvironment::Testnet.rest_base_url(),
            "https://testnet.binance.vision"
        );
    }

    #[test]
    fn test_parse_aliases() {
        assert_eq!(
            " Prod ".parse::<BinanceEnvironment>().unwrap(),
            BinanceEnvironment::Production
        );
        assert_eq!(
            "TEST".parse::<BinanceEnvironment>().unwrap(),
            BinanceEnvironment::Testnet
        );
        assert!("staging".parse::<BinanceEnvironment>().is_err());
    }

    #[test]
    fn test_env_parse() {
        std::env::set_var("COMMON_ENV_PARSE_LIMIT", " 500 ");
        std::env::set_var("COMMON_ENV_PARSE_BAD", "five");
        assert_eq!(env_parse::<u32>("COMMON_ENV_PARSE_LIMIT"), Some(500));
        assert_eq!(env_parse::<u32>("COMMON_ENV_PARSE_BAD"), None);
        assert_eq!(env_parse::<u32>("COMMON_ENV_PARSE_UNSET"), None);
    }

    #[test]
    fn test_display_round_trips_through_parse() {
        for env in [BinanceEnvironment::Production, BinanceEnvironment::Testnet] {
            assert_eq!(env.to_string().parse::<BinanceEnvironment>().unwrap(), env);
        }
    }
}
