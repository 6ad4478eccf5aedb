use common::{env_parse, BinanceEnvironment};

/// Connector-level settings shared by the REST and WebSocket adapters.
#[derive(Debug, Clone)]
pub struct ConnectorConfig {
    /// Binance environment (production or testnet).
    pub environment: BinanceEnvironment,
    /// Diff stream cadence in milliseconds (100 or 1000).
    pub depth_update_speed_ms: u32,
    /// Number of levels per side requested from the snapshot endpoint.
    pub snapshot_limit: u32,
    /// Capacity of the channel between the socket task and the consumer.
    pub channel_capacity: usize,
}

impl Default for ConnectorConfig {
    fn default() -> Self {
        Self {
            environment: BinanceEnvironment::default(),
            depth_update_speed_ms: 100,
            snapshot_limit: 1000,
            channel_capacity: 1024,
        }
    }
}

impl ConnectorConfig {
    /// Build a config from `BINANCE_ENVIRONMENT`, `DEPTH_UPDATE_SPEED_MS`
    /// and `DEPTH_SNAPSHOT_LIMIT`, keeping defaults for anything unset.
    pub fn from_env() -> Self {
        let mut config = Self {
            environment: BinanceEnvironment::from_env(),
            ..Self::default()
        };

        if let Some(speed) = env_parse("DEPTH_UPDATE_SPEED_MS") {
            config.depth_update_speed_ms = speed;
        }
        if let Some(limit) = env_parse("DEPTH_SNAPSHOT_LIMIT") {
            config.snapshot_limit = limit;
        }

        config
    }
}
