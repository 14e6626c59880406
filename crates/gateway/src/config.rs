use std::net::SocketAddr;
use std::time::Duration;

use contract_client::ChainConfig;
use indexer::IndexerConfig;

use crate::GatewayError;

pub struct GatewayConfig {
    pub http_addr: SocketAddr,
    /// How often the job cache is refreshed in the background.
    pub refresh_interval: Duration,
    pub chain: ChainConfig,
    pub indexer: IndexerConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            http_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            refresh_interval: Duration::from_secs(60),
            chain: ChainConfig::default(),
            indexer: IndexerConfig::default(),
        }
    }
}

impl GatewayConfig {
    pub fn from_env() -> Result<Self, GatewayError> {
        let mut config = Self {
            chain: ChainConfig::from_env()?,
            indexer: IndexerConfig::from_env(),
            ..Self::default()
        };

        if let Ok(addr) = std::env::var("HTTP_ADDR") {
            config.http_addr = addr
                .parse()
                .map_err(|e| GatewayError::Config(format!("HTTP_ADDR: {e}")))?;
        }
        if let Ok(secs) = std::env::var("REFRESH_INTERVAL_SECS") {
            let secs: u64 = secs
                .parse()
                .map_err(|e| GatewayError::Config(format!("REFRESH_INTERVAL_SECS: {e}")))?;
            config.refresh_interval = Duration::from_secs(secs.max(1));
        }

        Ok(config)
    }
}
