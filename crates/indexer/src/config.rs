use std::str::FromStr;
use std::time::Duration;

/// Tuning knobs for scanning, reconstruction and caching.
#[derive(Debug, Clone)]
pub struct IndexerConfig {
    /// Largest block span the provider accepts in one `eth_getLogs`.
    pub window_size: u64,
    /// How far behind the head the primary job listing starts.
    pub listing_lookback: u64,
    /// How far behind the head user-scoped history starts.
    pub user_lookback: u64,
    /// Blocks re-scanned below the watermark to absorb reorgs.
    pub reorg_overlap: u64,
    pub cache_ttl: Duration,
    /// Upper bound on concurrent point reads per batch.
    pub reconstruct_concurrency: usize,
    /// Percentages returned when the settings read fails.
    pub fallback_platform_fee: f64,
    pub fallback_ai_release: f64,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            window_size: 400,
            listing_lookback: 150_000,
            user_lookback: 450_000,
            reorg_overlap: 10,
            cache_ttl: Duration::from_secs(5 * 60),
            reconstruct_concurrency: 8,
            fallback_platform_fee: 2.5,
            fallback_ai_release: 70.0,
        }
    }
}

impl IndexerConfig {
    /// Defaults overridden by `INDEXER_*` environment variables. Unparseable
    /// values are logged and ignored.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(size) = env_value::<u64>("INDEXER_WINDOW_SIZE") {
            config.window_size = size.max(1);
        }
        if let Some(blocks) = env_value("INDEXER_LISTING_LOOKBACK") {
            config.listing_lookback = blocks;
        }
        if let Some(blocks) = env_value("INDEXER_USER_LOOKBACK") {
            config.user_lookback = blocks;
        }
        if let Some(secs) = env_value("INDEXER_CACHE_TTL_SECS") {
            config.cache_ttl = Duration::from_secs(secs);
        }
        if let Some(limit) = env_value::<usize>("INDEXER_CONCURRENCY") {
            config.reconstruct_concurrency = limit.max(1);
        }

        config
    }
}

fn env_value<T: FromStr>(name: &str) -> Option<T> {
    let raw = std::env::var(name).ok()?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(name, value = %raw, "ignoring invalid indexer setting");
            None
        }
    }
}
