pub mod api;
pub mod config;

use std::sync::Arc;

use contract_client::{ChainError, EscrowChain};
use indexer::EscrowReader;
use tokio::task::JoinHandle;

use crate::config::GatewayConfig;

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("invalid config: {0}")]
    Config(String),

    #[error(transparent)]
    Chain(#[from] ChainError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub struct AppState<C> {
    pub reader: EscrowReader<C>,
    pub config: GatewayConfig,
}

impl<C: EscrowChain + 'static> AppState<C> {
    pub fn new(chain: Arc<C>, config: GatewayConfig) -> Self {
        Self {
            reader: EscrowReader::new(chain, config.indexer.clone()),
            config,
        }
    }
}

/// Keep the job cache warm. Each tick is a non-forced fetch, so a fresh
/// cache costs nothing.
pub fn spawn_refresher<C: EscrowChain + 'static>(state: Arc<AppState<C>>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(state.config.refresh_interval);
        loop {
            ticker.tick().await;
            if let Err(e) = state.reader.refresh_jobs(false).await {
                tracing::warn!(error = %e, "scheduled job refresh failed");
            }
        }
    })
}
