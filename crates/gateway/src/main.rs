use std::sync::Arc;

use contract_client::RpcChain;
use gateway::config::GatewayConfig;
use gateway::{api, spawn_refresher, AppState};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                EnvFilter::new("gateway=info,indexer=info,contract_client=info")
            }),
        )
        .with(fmt::layer().with_target(true))
        .init();

    let config = GatewayConfig::from_env()?;
    let chain = Arc::new(RpcChain::connect(&config.chain)?);
    let http_addr = config.http_addr;

    tracing::info!(
        contract = %config.chain.contract_address,
        endpoints = config.chain.rpc_urls.len(),
        "connected to escrow contract"
    );

    let state = Arc::new(AppState::new(chain, config));
    spawn_refresher(state.clone());

    let app = api::router(state);
    let listener = tokio::net::TcpListener::bind(http_addr).await?;
    tracing::info!(%http_addr, "gateway listening");
    axum::serve(listener, app).await?;

    Ok(())
}
