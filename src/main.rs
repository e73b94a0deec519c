// Aggregation HTTP service: registers the production source adapters
// over a shared headless Chrome and serves GET /data.

use anyhow::Result;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use autovitrine::api::{self, AppState};
use autovitrine::engine::Aggregator;
use autovitrine::session::ChromeSessionProvider;
use autovitrine::{sources, EngineConfig, ServerConfig};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("autovitrine=info,warn")),
        )
        .init();

    let server_config = ServerConfig::from_env()?;
    let engine_config = EngineConfig::from_env()?;
    info!(?engine_config, "engine configuration loaded");

    let provider = Arc::new(ChromeSessionProvider::new(server_config.headless));

    let mut aggregator = Aggregator::new(provider.clone(), engine_config.clone());
    for adapter in sources::default_sources(&engine_config) {
        aggregator.register(adapter)?;
    }

    let state = Arc::new(AppState { aggregator });
    let app = api::router(state);

    let listener = tokio::net::TcpListener::bind(server_config.listen_addr).await?;
    info!(addr = %server_config.listen_addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Close Chrome after the last request has drained.
    provider.shutdown().await?;
    info!("shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("failed to listen for shutdown signal: {e}");
        return;
    }
    info!("shutdown signal received");
}
