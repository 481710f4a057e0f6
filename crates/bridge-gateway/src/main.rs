use std::net::SocketAddr;
use std::sync::Arc;

use tracing::{info, warn};

mod app;
mod bootstrap;
mod http;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bridge_gateway=info,tower_http=debug".into()),
        )
        .init();

    let config = bridge_core::config::BridgeConfig::load().unwrap_or_else(|e| {
        warn!("config load failed ({}), using defaults", e);
        bridge_core::config::BridgeConfig::default()
    });

    let bind = config.gateway.bind.clone();
    let port = config.gateway.port;

    let state = Arc::new(app::AppState::new(config)?);
    bootstrap::spawn(state.clone());

    let router = app::build_router(state);

    let addr: SocketAddr = format!("{bind}:{port}").parse()?;
    info!("bridge gateway listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;

    Ok(())
}
