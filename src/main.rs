//! relay-gateway server entry point.
//!
//! Starts the Axum HTTP server with the WebSocket relay endpoint.

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use relay_gateway::app_state::AppState;
use relay_gateway::config::{LogFormat, RelayConfig};
use relay_gateway::server;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = RelayConfig::from_env().context("loading configuration")?;

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match config.log_format {
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
        LogFormat::Json => tracing_subscriber::fmt().json().with_env_filter(filter).init(),
    }
    tracing::info!(addr = %config.listen_addr, "starting relay-gateway");

    // Start server
    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("binding {}", config.listen_addr))?;
    let state = AppState::new(config);

    server::serve(listener, state, server::shutdown_signal()).await?;

    Ok(())
}
