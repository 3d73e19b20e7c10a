//! Data exchange server binary
//!
//! Usage: `data-exchange-server [config.toml]`

use data_exchange::{config::LoggingConfig, server, Config, DataExchange, InMemoryBackend};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn init_tracing(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.filter));

    if logging.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_line_number(true)
            .init();
    }
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Shutdown signal received");
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = Config::load(config_path.as_deref())?;

    init_tracing(&config.logging);

    info!("Starting ADAMS data exchange");
    info!(
        "Authentication: {}",
        if config.auth.is_noop() { "none" } else { "enabled" }
    );

    let backend = Arc::new(InMemoryBackend::from_config(&config.backend));
    let exchange = Arc::new(DataExchange::new(backend, config.auth.clone()));
    let app = server::router(exchange, config.server.max_body_bytes);

    let listener = TcpListener::bind(config.server.bind_address()).await?;
    server::serve(listener, app, shutdown_signal()).await?;

    info!("Data exchange stopped");
    Ok(())
}
