//! Staybook Remote Store Server
//!
//! A multi-tenant document store holding each hotel's collections for
//! Staybook clients running in cloud mode.
//!
//! # Configuration
//!
//! Environment variables:
//! - `STAYBOOK_SERVER_PORT`: Port to listen on (default: 8080)
//! - `STAYBOOK_SERVER_DATA_DIR`: Directory to store collections (default: ~/.local/share/staybook-server)
//! - `STAYBOOK_SERVER_CONFIG`: Path to the API key file (default: ~/.config/staybook-server/config.yaml)
//!
//! See [`staybook::server::auth`] for the API key file format.

use staybook::server::{router, ServerConfig};
use std::net::SocketAddr;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "staybook_server=info,staybook=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from_env();

    if let Err(e) = std::fs::create_dir_all(&config.data_dir) {
        tracing::error!("Failed to create data directory: {}", e);
        std::process::exit(1);
    }

    tracing::info!("Data directory: {}", config.data_dir.display());
    tracing::info!("Config file: {}", config.config_path.display());

    let app = router(config.app_state());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Starting server on {}", addr);

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("Failed to bind {}: {}", addr, e);
            std::process::exit(1);
        }
    };

    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}
