//! Reference multi-tenant remote document store.
//!
//! Serves the protocol spoken by [`crate::remote::HttpRemoteStore`]; run it
//! with the `staybook-server` binary.

pub mod api;
pub mod auth;
pub mod storage;

pub use api::{router, AppState, CollectionBody};
pub use auth::{ApiKeyStore, AuthTenant, Rights};
pub use storage::{ServerStorage, ServerStorageError};

use std::path::PathBuf;

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port to listen on
    pub port: u16,
    /// Directory holding tenant collections
    pub data_dir: PathBuf,
    /// Path to the API key file
    pub config_path: PathBuf,
}

impl ServerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let port = std::env::var("STAYBOOK_SERVER_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(8080);

        let data_dir = std::env::var("STAYBOOK_SERVER_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                dirs::data_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join("staybook-server")
            });

        let config_path = std::env::var("STAYBOOK_SERVER_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                dirs::config_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join("staybook-server")
                    .join("config.yaml")
            });

        Self {
            port,
            data_dir,
            config_path,
        }
    }

    /// Builds the shared state: API keys from the config file, storage under the data dir.
    pub fn app_state(&self) -> AppState {
        AppState {
            api_keys: std::sync::Arc::new(ApiKeyStore::load(&self.config_path)),
            storage: ServerStorage::new(&self.data_dir),
        }
    }
}
