//! Local-first persistence and cloud sync for the Staybook property manager.
//!
//! Every domain collection (rooms, guests, staff, ...) lives in an embedded
//! SQLite store on the device and, when the hotel runs in cloud mode, is
//! mirrored to a multi-tenant remote document store.
//!
//! # Layout
//!
//! - [`db`]: the Local Store (sqlx + SQLite)
//! - [`remote`]: the Remote Store adapter and an in-memory implementation
//! - [`settings`]: the Settings Registry and the shared remote client handle
//! - [`engine`]: the Sync Engine, outbox, snapshots and subscriptions
//! - [`server`]: the reference remote document store (axum)
//! - [`mail`]: the outbound email capability
//!
//! # Usage
//!
//! ```no_run
//! use staybook::{Config, LocalStore, SettingsRegistry, SyncEngine};
//! use staybook::remote::HttpConnector;
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::load(None)?;
//! let store = LocalStore::open(&config.database_path.value).await?;
//! let connector = Arc::new(HttpConnector::new(config.remote_timeout()));
//! let settings = SettingsRegistry::init(store.clone(), config.bootstrap(), connector);
//! let engine = SyncEngine::new(store, settings);
//!
//! engine.bootstrap().await?;
//! let rooms = engine.get_rooms().await?;
//! println!("{} rooms", rooms.len());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod mail;
pub mod models;
pub mod remote;
pub mod server;
pub mod settings;

pub use config::Config;
pub use db::LocalStore;
pub use engine::{Freshness, SaveOutcome, SyncEngine};
pub use error::{LocalStoreError, RemoteError, SyncError};
pub use models::{Collection, Record};
pub use settings::{Settings, SettingsRegistry, SyncMode};
