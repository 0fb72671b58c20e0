//! Settings Registry: the singleton configuration record and the shared
//! remote client handle.
//!
//! The registry is constructed explicitly with [`SettingsRegistry::init`] and
//! passed by reference; there is no global state. It is the only writer of the
//! settings row.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use crate::db::LocalStore;
use crate::error::{LocalStoreError, RemoteError};
use crate::remote::{RemoteConfig, RemoteConnector, RemoteStore};

/// Where collection reads and writes are routed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncMode {
    Local,
    Cloud,
}

impl fmt::Display for SyncMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncMode::Local => write!(f, "Local"),
            SyncMode::Cloud => write!(f, "Cloud"),
        }
    }
}

impl FromStr for SyncMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "local" => Ok(SyncMode::Local),
            "cloud" => Ok(SyncMode::Cloud),
            _ => Err(format!("Invalid mode '{}'. Valid options: local, cloud", s)),
        }
    }
}

/// The singleton settings record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub hotel_name: String,
    pub mode: SyncMode,
    pub demo_mode: bool,
    #[serde(default)]
    pub remote: Option<RemoteConfig>,
    #[serde(default)]
    pub maintenance_email: Option<String>,
    #[serde(default)]
    pub contact_email: Option<String>,
    #[serde(default)]
    pub site_verification_key: Option<String>,
}

impl Settings {
    /// Remote parameters, if present and complete.
    pub fn remote_config(&self) -> Option<&RemoteConfig> {
        self.remote.as_ref().filter(|r| r.is_valid())
    }

    pub fn is_cloud(&self) -> bool {
        self.mode == SyncMode::Cloud
    }
}

/// Process configuration values used to compute default settings.
#[derive(Debug, Clone, Default)]
pub struct Bootstrap {
    pub hotel_name: String,
    /// Complete remote parameters, if any.
    pub remote: Option<RemoteConfig>,
    /// Whether any remote parameter was supplied, even an incomplete set.
    pub remote_params_supplied: bool,
    pub contact_email: Option<String>,
    pub site_key: Option<String>,
}

impl Bootstrap {
    /// Defaults: `Cloud` when remote parameters are configured, else `Local`;
    /// demo mode only when no remote parameters were supplied at all.
    pub fn default_settings(&self) -> Settings {
        let mode = if self.remote.is_some() {
            SyncMode::Cloud
        } else {
            SyncMode::Local
        };

        Settings {
            hotel_name: self.hotel_name.clone(),
            mode,
            demo_mode: !self.remote_params_supplied && self.remote.is_none(),
            remote: self.remote.clone(),
            maintenance_email: self.contact_email.clone(),
            contact_email: self.contact_email.clone(),
            site_verification_key: self.site_key.clone(),
        }
    }
}

/// Process-wide remote client, created at most once per distinct configuration.
pub struct RemoteHandle {
    connector: Arc<dyn RemoteConnector>,
    active: Mutex<Option<(RemoteConfig, Arc<dyn RemoteStore>)>>,
}

impl RemoteHandle {
    pub fn new(connector: Arc<dyn RemoteConnector>) -> Self {
        Self {
            connector,
            active: Mutex::new(None),
        }
    }

    /// Returns the client for `config`, connecting only if the parameters changed.
    pub fn ensure(&self, config: &RemoteConfig) -> Result<Arc<dyn RemoteStore>, RemoteError> {
        let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some((current, client)) = active.as_ref() {
            if current == config {
                return Ok(client.clone());
            }
        }

        let client = self.connector.connect(config)?;
        tracing::info!(
            "Remote store initialized for tenant {} at {}",
            config.tenant_id,
            config.server_url
        );
        *active = Some((config.clone(), client.clone()));
        Ok(client)
    }

    /// The connected client, or `NotConnected`.
    pub fn current(&self) -> Result<Arc<dyn RemoteStore>, RemoteError> {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|(_, client)| client.clone())
            .ok_or(RemoteError::NotConnected)
    }

    pub fn reset(&self) {
        *self.active.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

/// The single authoritative settings record and the remote client it implies.
pub struct SettingsRegistry {
    store: LocalStore,
    bootstrap: Bootstrap,
    remote: RemoteHandle,
    cache: RwLock<Option<Settings>>,
}

impl SettingsRegistry {
    pub fn init(
        store: LocalStore,
        bootstrap: Bootstrap,
        connector: Arc<dyn RemoteConnector>,
    ) -> Arc<Self> {
        Arc::new(Self {
            store,
            bootstrap,
            remote: RemoteHandle::new(connector),
            cache: RwLock::new(None),
        })
    }

    /// Reads the persisted settings, falling back to computed defaults.
    ///
    /// Defaults are returned but not persisted. Never fails: a read error is
    /// logged and the defaults are used. In cloud mode the remote client is
    /// (re)initialized if its parameters changed.
    pub async fn get_settings(&self) -> Settings {
        let settings = match self.store.load_settings::<Settings>().await {
            Ok(Some(settings)) => settings,
            Ok(None) => self.bootstrap.default_settings(),
            Err(e) => {
                tracing::warn!("Failed to read settings, using defaults: {}", e);
                self.bootstrap.default_settings()
            }
        };

        self.connect_if_cloud(&settings);
        self.set_cache(settings.clone());
        settings
    }

    /// Last resolved settings without touching storage.
    pub fn cached_settings(&self) -> Settings {
        self.cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .unwrap_or_else(|| self.bootstrap.default_settings())
    }

    /// Persists `settings`, replacing the previous record. Storage errors propagate.
    pub async fn save_settings(&self, settings: Settings) -> Result<(), LocalStoreError> {
        self.store.store_settings(&settings).await?;
        tracing::info!("Settings saved (mode: {})", settings.mode);

        self.connect_if_cloud(&settings);
        self.set_cache(settings);
        Ok(())
    }

    /// Clears the saved record (back to defaults) and drops the remote client.
    pub async fn reset(&self) -> Result<(), LocalStoreError> {
        self.store.delete_settings().await?;
        self.remote.reset();
        *self.cache.write().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }

    /// The remote client for the given settings.
    pub fn remote_for(&self, settings: &Settings) -> Result<Arc<dyn RemoteStore>, RemoteError> {
        match settings.remote_config() {
            Some(config) => self.remote.ensure(config),
            None => Err(RemoteError::NotConnected),
        }
    }

    pub fn remote_handle(&self) -> &RemoteHandle {
        &self.remote
    }

    pub fn bootstrap(&self) -> &Bootstrap {
        &self.bootstrap
    }

    fn connect_if_cloud(&self, settings: &Settings) {
        if !settings.is_cloud() {
            return;
        }
        if let Some(config) = settings.remote_config() {
            if let Err(e) = self.remote.ensure(config) {
                tracing::warn!("Failed to initialize remote store: {}", e);
            }
        }
    }

    fn set_cache(&self, settings: Settings) {
        *self.cache.write().unwrap_or_else(PoisonError::into_inner) = Some(settings);
    }
}
