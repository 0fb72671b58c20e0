//! API keys and their per-collection rights.
//!
//! # Config File Format
//!
//! ```yaml
//! api_keys:
//!   - key: "front-desk-key"
//!     tenant_id: "harbor"
//!     read: ["*"]
//!     write: ["rooms", "guests"]
//!   - key_sha256: "9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08"
//!     tenant_id: "harbor"
//!     read: ["rooms"]
//! ```
//!
//! `"*"` grants every collection. Keys may be given in clear or as the hex
//! SHA-256 of the key.

use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::Path;

use crate::models::Collection;

/// API key entry in config
#[derive(Debug, Clone, Deserialize)]
struct ApiKeyEntry {
    #[serde(default)]
    key: Option<String>,
    #[serde(default)]
    key_sha256: Option<String>,
    tenant_id: String,
    #[serde(default)]
    read: Vec<String>,
    #[serde(default)]
    write: Vec<String>,
}

/// Config file structure
#[derive(Debug, Clone, Deserialize, Default)]
struct ConfigFile {
    #[serde(default)]
    api_keys: Vec<ApiKeyEntry>,
}

/// Set of collections a key may access.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rights {
    All,
    Only(Vec<Collection>),
}

impl Rights {
    fn parse(names: &[String]) -> Self {
        if names.iter().any(|n| n == "*") {
            return Rights::All;
        }
        let collections = names
            .iter()
            .filter_map(|name| {
                let parsed = Collection::parse(name);
                if parsed.is_none() {
                    tracing::warn!("Ignoring unknown collection '{}' in API key rights", name);
                }
                parsed
            })
            .collect();
        Rights::Only(collections)
    }

    pub fn allows(&self, collection: Collection) -> bool {
        match self {
            Rights::All => true,
            Rights::Only(list) => list.contains(&collection),
        }
    }
}

/// Authenticated caller, added to request extensions after auth
#[derive(Debug, Clone)]
pub struct AuthTenant {
    pub tenant_id: String,
    pub read: Rights,
    pub write: Rights,
}

/// API key store - maps sha256(key) -> AuthTenant
#[derive(Debug, Clone, Default)]
pub struct ApiKeyStore {
    keys: HashMap<String, AuthTenant>,
}

impl ApiKeyStore {
    /// Loads API keys from a config file. A missing or unreadable file yields
    /// an empty store, so every authenticated request fails.
    pub fn load(config_path: &Path) -> Self {
        match std::fs::read_to_string(config_path) {
            Ok(contents) => match Self::from_yaml(&contents) {
                Ok(store) => {
                    tracing::info!("Loaded {} API key(s)", store.len());
                    store
                }
                Err(e) => {
                    tracing::warn!("Failed to parse config file: {}", e);
                    Self::default()
                }
            },
            Err(e) => {
                tracing::warn!(
                    "Failed to read config file {}: {}",
                    config_path.display(),
                    e
                );
                tracing::warn!("No API keys loaded - all authenticated requests will fail");
                Self::default()
            }
        }
    }

    pub fn from_yaml(contents: &str) -> Result<Self, serde_yaml::Error> {
        let config: ConfigFile = serde_yaml::from_str(contents)?;

        let mut keys = HashMap::new();
        for entry in config.api_keys {
            let hash = match (entry.key, entry.key_sha256) {
                (_, Some(hash)) => hash.trim().to_lowercase(),
                (Some(key), None) => hash_key(&key),
                (None, None) => {
                    tracing::warn!(
                        "Skipping API key entry for tenant {} without a key",
                        entry.tenant_id
                    );
                    continue;
                }
            };

            keys.insert(
                hash,
                AuthTenant {
                    tenant_id: entry.tenant_id,
                    read: Rights::parse(&entry.read),
                    write: Rights::parse(&entry.write),
                },
            );
        }

        Ok(Self { keys })
    }

    /// Validate an API key and return the associated tenant
    pub fn validate(&self, key: &str) -> Option<AuthTenant> {
        self.keys.get(&hash_key(key)).cloned()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// Hex SHA-256 of an API key.
pub fn hash_key(key: &str) -> String {
    format!("{:x}", Sha256::digest(key.as_bytes()))
}
