//! Remote Store adapter: access to the multi-tenant document store.
//!
//! The adapter is a pure data operation parameterized by collection; it never
//! decides routing. Clients are created through a [`RemoteConnector`] so the
//! settings registry can (re)initialize them when the configuration changes.

mod http;
mod memory;

pub use http::{HttpConnector, HttpRemoteStore, DEFAULT_TIMEOUT};
pub use memory::{MemoryConnector, MemoryRemote};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

use crate::error::RemoteError;
use crate::models::Collection;

/// Connection parameters for the remote store.
#[derive(Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteConfig {
    /// Base URL (e.g., "https://sync.example.com")
    pub server_url: String,
    /// Tenant (hotel) the credentials belong to
    pub tenant_id: String,
    /// API key for authentication
    pub api_key: String,
}

impl RemoteConfig {
    pub fn new(
        server_url: impl Into<String>,
        tenant_id: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            server_url: server_url.into(),
            tenant_id: tenant_id.into(),
            api_key: api_key.into(),
        }
    }

    /// Returns true if every parameter is present and non-blank.
    pub fn is_valid(&self) -> bool {
        !self.server_url.trim().is_empty()
            && !self.tenant_id.trim().is_empty()
            && !self.api_key.trim().is_empty()
    }
}

impl fmt::Debug for RemoteConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteConfig")
            .field("server_url", &self.server_url)
            .field("tenant_id", &self.tenant_id)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

/// A connected remote client.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Reads every document of a collection.
    ///
    /// Fails with `PermissionDenied` when the credentials lack read rights and
    /// with `ConnectionError` on any other failure.
    async fn fetch_collection(&self, collection: Collection) -> Result<Vec<Value>, RemoteError>;

    /// Replaces a collection with `items` as one atomic batch.
    async fn bulk_write(&self, collection: Collection, items: &[Value]) -> Result<(), RemoteError>;
}

/// Creates remote clients from connection parameters.
pub trait RemoteConnector: Send + Sync {
    fn connect(&self, config: &RemoteConfig) -> Result<Arc<dyn RemoteStore>, RemoteError>;
}
