//! Routing strategies selected per call from the current settings.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use super::outbox::PushOrigin;
use super::{Freshness, SaveOutcome, SyncEngine, Version};
use crate::error::{RemoteError, SyncError};
use crate::models::Collection;
use crate::remote::RemoteStore;
use crate::settings::SyncMode;

/// A routed load, not yet published.
#[derive(Debug, Clone, PartialEq)]
pub struct Loaded {
    pub items: Vec<Value>,
    pub freshness: Freshness,
}

/// A save whose local replace committed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Committed {
    /// Version stamped by the local commit.
    pub version: Version,
    pub outcome: SaveOutcome,
}

/// Where one collection operation reads from and writes to.
#[async_trait]
pub trait Routing: Send + Sync {
    fn mode(&self) -> SyncMode;

    async fn load(&self, collection: Collection, seed: Vec<Value>) -> Result<Loaded, SyncError>;

    async fn save(&self, collection: Collection, items: Vec<Value>) -> Result<Committed, SyncError>;
}

/// Reads and writes the Local Store only.
pub struct LocalRouting<'a> {
    engine: &'a SyncEngine,
    demo_mode: bool,
}

impl<'a> LocalRouting<'a> {
    pub fn new(engine: &'a SyncEngine, demo_mode: bool) -> Self {
        Self { engine, demo_mode }
    }
}

#[async_trait]
impl<'a> Routing for LocalRouting<'a> {
    fn mode(&self) -> SyncMode {
        SyncMode::Local
    }

    /// Seeds an empty collection in demo mode. The emptiness check runs inside
    /// the collection's write transaction so concurrent first loads seed once.
    async fn load(&self, collection: Collection, seed: Vec<Value>) -> Result<Loaded, SyncError> {
        let seed_allowed = self.demo_mode && !seed.is_empty();

        let items = self
            .engine
            .store()
            .transaction(&[collection], move |tx| {
                Box::pin(async move {
                    if seed_allowed && tx.count(collection).await? == 0 {
                        tx.bulk_add(collection, &seed).await?;
                        tracing::info!("Seeded {} demo {}", seed.len(), collection);
                        return Ok::<_, SyncError>(seed);
                    }
                    Ok(tx.to_array(collection).await?)
                })
            })
            .await?;

        Ok(Loaded {
            items,
            freshness: Freshness::LocalOnly,
        })
    }

    async fn save(&self, collection: Collection, items: Vec<Value>) -> Result<Committed, SyncError> {
        let version = self.engine.replace_local(collection, items).await?;
        Ok(Committed {
            version,
            outcome: SaveOutcome::LocalOnly,
        })
    }
}

/// Reads from the remote; writes locally, then pushes.
pub struct CloudRouting<'a> {
    engine: &'a SyncEngine,
    remote: Result<Arc<dyn RemoteStore>, RemoteError>,
}

impl<'a> CloudRouting<'a> {
    pub fn new(engine: &'a SyncEngine, remote: Result<Arc<dyn RemoteStore>, RemoteError>) -> Self {
        Self { engine, remote }
    }
}

#[async_trait]
impl<'a> Routing for CloudRouting<'a> {
    fn mode(&self) -> SyncMode {
        SyncMode::Cloud
    }

    /// Returns the remote contents as-is. Any remote failure yields an empty
    /// list marked [`Freshness::RemoteUnavailable`].
    async fn load(&self, collection: Collection, _seed: Vec<Value>) -> Result<Loaded, SyncError> {
        let fetched = match &self.remote {
            Ok(remote) => remote.fetch_collection(collection).await,
            Err(e) => Err(e.clone()),
        };

        Ok(match fetched {
            Ok(items) => Loaded {
                items,
                freshness: Freshness::CloudAuthoritative,
            },
            Err(e) => {
                tracing::warn!("Could not read {} from remote, showing no data: {}", collection, e);
                Loaded {
                    items: Vec::new(),
                    freshness: Freshness::RemoteUnavailable,
                }
            }
        })
    }

    async fn save(&self, collection: Collection, items: Vec<Value>) -> Result<Committed, SyncError> {
        let version = self.engine.replace_local(collection, items).await?;

        let pushed = self
            .engine
            .push(collection, self.remote.clone(), PushOrigin::Save)
            .await?;

        let outcome = match pushed {
            Ok(()) => SaveOutcome::Synced,
            Err(reason) => SaveOutcome::Deferred {
                queued: reason.is_retryable(),
                reason,
            },
        };
        Ok(Committed { version, outcome })
    }
}
