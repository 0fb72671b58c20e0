//! The Sync Engine: per-collection load/save routing between the Local Store
//! and the Remote Store.
//!
//! Every save commits to the Local Store first. In cloud mode the collection
//! is then pushed to the remote; a failed push is queued in the durable
//! outbox instead of failing the save. Reads in cloud mode come from the
//! remote only.

mod collections;
mod outbox;
mod routing;
pub mod seed;
mod snapshot;
mod subscription;

pub use outbox::{backoff_delay, FlushReport, OutboxWorker};
pub use routing::{CloudRouting, Committed, Loaded, LocalRouting, Routing};
pub use snapshot::{Snapshot, SNAPSHOT_VERSION};
pub use subscription::{CollectionUpdate, LoadTicket, Subscriptions, Version, WriteGuard};

use serde::Serialize;
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{watch, Notify};

use crate::db::{LocalStore, OutboxEntry};
use crate::error::{RemoteError, SyncError};
use crate::models::{Collection, Record};
use crate::settings::{Settings, SettingsRegistry, SyncMode};

/// Where a collection's last observed state came from, relative to the remote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Freshness {
    /// Not loaded or saved since startup.
    Unknown,
    /// Local mode; the Local Store is authoritative.
    LocalOnly,
    /// Last load returned the remote contents.
    CloudAuthoritative,
    /// Last load could not read the remote and returned an empty list.
    RemoteUnavailable,
    /// Saved locally but the push to the remote has not succeeded yet.
    LocalAhead,
    /// Local contents were pushed successfully.
    Synced,
}

impl fmt::Display for Freshness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Freshness::Unknown => "unknown",
            Freshness::LocalOnly => "local only",
            Freshness::CloudAuthoritative => "cloud",
            Freshness::RemoteUnavailable => "remote unavailable",
            Freshness::LocalAhead => "local ahead",
            Freshness::Synced => "synced",
        };
        write!(f, "{}", label)
    }
}

/// Result of a save whose local write committed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    /// Local mode; nothing to push.
    LocalOnly,
    /// Cloud mode; the remote now holds the saved contents.
    Synced,
    /// Cloud mode; the push failed. When `queued`, the outbox will retry it.
    Deferred { reason: RemoteError, queued: bool },
}

impl SaveOutcome {
    /// User-facing warning for a save that did not reach the remote.
    pub fn warning(&self) -> Option<String> {
        match self {
            SaveOutcome::Deferred { reason, queued: true } => Some(format!(
                "Saved locally, cloud sync failed ({}); will retry",
                reason
            )),
            SaveOutcome::Deferred { reason, queued: false } => {
                Some(format!("Saved locally, cloud sync failed ({})", reason))
            }
            _ => None,
        }
    }

    /// Freshness of the collection right after this save.
    pub fn freshness(&self) -> Freshness {
        match self {
            SaveOutcome::LocalOnly => Freshness::LocalOnly,
            SaveOutcome::Synced => Freshness::Synced,
            SaveOutcome::Deferred { .. } => Freshness::LocalAhead,
        }
    }
}

/// Summary of [`SyncEngine::bootstrap`].
#[derive(Debug, Clone)]
pub struct BootstrapReport {
    pub mode: SyncMode,
    pub demo_mode: bool,
    pub counts: Vec<(Collection, usize)>,
    pub outbox: FlushReport,
}

struct Inner {
    store: LocalStore,
    settings: Arc<SettingsRegistry>,
    subscriptions: Subscriptions,
    push_locks: Vec<tokio::sync::Mutex<()>>,
    wake: Notify,
}

/// Routes collection reads and writes. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct SyncEngine {
    inner: Arc<Inner>,
}

impl SyncEngine {
    pub fn new(store: LocalStore, settings: Arc<SettingsRegistry>) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                settings,
                subscriptions: Subscriptions::new(),
                push_locks: Collection::ALL
                    .iter()
                    .map(|_| tokio::sync::Mutex::new(()))
                    .collect(),
                wake: Notify::new(),
            }),
        }
    }

    pub fn store(&self) -> &LocalStore {
        &self.inner.store
    }

    pub fn settings(&self) -> &Arc<SettingsRegistry> {
        &self.inner.settings
    }

    /// Loads a collection, seeding it with `seed` on first run in demo mode.
    ///
    /// In cloud mode, remote documents that do not decode as `T` are treated
    /// like an unreadable remote: the result is empty, and so is the published
    /// snapshot.
    pub async fn load<T: Record>(&self, seed: Vec<T>) -> Result<Vec<T>, SyncError> {
        let collection = T::COLLECTION;
        let seed = seed
            .iter()
            .map(serde_json::to_value)
            .collect::<Result<Vec<_>, _>>()?;

        let (mode, ticket, loaded) = self.load_routed(collection, seed).await?;
        let subscriptions = &self.inner.subscriptions;

        match decode_all::<T>(loaded.items.clone()) {
            Ok(records) => {
                subscriptions.finish_load(ticket, loaded.items, loaded.freshness);
                Ok(records)
            }
            Err(e) if mode == SyncMode::Cloud => {
                tracing::warn!("Discarding undecodable remote {}: {}", collection, e);
                subscriptions.finish_load(ticket, Vec::new(), Freshness::RemoteUnavailable);
                Ok(Vec::new())
            }
            Err(e) => Err(e),
        }
    }

    /// Replaces a collection with `items`.
    pub async fn save<T: Record>(&self, items: &[T]) -> Result<SaveOutcome, SyncError> {
        let values = items
            .iter()
            .map(serde_json::to_value)
            .collect::<Result<Vec<_>, _>>()?;
        self.save_values(T::COLLECTION, values).await
    }

    pub async fn load_values(
        &self,
        collection: Collection,
        seed: Vec<Value>,
    ) -> Result<Vec<Value>, SyncError> {
        let (_, ticket, loaded) = self.load_routed(collection, seed).await?;
        self.inner
            .subscriptions
            .finish_load(ticket, loaded.items.clone(), loaded.freshness);
        Ok(loaded.items)
    }

    /// Replaces a collection with `items`.
    ///
    /// Every item needs a non-empty string `id`, unique within `items`. The
    /// local replace always happens first and its failure is returned as an
    /// error; a remote failure never is.
    ///
    /// Subscribers receive `items` once the push settles, ordered by when the
    /// local replace committed. Loads overlapping the save publish nothing.
    pub async fn save_values(
        &self,
        collection: Collection,
        items: Vec<Value>,
    ) -> Result<SaveOutcome, SyncError> {
        validate_ids(collection, &items)?;

        let _write = self.inner.subscriptions.begin_write(collection);
        let settings = self.inner.settings.get_settings().await;
        tracing::debug!("Saving {} ({} items) in {} mode", collection, items.len(), settings.mode);

        let Committed { version, outcome } = self
            .routing(&settings)
            .save(collection, items.clone())
            .await?;

        if let Some(warning) = outcome.warning() {
            tracing::warn!("{}: {}", collection, warning);
        }

        self.inner
            .subscriptions
            .publish_write(collection, version, items, Some(outcome.freshness()));
        Ok(outcome)
    }

    /// Runs a routed load without publishing it.
    async fn load_routed(
        &self,
        collection: Collection,
        seed: Vec<Value>,
    ) -> Result<(SyncMode, LoadTicket, Loaded), SyncError> {
        let ticket = self.inner.subscriptions.begin_load(collection);
        let settings = self.inner.settings.get_settings().await;
        tracing::debug!("Loading {} in {} mode", collection, settings.mode);

        let loaded = self.routing(&settings).load(collection, seed).await?;
        Ok((settings.mode, ticket, loaded))
    }

    /// Selects the routing strategy for the given settings.
    pub fn routing(&self, settings: &Settings) -> Box<dyn Routing + '_> {
        match settings.mode {
            SyncMode::Local => Box::new(LocalRouting::new(self, settings.demo_mode)),
            SyncMode::Cloud => Box::new(CloudRouting::new(
                self,
                self.inner.settings.remote_for(settings),
            )),
        }
    }

    /// Freshness as of the latest published snapshot.
    pub fn freshness(&self, collection: Collection) -> Freshness {
        self.inner.subscriptions.freshness(collection)
    }

    pub(crate) fn set_freshness(&self, collection: Collection, freshness: Freshness) {
        self.inner.subscriptions.set_freshness(collection, freshness);
    }

    /// Receives every published snapshot of `collection`.
    pub fn subscribe(&self, collection: Collection) -> watch::Receiver<CollectionUpdate> {
        self.inner.subscriptions.subscribe(collection)
    }

    pub fn subscriptions(&self) -> &Subscriptions {
        &self.inner.subscriptions
    }

    /// Collections waiting in the outbox.
    pub async fn pending_pushes(&self) -> Result<Vec<OutboxEntry>, SyncError> {
        Ok(self.inner.store.outbox_all().await?)
    }

    /// Resolves settings, loads every collection (seeding demo data on first
    /// run) and flushes pushes left over from a previous run.
    pub async fn bootstrap(&self) -> Result<BootstrapReport, SyncError> {
        let settings = self.inner.settings.get_settings().await;
        tracing::info!(
            "Bootstrapping {} in {} mode{}",
            settings.hotel_name,
            settings.mode,
            if settings.demo_mode { " (demo)" } else { "" }
        );

        let mut counts = Vec::with_capacity(Collection::ALL.len());
        for collection in Collection::ALL {
            let items = self
                .load_values(collection, seed::values_for(collection))
                .await?;
            counts.push((collection, items.len()));
        }

        let outbox = self.flush_outbox().await?;

        Ok(BootstrapReport {
            mode: settings.mode,
            demo_mode: settings.demo_mode,
            counts,
            outbox,
        })
    }

    /// Full local replace of one collection. Returns the commit's version.
    pub(crate) async fn replace_local(
        &self,
        collection: Collection,
        items: Vec<Value>,
    ) -> Result<Version, SyncError> {
        let engine = self.clone();
        self.inner
            .store
            .transaction(&[collection], move |tx| {
                Box::pin(async move {
                    tx.clear(collection).await?;
                    tx.bulk_add(collection, &items).await?;
                    Ok::<_, SyncError>(engine.subscriptions().commit(collection))
                })
            })
            .await
    }
}

/// Checks that every item has a non-empty string id and no id repeats.
pub(crate) fn validate_ids(collection: Collection, items: &[Value]) -> Result<(), SyncError> {
    let mut seen = HashSet::with_capacity(items.len());
    for item in items {
        let id = item
            .get("id")
            .and_then(Value::as_str)
            .filter(|id| !id.trim().is_empty())
            .ok_or(SyncError::InvalidRecord { collection })?;

        if !seen.insert(id) {
            return Err(SyncError::DuplicateId {
                collection,
                id: id.to_string(),
            });
        }
    }
    Ok(())
}

fn decode_all<T: Record>(items: Vec<Value>) -> Result<Vec<T>, SyncError> {
    items
        .into_iter()
        .map(|item| {
            serde_json::from_value(item).map_err(|source| SyncError::Decode {
                collection: T::COLLECTION,
                source,
            })
        })
        .collect()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::remote::{MemoryConnector, MemoryRemote, RemoteConfig};
    use crate::settings::Bootstrap;
    use serde_json::json;
    use std::time::Duration;
    use tempfile::TempDir;

    pub(crate) struct TestContext {
        pub engine: SyncEngine,
        pub remote: Arc<MemoryRemote>,
        _temp_dir: TempDir,
    }

    impl TestContext {
        pub fn dir(&self) -> &std::path::Path {
            self._temp_dir.path()
        }
    }

    pub(crate) async fn setup(mode: SyncMode) -> TestContext {
        let temp_dir = TempDir::new().unwrap();
        let store = LocalStore::open(&temp_dir.path().join("test.db"))
            .await
            .unwrap();
        let remote = Arc::new(MemoryRemote::new());
        let connector = MemoryConnector::new(remote.clone());

        let bootstrap = match mode {
            SyncMode::Local => Bootstrap::default(),
            SyncMode::Cloud => Bootstrap {
                hotel_name: "Harbor Inn".to_string(),
                remote: Some(RemoteConfig::new("https://sync.example.com", "harbor", "key")),
                remote_params_supplied: true,
                ..Default::default()
            },
        };
        let settings = SettingsRegistry::init(store.clone(), bootstrap, Arc::new(connector));

        TestContext {
            engine: SyncEngine::new(store, settings),
            remote,
            _temp_dir: temp_dir,
        }
    }

    pub(crate) fn item(id: &str) -> Value {
        json!({ "id": id, "name": format!("item {}", id) })
    }

    fn ids(items: &[Value]) -> Vec<&str> {
        items.iter().filter_map(|i| i["id"].as_str()).collect()
    }

    #[tokio::test]
    async fn test_local_save_and_load() {
        let ctx = setup(SyncMode::Local).await;

        let outcome = ctx
            .engine
            .save_values(Collection::Staff, vec![item("a"), item("b")])
            .await
            .unwrap();
        assert_eq!(outcome, SaveOutcome::LocalOnly);

        let loaded = ctx
            .engine
            .load_values(Collection::Staff, vec![item("seed")])
            .await
            .unwrap();
        assert_eq!(ids(&loaded), vec!["a", "b"]);
        assert_eq!(ctx.engine.freshness(Collection::Staff), Freshness::LocalOnly);
        assert_eq!(ctx.remote.write_count(), 0);
    }

    #[tokio::test]
    async fn test_save_rejects_missing_and_duplicate_ids() {
        let ctx = setup(SyncMode::Local).await;

        let result = ctx
            .engine
            .save_values(Collection::Guests, vec![item("a"), json!({ "id": "" })])
            .await;
        assert!(matches!(result, Err(SyncError::InvalidRecord { .. })));

        let result = ctx
            .engine
            .save_values(Collection::Guests, vec![item("a"), item("a")])
            .await;
        assert!(matches!(result, Err(SyncError::DuplicateId { ref id, .. }) if id == "a"));

        assert_eq!(ctx.engine.store().count(Collection::Guests).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_cloud_save_pushes_and_marks_synced() {
        let ctx = setup(SyncMode::Cloud).await;

        let outcome = ctx
            .engine
            .save_values(Collection::Rooms, vec![item("r1")])
            .await
            .unwrap();

        assert_eq!(outcome, SaveOutcome::Synced);
        assert_eq!(ctx.remote.get(Collection::Rooms), vec![item("r1")]);
        assert_eq!(ctx.engine.freshness(Collection::Rooms), Freshness::Synced);
        assert!(ctx.engine.pending_pushes().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cloud_push_failure_is_deferred_and_queued() {
        let ctx = setup(SyncMode::Cloud).await;
        ctx.remote.fail_writes(
            Collection::Transactions,
            RemoteError::ConnectionError("offline".into()),
        );

        let outcome = ctx
            .engine
            .save_values(Collection::Transactions, vec![item("t1"), item("t2")])
            .await
            .unwrap();

        assert!(matches!(
            outcome,
            SaveOutcome::Deferred { queued: true, .. }
        ));
        assert!(outcome.warning().is_some());
        assert_eq!(
            ctx.engine.freshness(Collection::Transactions),
            Freshness::LocalAhead
        );

        let local = ctx.engine.store().to_array(Collection::Transactions).await.unwrap();
        assert_eq!(ids(&local), vec!["t1", "t2"]);

        let pending = ctx.engine.pending_pushes().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].collection, Collection::Transactions);
    }

    #[tokio::test]
    async fn test_permission_denied_push_is_not_queued() {
        let ctx = setup(SyncMode::Cloud).await;
        ctx.remote.fail_writes(
            Collection::Dnr,
            RemoteError::PermissionDenied("dnr".into()),
        );

        let outcome = ctx
            .engine
            .save_values(Collection::Dnr, vec![item("d1")])
            .await
            .unwrap();

        assert!(matches!(
            outcome,
            SaveOutcome::Deferred { queued: false, .. }
        ));
        assert!(ctx.engine.pending_pushes().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cloud_load_ignores_local_and_seed() {
        let ctx = setup(SyncMode::Cloud).await;
        ctx.engine
            .store()
            .bulk_add(Collection::Guests, vec![item("stale")])
            .await
            .unwrap();
        ctx.remote.put(Collection::Guests, vec![item("remote")]);

        let loaded = ctx
            .engine
            .load_values(Collection::Guests, vec![item("seed")])
            .await
            .unwrap();

        assert_eq!(ids(&loaded), vec!["remote"]);
        assert_eq!(
            ctx.engine.freshness(Collection::Guests),
            Freshness::CloudAuthoritative
        );
        // Remote reads are not mirrored locally
        let local = ctx.engine.store().to_array(Collection::Guests).await.unwrap();
        assert_eq!(ids(&local), vec!["stale"]);
    }

    #[tokio::test]
    async fn test_cloud_load_failure_is_empty_and_observable() {
        let ctx = setup(SyncMode::Cloud).await;
        ctx.remote.put(Collection::Guests, vec![item("remote")]);
        ctx.remote.fail_reads(
            Collection::Guests,
            RemoteError::ConnectionError("timeout".into()),
        );

        let loaded = ctx
            .engine
            .load_values(Collection::Guests, vec![])
            .await
            .unwrap();

        assert!(loaded.is_empty());
        assert_eq!(
            ctx.engine.freshness(Collection::Guests),
            Freshness::RemoteUnavailable
        );
    }

    #[tokio::test]
    async fn test_typed_cloud_load_discards_undecodable() {
        let ctx = setup(SyncMode::Cloud).await;
        ctx.remote
            .put(Collection::Rooms, vec![json!({ "id": "r1", "number": 5 })]);
        let mut rx = ctx.engine.subscribe(Collection::Rooms);

        let rooms = ctx.engine.get_rooms().await.unwrap();
        assert!(rooms.is_empty());
        assert_eq!(
            ctx.engine.freshness(Collection::Rooms),
            Freshness::RemoteUnavailable
        );

        // Subscribers see what the caller got, not the raw documents
        assert!(rx.has_changed().unwrap());
        let update = rx.borrow_and_update().clone();
        assert!(update.items.is_empty());
        assert_eq!(update.freshness, Freshness::RemoteUnavailable);
    }

    #[tokio::test]
    async fn test_load_during_failing_push_keeps_save_and_local_ahead() {
        let ctx = setup(SyncMode::Cloud).await;
        ctx.remote.put(Collection::Guests, vec![item("old")]);
        ctx.remote.delay_writes(Duration::from_millis(300));
        ctx.remote.fail_writes(
            Collection::Guests,
            RemoteError::ConnectionError("timeout".into()),
        );

        let save = {
            let engine = ctx.engine.clone();
            tokio::spawn(async move {
                engine
                    .save_values(Collection::Guests, vec![item("new")])
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;

        let during = ctx
            .engine
            .load_values(Collection::Guests, vec![])
            .await
            .unwrap();
        assert_eq!(ids(&during), vec!["old"]);

        let outcome = save.await.unwrap().unwrap();
        assert!(matches!(outcome, SaveOutcome::Deferred { queued: true, .. }));

        let latest = ctx.engine.subscriptions().latest(Collection::Guests);
        assert_eq!(ids(&latest.items), vec!["new"]);
        assert_eq!(latest.freshness, Freshness::LocalAhead);
        assert_eq!(
            ctx.engine.store().to_array(Collection::Guests).await.unwrap(),
            vec![item("new")]
        );
    }

    #[tokio::test]
    async fn test_interleaved_local_saves_and_loads_settle_on_last_commit() {
        let ctx = setup(SyncMode::Local).await;

        let tasks = (0..12).map(|i| {
            let engine = ctx.engine.clone();
            tokio::spawn(async move {
                if i % 3 == 0 {
                    engine
                        .save_values(Collection::Staff, vec![item(&format!("s{}", i))])
                        .await
                        .map(|_| ())
                } else {
                    engine
                        .load_values(Collection::Staff, Vec::new())
                        .await
                        .map(|_| ())
                }
            })
        });
        for handle in futures::future::join_all(tasks).await {
            handle.unwrap().unwrap();
        }

        let local = ctx.engine.store().to_array(Collection::Staff).await.unwrap();
        let latest = ctx.engine.subscriptions().latest(Collection::Staff);
        assert_eq!(latest.items.as_slice(), local.as_slice());
        assert_eq!(latest.version.generation, 4);
        assert_eq!(latest.freshness, Freshness::LocalOnly);
    }

    #[tokio::test]
    async fn test_save_publishes_snapshot() {
        let ctx = setup(SyncMode::Local).await;
        let mut rx = ctx.engine.subscribe(Collection::Documents);

        ctx.engine
            .save_values(Collection::Documents, vec![item("d1")])
            .await
            .unwrap();

        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().items.len(), 1);
    }

    #[tokio::test]
    async fn test_bootstrap_seeds_demo_data_once() {
        let ctx = setup(SyncMode::Local).await;

        let report = ctx.engine.bootstrap().await.unwrap();
        assert!(report.demo_mode);
        let rooms = report
            .counts
            .iter()
            .find(|(c, _)| *c == Collection::Rooms)
            .map(|(_, n)| *n);
        assert_eq!(rooms, Some(8));

        ctx.engine.bootstrap().await.unwrap();
        assert_eq!(ctx.engine.store().count(Collection::Rooms).await.unwrap(), 8);
    }

    #[test]
    fn test_validate_ids() {
        assert!(validate_ids(Collection::Rooms, &[item("a"), item("b")]).is_ok());
        assert!(validate_ids(Collection::Rooms, &[json!({ "id": 7 })]).is_err());
        assert!(validate_ids(Collection::Rooms, &[json!({ "id": "  " })]).is_err());
    }
}
