//! Backup and restore of the Local Store.
//!
//! Snapshots are read from and written to the Local Store only; importing
//! never touches the remote. A save per collection is needed afterwards to
//! push imported data to the cloud.
//!
//! Exported settings never carry the remote API key. Importing settings whose
//! key is empty keeps the key already stored.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::Path;

use super::{validate_ids, SyncEngine};
use crate::error::SyncError;
use crate::models::Collection;
use crate::settings::Settings;

pub const SNAPSHOT_VERSION: &str = "1";

/// A point-in-time export of every collection plus settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: String,
    /// RFC 3339 export time.
    pub timestamp: String,
    /// Records keyed by collection key.
    pub data: BTreeMap<String, Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<Settings>,
}

impl Snapshot {
    pub fn collection(&self, collection: Collection) -> &[Value] {
        self.data
            .get(collection.key())
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

/// A snapshot that passed validation and is ready to be written.
struct ValidatedImport {
    collections: Vec<(Collection, Vec<Value>)>,
    settings: Option<Settings>,
}

fn invalid(msg: impl Into<String>) -> SyncError {
    SyncError::InvalidFormat(msg.into())
}

/// Checks the whole bundle before anything is written.
fn validate(bundle: Value) -> Result<ValidatedImport, SyncError> {
    let Value::Object(mut root) = bundle else {
        return Err(invalid("expected a JSON object"));
    };

    let version = root
        .get("version")
        .and_then(Value::as_str)
        .ok_or_else(|| invalid("missing 'version'"))?;
    let major = version.split('.').next().unwrap_or_default();
    if major != SNAPSHOT_VERSION {
        return Err(invalid(format!("unsupported version '{}'", version)));
    }

    if !root.get("timestamp").is_some_and(Value::is_string) {
        return Err(invalid("missing 'timestamp'"));
    }

    let Some(Value::Object(data)) = root.remove("data") else {
        return Err(invalid("missing 'data' object"));
    };

    let collections = validate_data(data)?;

    let settings = match root.remove("settings") {
        None | Some(Value::Null) => None,
        Some(value) => Some(
            serde_json::from_value(value)
                .map_err(|e| invalid(format!("invalid settings: {}", e)))?,
        ),
    };

    Ok(ValidatedImport {
        collections,
        settings,
    })
}

fn validate_data(data: Map<String, Value>) -> Result<Vec<(Collection, Vec<Value>)>, SyncError> {
    let mut collections = Vec::new();

    for (key, value) in data {
        let Some(collection) = Collection::from_key(&key) else {
            tracing::debug!("Ignoring unknown snapshot key '{}'", key);
            continue;
        };

        let Value::Array(items) = value else {
            return Err(invalid(format!("'{}' is not an array", key)));
        };
        if !items.iter().all(Value::is_object) {
            return Err(invalid(format!("'{}' contains a non-object record", key)));
        }
        validate_ids(collection, &items).map_err(|e| invalid(e.to_string()))?;

        collections.push((collection, items));
    }

    Ok(collections)
}

impl SyncEngine {
    /// Exports every collection from the Local Store, plus current settings
    /// with the remote API key blanked.
    pub async fn export_snapshot(&self) -> Result<Snapshot, SyncError> {
        let mut data = BTreeMap::new();
        for collection in Collection::ALL {
            let items = self.store().to_array(collection).await?;
            data.insert(collection.key().to_string(), items);
        }

        let mut settings = self.settings().get_settings().await;
        if let Some(remote) = settings.remote.as_mut() {
            remote.api_key.clear();
        }

        Ok(Snapshot {
            version: SNAPSHOT_VERSION.to_string(),
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            data,
            settings: Some(settings),
        })
    }

    /// Replaces every collection present in `bundle`, atomically.
    ///
    /// The bundle is validated in full first; on any problem nothing is
    /// written. Collections absent from the bundle are left as they are.
    /// Returns the imported collections.
    pub async fn import_snapshot(&self, bundle: Value) -> Result<Vec<Collection>, SyncError> {
        let ValidatedImport {
            collections,
            settings,
        } = validate(bundle)?;

        let settings = match settings {
            Some(imported) => Some(self.keep_stored_api_key(imported).await),
            None => None,
        };

        let locked: Vec<Collection> = collections.iter().map(|(c, _)| *c).collect();
        let _writes: Vec<_> = locked
            .iter()
            .map(|c| self.subscriptions().begin_write(*c))
            .collect();

        let has_settings = settings.is_some();
        let written = collections.clone();
        let engine = self.clone();
        let versions = self
            .store()
            .transaction(&locked, move |tx| {
                Box::pin(async move {
                    let mut versions = Vec::with_capacity(written.len());
                    for (collection, items) in &written {
                        tx.clear(*collection).await?;
                        tx.bulk_add(*collection, items).await?;
                        versions.push(engine.subscriptions().commit(*collection));
                    }
                    if let Some(settings) = &settings {
                        tx.store_settings(settings).await?;
                    }
                    Ok::<_, SyncError>(versions)
                })
            })
            .await?;

        if has_settings {
            // Refresh the registry cache and remote client from the imported row
            self.settings().get_settings().await;
        }

        for (version, (collection, items)) in versions.into_iter().zip(collections) {
            tracing::info!("Imported {} {}", items.len(), collection);
            self.subscriptions()
                .publish_write(collection, version, items, None);
        }

        Ok(locked)
    }

    /// Fills a blank remote API key in imported settings from the stored one.
    async fn keep_stored_api_key(&self, mut imported: Settings) -> Settings {
        let Some(remote) = imported.remote.as_mut() else {
            return imported;
        };
        if !remote.api_key.is_empty() {
            return imported;
        }

        let current = self.settings().get_settings().await;
        if let Some(stored) = current.remote {
            remote.api_key = stored.api_key;
        }
        imported
    }

    pub async fn write_snapshot(&self, path: &Path) -> Result<Snapshot, SyncError> {
        let snapshot = self.export_snapshot().await?;
        let json = serde_json::to_string_pretty(&snapshot)?;
        tokio::fs::write(path, json).await?;
        tracing::info!("Snapshot written to {}", path.display());
        Ok(snapshot)
    }

    pub async fn read_snapshot(&self, path: &Path) -> Result<Vec<Collection>, SyncError> {
        let contents = tokio::fs::read_to_string(path).await?;
        let bundle: Value = serde_json::from_str(&contents)
            .map_err(|e| invalid(format!("{}: {}", path.display(), e)))?;
        self.import_snapshot(bundle).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::tests::{item, setup};
    use crate::settings::SyncMode;
    use serde_json::json;

    fn bundle(data: Value) -> Value {
        json!({ "version": "1", "timestamp": "2025-06-01T00:00:00Z", "data": data })
    }

    #[tokio::test]
    async fn test_export_reads_local_only() {
        let ctx = setup(SyncMode::Cloud).await;
        ctx.engine
            .store()
            .bulk_add(Collection::Rooms, vec![item("local")])
            .await
            .unwrap();
        ctx.remote.put(Collection::Rooms, vec![item("remote")]);

        let snapshot = ctx.engine.export_snapshot().await.unwrap();

        assert_eq!(snapshot.version, "1");
        assert_eq!(snapshot.collection(Collection::Rooms), &[item("local")]);
        assert_eq!(snapshot.data.len(), Collection::ALL.len());
        assert!(snapshot.settings.is_some());
    }

    #[tokio::test]
    async fn test_export_blanks_api_key_and_import_keeps_stored_key() {
        let ctx = setup(SyncMode::Cloud).await;

        let snapshot = ctx.engine.export_snapshot().await.unwrap();
        let json = serde_json::to_string(&snapshot).unwrap();
        assert!(!json.contains("\"apiKey\":\"key\""));
        let exported = snapshot.settings.clone().unwrap();
        assert_eq!(exported.remote.as_ref().unwrap().api_key, "");
        assert_eq!(exported.remote.as_ref().unwrap().tenant_id, "harbor");

        ctx.engine
            .import_snapshot(serde_json::to_value(&snapshot).unwrap())
            .await
            .unwrap();

        let settings = ctx.engine.settings().get_settings().await;
        assert_eq!(settings.remote.unwrap().api_key, "key");
    }

    #[tokio::test]
    async fn test_import_with_explicit_api_key_uses_it() {
        let ctx = setup(SyncMode::Cloud).await;
        let mut settings = ctx.engine.settings().get_settings().await;
        if let Some(remote) = settings.remote.as_mut() {
            remote.api_key = "rotated".to_string();
        }

        let mut value = bundle(json!({}));
        value["settings"] = serde_json::to_value(&settings).unwrap();
        ctx.engine.import_snapshot(value).await.unwrap();

        let stored = ctx.engine.settings().get_settings().await;
        assert_eq!(stored.remote.unwrap().api_key, "rotated");
    }

    #[tokio::test]
    async fn test_import_rejects_bad_shape_without_writing() {
        let ctx = setup(SyncMode::Local).await;
        ctx.engine
            .store()
            .bulk_add(Collection::Guests, vec![item("keep")])
            .await
            .unwrap();

        let cases = vec![
            json!([1, 2, 3]),
            json!({ "timestamp": "x", "data": {} }),
            json!({ "version": "2", "timestamp": "x", "data": {} }),
            json!({ "version": "1", "data": {} }),
            json!({ "version": "1", "timestamp": "x", "data": [] }),
            bundle(json!({ "guests": "nope" })),
            bundle(json!({ "guests": [item("a"), { "name": "no id" }] })),
            bundle(json!({ "rooms": [item("r")], "guests": [item("a"), item("a")] })),
        ];

        for case in cases {
            let result = ctx.engine.import_snapshot(case.clone()).await;
            assert!(
                matches!(result, Err(SyncError::InvalidFormat(_))),
                "accepted {}",
                case
            );
        }

        let guests = ctx.engine.store().to_array(Collection::Guests).await.unwrap();
        assert_eq!(guests, vec![item("keep")]);
        assert_eq!(ctx.engine.store().count(Collection::Rooms).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_import_replaces_present_and_ignores_unknown() {
        let ctx = setup(SyncMode::Local).await;
        ctx.engine
            .store()
            .bulk_add(Collection::Guests, vec![item("old")])
            .await
            .unwrap();
        ctx.engine
            .store()
            .bulk_add(Collection::Staff, vec![item("untouched")])
            .await
            .unwrap();

        let imported = ctx
            .engine
            .import_snapshot(bundle(json!({
                "guests": [item("new1"), item("new2")],
                "invoices": [{ "whatever": true }]
            })))
            .await
            .unwrap();

        assert_eq!(imported, vec![Collection::Guests]);
        let guests = ctx.engine.store().to_array(Collection::Guests).await.unwrap();
        assert_eq!(guests, vec![item("new1"), item("new2")]);
        let staff = ctx.engine.store().to_array(Collection::Staff).await.unwrap();
        assert_eq!(staff, vec![item("untouched")]);
    }

    #[tokio::test]
    async fn test_import_matches_keys_exactly() {
        let ctx = setup(SyncMode::Local).await;

        let imported = ctx
            .engine
            .import_snapshot(bundle(json!({
                "rooms": [item("r1")],
                "ROOMS": [item("shadow")],
                "Feature-Requests": [item("f1")]
            })))
            .await
            .unwrap();

        assert_eq!(imported, vec![Collection::Rooms]);
        let rooms = ctx.engine.store().to_array(Collection::Rooms).await.unwrap();
        assert_eq!(rooms, vec![item("r1")]);
        assert_eq!(
            ctx.engine.store().count(Collection::FeatureRequests).await.unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn test_import_publishes_after_earlier_saves() {
        let ctx = setup(SyncMode::Local).await;
        ctx.engine
            .save_values(Collection::Guests, vec![item("saved")])
            .await
            .unwrap();

        ctx.engine
            .import_snapshot(bundle(json!({ "guests": [item("imported")] })))
            .await
            .unwrap();

        let latest = ctx.engine.subscriptions().latest(Collection::Guests);
        assert_eq!(latest.items.as_slice(), &[item("imported")]);
        assert_eq!(latest.version.generation, 2);
    }

    #[tokio::test]
    async fn test_import_never_touches_remote() {
        let ctx = setup(SyncMode::Cloud).await;

        ctx.engine
            .import_snapshot(bundle(json!({ "rooms": [item("r1")] })))
            .await
            .unwrap();

        assert_eq!(ctx.remote.write_count(), 0);
        assert!(ctx.engine.pending_pushes().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_import_restores_settings() {
        let ctx = setup(SyncMode::Local).await;
        let mut settings = ctx.engine.settings().get_settings().await;
        settings.hotel_name = "Imported Hotel".to_string();
        settings.demo_mode = false;

        let mut value = bundle(json!({}));
        value["settings"] = serde_json::to_value(&settings).unwrap();
        ctx.engine.import_snapshot(value).await.unwrap();

        assert_eq!(ctx.engine.settings().cached_settings(), settings);
        assert_eq!(ctx.engine.settings().get_settings().await, settings);
    }

    #[tokio::test]
    async fn test_file_round_trip() {
        let ctx = setup(SyncMode::Local).await;
        ctx.engine
            .save_values(Collection::Transactions, vec![item("t1"), item("t2")])
            .await
            .unwrap();

        let path = ctx.dir().join("backup.json");
        ctx.engine.write_snapshot(&path).await.unwrap();

        ctx.engine.store().clear(Collection::Transactions).await.unwrap();
        ctx.engine.read_snapshot(&path).await.unwrap();

        let restored = ctx
            .engine
            .store()
            .to_array(Collection::Transactions)
            .await
            .unwrap();
        assert_eq!(restored, vec![item("t1"), item("t2")]);
    }
}
