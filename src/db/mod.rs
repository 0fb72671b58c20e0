//! The Local Store: durable per-collection keyed storage on the device.
//!
//! Every collection lives in one `records` table keyed by `(collection, id)`.
//! Records are stored as JSON with their insertion position and the values of
//! the collection's status / category / date fields, which back the indexed
//! lookups in [`LocalStore::find_by`].

mod outbox_repo;
mod settings_repo;

pub use outbox_repo::OutboxEntry;

use futures::future::BoxFuture;
use serde_json::Value;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::{Sqlite, Transaction};
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::error::LocalStoreError;
use crate::models::{Collection, IndexField};

/// Handle to the on-device database. Cheap to clone.
#[derive(Debug, Clone)]
pub struct LocalStore {
    pool: SqlitePool,
    locks: Arc<Vec<Mutex<()>>>,
}

impl LocalStore {
    /// Opens (creating if needed) the database at `path` and runs migrations.
    pub async fn open(path: &Path) -> Result<Self, LocalStoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| LocalStoreError::Io(parent.to_path_buf(), e))?;
        }

        let db_url = format!("sqlite:{}?mode=rwc", path.display());

        let options = SqliteConnectOptions::from_str(&db_url)?
            .journal_mode(SqliteJournalMode::Wal)
            .create_if_missing(true);

        // SQLite has a single writer; one connection keeps transactions from
        // failing on read-to-write lock upgrades.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        let locks = Collection::ALL.iter().map(|_| Mutex::new(())).collect();

        Ok(Self {
            pool,
            locks: Arc::new(locks),
        })
    }

    pub async fn count(&self, collection: Collection) -> Result<i64, LocalStoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM records WHERE collection = ?")
            .bind(collection.key())
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// All records of a collection, in insertion order.
    pub async fn to_array(&self, collection: Collection) -> Result<Vec<Value>, LocalStoreError> {
        let rows: Vec<String> =
            sqlx::query_scalar("SELECT data FROM records WHERE collection = ? ORDER BY position")
                .bind(collection.key())
                .fetch_all(&self.pool)
                .await?;

        decode_rows(rows)
    }

    /// Records whose indexed field equals `value`.
    ///
    /// Date lookups match on the calendar day (`YYYY-MM-DD`), so timestamps and
    /// plain dates are found the same way.
    pub async fn find_by(
        &self,
        collection: Collection,
        field: IndexField,
        value: &str,
    ) -> Result<Vec<Value>, LocalStoreError> {
        let column = match field {
            IndexField::Status => "status",
            IndexField::Category => "category",
            IndexField::Date => "record_date",
        };
        let sql = format!(
            "SELECT data FROM records WHERE collection = ? AND {} = ? ORDER BY position",
            column
        );

        let value = match field {
            IndexField::Date => day_of(value),
            _ => value.to_string(),
        };

        let rows: Vec<String> = sqlx::query_scalar(&sql)
            .bind(collection.key())
            .bind(value)
            .fetch_all(&self.pool)
            .await?;

        decode_rows(rows)
    }

    /// Appends records. Use [`LocalStore::transaction`] with `clear` first for a full replace.
    pub async fn bulk_add(
        &self,
        collection: Collection,
        items: Vec<Value>,
    ) -> Result<(), LocalStoreError> {
        self.transaction(&[collection], move |tx| {
            Box::pin(async move { tx.bulk_add(collection, &items).await })
        })
        .await
    }

    pub async fn clear(&self, collection: Collection) -> Result<(), LocalStoreError> {
        self.transaction(&[collection], move |tx| {
            Box::pin(async move { tx.clear(collection).await })
        })
        .await
    }

    /// Runs `f` with write locks on `collections` inside one SQLite transaction.
    ///
    /// Locks are taken in a fixed order. The transaction commits when `f`
    /// returns `Ok` and rolls back otherwise; locks and the transaction are
    /// released on every exit path, including when the future is dropped.
    pub async fn transaction<T, E, F>(&self, collections: &[Collection], f: F) -> Result<T, E>
    where
        E: From<LocalStoreError>,
        F: for<'t> FnOnce(&'t mut LocalTransaction) -> BoxFuture<'t, Result<T, E>>,
    {
        let mut locked = collections.to_vec();
        locked.sort();
        locked.dedup();

        let mut _guards = Vec::with_capacity(locked.len());
        for collection in &locked {
            _guards.push(self.locks[collection.index()].lock().await);
        }

        let tx = self.pool.begin().await.map_err(LocalStoreError::from)?;
        let mut scope = LocalTransaction { tx, locked };

        match f(&mut scope).await {
            Ok(value) => {
                scope.tx.commit().await.map_err(LocalStoreError::from)?;
                Ok(value)
            }
            Err(e) => {
                if let Err(rollback) = scope.tx.rollback().await {
                    tracing::warn!("Rollback failed: {}", rollback);
                }
                Err(e)
            }
        }
    }

    pub(crate) fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// Write access to the collections locked by [`LocalStore::transaction`].
pub struct LocalTransaction {
    tx: Transaction<'static, Sqlite>,
    locked: Vec<Collection>,
}

impl LocalTransaction {
    fn check(&self, collection: Collection) -> Result<(), LocalStoreError> {
        if self.locked.contains(&collection) {
            Ok(())
        } else {
            Err(LocalStoreError::NotLocked(collection))
        }
    }

    pub async fn count(&mut self, collection: Collection) -> Result<i64, LocalStoreError> {
        self.check(collection)?;
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM records WHERE collection = ?")
            .bind(collection.key())
            .fetch_one(&mut *self.tx)
            .await?;
        Ok(count)
    }

    pub async fn to_array(&mut self, collection: Collection) -> Result<Vec<Value>, LocalStoreError> {
        self.check(collection)?;
        let rows: Vec<String> =
            sqlx::query_scalar("SELECT data FROM records WHERE collection = ? ORDER BY position")
                .bind(collection.key())
                .fetch_all(&mut *self.tx)
                .await?;

        decode_rows(rows)
    }

    pub async fn clear(&mut self, collection: Collection) -> Result<(), LocalStoreError> {
        self.check(collection)?;
        sqlx::query("DELETE FROM records WHERE collection = ?")
            .bind(collection.key())
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    pub async fn bulk_add(
        &mut self,
        collection: Collection,
        items: &[Value],
    ) -> Result<(), LocalStoreError> {
        self.check(collection)?;

        let mut position: i64 = sqlx::query_scalar(
            "SELECT COALESCE(MAX(position) + 1, 0) FROM records WHERE collection = ?",
        )
        .bind(collection.key())
        .fetch_one(&mut *self.tx)
        .await?;

        for item in items {
            let id = item
                .get("id")
                .and_then(Value::as_str)
                .ok_or(LocalStoreError::MissingId(collection))?;
            let data = serde_json::to_string(item)?;

            sqlx::query(
                r#"
                INSERT INTO records (collection, id, data, position, status, category, record_date)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(collection.key())
            .bind(id)
            .bind(&data)
            .bind(position)
            .bind(index_value(collection, IndexField::Status, item))
            .bind(index_value(collection, IndexField::Category, item))
            .bind(index_value(collection, IndexField::Date, item))
            .execute(&mut *self.tx)
            .await?;

            position += 1;
        }

        Ok(())
    }

    pub(crate) fn conn(&mut self) -> &mut sqlx::SqliteConnection {
        &mut *self.tx
    }
}

fn decode_rows(rows: Vec<String>) -> Result<Vec<Value>, LocalStoreError> {
    rows.iter()
        .map(|row| serde_json::from_str(row).map_err(LocalStoreError::from))
        .collect()
}

fn index_value(collection: Collection, field: IndexField, item: &Value) -> Option<String> {
    let source = collection.index_source(field)?;
    let value = match item.get(source)? {
        Value::Null => return None,
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };

    match field {
        IndexField::Date => Some(day_of(&value)),
        _ => Some(value),
    }
}

fn day_of(value: &str) -> String {
    value.get(..10).unwrap_or(value).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    struct TestContext {
        store: LocalStore,
        _temp_dir: TempDir, // Keep alive for duration of test
    }

    async fn setup_store() -> TestContext {
        let temp_dir = TempDir::new().unwrap();
        let store = LocalStore::open(&temp_dir.path().join("test.db"))
            .await
            .unwrap();
        TestContext {
            store,
            _temp_dir: temp_dir,
        }
    }

    fn room(id: &str, status: &str) -> Value {
        json!({ "id": id, "number": id, "type": "single", "status": status })
    }

    #[tokio::test]
    async fn test_open_creates_tables() {
        let ctx = setup_store().await;

        let tables: Vec<(String,)> = sqlx::query_as(
            "SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%' AND name NOT LIKE '_sqlx_%' ORDER BY name",
        )
        .fetch_all(ctx.store.pool())
        .await
        .unwrap();

        let table_names: Vec<&str> = tables.iter().map(|t| t.0.as_str()).collect();
        assert_eq!(table_names, vec!["outbox", "records", "settings"]);
    }

    #[tokio::test]
    async fn test_bulk_add_preserves_order() {
        let ctx = setup_store().await;
        let store = &ctx.store;

        store
            .bulk_add(Collection::Rooms, vec![room("b", "available"), room("a", "occupied")])
            .await
            .unwrap();
        store
            .bulk_add(Collection::Rooms, vec![room("c", "available")])
            .await
            .unwrap();

        let ids: Vec<String> = store
            .to_array(Collection::Rooms)
            .await
            .unwrap()
            .iter()
            .map(|r| r["id"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(ids, vec!["b", "a", "c"]);
        assert_eq!(store.count(Collection::Rooms).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_collections_are_isolated() {
        let ctx = setup_store().await;
        let store = &ctx.store;

        store
            .bulk_add(Collection::Rooms, vec![room("same-id", "available")])
            .await
            .unwrap();
        store
            .bulk_add(Collection::Guests, vec![json!({ "id": "same-id", "name": "Guest" })])
            .await
            .unwrap();

        store.clear(Collection::Rooms).await.unwrap();
        assert_eq!(store.count(Collection::Rooms).await.unwrap(), 0);
        assert_eq!(store.count(Collection::Guests).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_find_by_indexes() {
        let ctx = setup_store().await;
        let store = &ctx.store;

        store
            .bulk_add(
                Collection::Rooms,
                vec![room("1", "available"), room("2", "cleaning"), room("3", "available")],
            )
            .await
            .unwrap();
        store
            .bulk_add(
                Collection::Maintenance,
                vec![json!({
                    "id": "t1",
                    "status": "open",
                    "priority": "high",
                    "reportedAt": "2025-06-01T09:30:00Z"
                })],
            )
            .await
            .unwrap();

        let available = store
            .find_by(Collection::Rooms, IndexField::Status, "available")
            .await
            .unwrap();
        assert_eq!(available.len(), 2);

        let singles = store
            .find_by(Collection::Rooms, IndexField::Category, "single")
            .await
            .unwrap();
        assert_eq!(singles.len(), 3);

        let on_day = store
            .find_by(Collection::Maintenance, IndexField::Date, "2025-06-01")
            .await
            .unwrap();
        assert_eq!(on_day.len(), 1);
        assert_eq!(on_day[0]["id"], "t1");
    }

    #[tokio::test]
    async fn test_transaction_rolls_back_on_error() {
        let ctx = setup_store().await;
        let store = &ctx.store;

        store
            .bulk_add(Collection::Rooms, vec![room("keep", "available")])
            .await
            .unwrap();

        let result: Result<(), LocalStoreError> = store
            .transaction(&[Collection::Rooms], |tx| {
                Box::pin(async move {
                    tx.clear(Collection::Rooms).await?;
                    // Duplicate primary key aborts the whole transaction
                    tx.bulk_add(Collection::Rooms, &[room("x", "available"), room("x", "available")])
                        .await
                })
            })
            .await;

        assert!(result.is_err());
        let rooms = store.to_array(Collection::Rooms).await.unwrap();
        assert_eq!(rooms.len(), 1);
        assert_eq!(rooms[0]["id"], "keep");
    }

    #[tokio::test]
    async fn test_transaction_rejects_unlocked_collection() {
        let ctx = setup_store().await;

        let result: Result<(), LocalStoreError> = ctx
            .store
            .transaction(&[Collection::Rooms], |tx| {
                Box::pin(async move { tx.clear(Collection::Guests).await })
            })
            .await;

        assert!(matches!(
            result,
            Err(LocalStoreError::NotLocked(Collection::Guests))
        ));
    }

    #[tokio::test]
    async fn test_bulk_add_requires_id() {
        let ctx = setup_store().await;

        let result = ctx
            .store
            .bulk_add(Collection::Staff, vec![json!({ "name": "No Id" })])
            .await;

        assert!(matches!(
            result,
            Err(LocalStoreError::MissingId(Collection::Staff))
        ));
        assert_eq!(ctx.store.count(Collection::Staff).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_replaces_are_serialized() {
        let ctx = setup_store().await;
        let store = ctx.store.clone();

        let mut handles = Vec::new();
        for n in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                let items: Vec<Value> = (0..5).map(|i| room(&format!("{n}-{i}"), "available")).collect();
                store
                    .transaction(&[Collection::Rooms], move |tx| {
                        Box::pin(async move {
                            tx.clear(Collection::Rooms).await?;
                            tx.bulk_add(Collection::Rooms, &items).await
                        })
                    })
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        // Whichever replace committed last, it is whole
        let rooms = store.to_array(Collection::Rooms).await.unwrap();
        assert_eq!(rooms.len(), 5);
        let prefix = rooms[0]["id"].as_str().unwrap().split('-').next().unwrap().to_string();
        assert!(rooms
            .iter()
            .all(|r| r["id"].as_str().unwrap().starts_with(&format!("{prefix}-"))));
    }
}
