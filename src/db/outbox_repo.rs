use chrono::{DateTime, SecondsFormat, Utc};

use super::LocalStore;
use crate::error::LocalStoreError;
use crate::models::Collection;

/// A collection whose local contents still have to reach the remote store.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboxEntry {
    pub collection: Collection,
    pub attempts: u32,
    pub last_error: Option<String>,
    pub enqueued_at: DateTime<Utc>,
    pub next_attempt_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct OutboxRow {
    collection: String,
    attempts: i64,
    last_error: Option<String>,
    enqueued_at: String,
    next_attempt_at: String,
}

impl OutboxRow {
    fn into_entry(self) -> Option<OutboxEntry> {
        let collection = Collection::from_key(&self.collection)?;
        Some(OutboxEntry {
            collection,
            attempts: u32::try_from(self.attempts.max(0)).unwrap_or(u32::MAX),
            last_error: self.last_error,
            enqueued_at: parse_time(&self.enqueued_at),
            next_attempt_at: parse_time(&self.next_attempt_at),
        })
    }
}

// Fixed-width UTC timestamps compare correctly as text.
fn format_time(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_time(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

impl LocalStore {
    /// Queues a collection for pushing. An existing entry keeps its attempt
    /// count but becomes due immediately.
    pub async fn outbox_upsert(
        &self,
        collection: Collection,
        error: &str,
    ) -> Result<(), LocalStoreError> {
        let now = format_time(Utc::now());
        sqlx::query(
            r#"
            INSERT INTO outbox (collection, attempts, last_error, enqueued_at, next_attempt_at)
            VALUES (?, 0, ?, ?, ?)
            ON CONFLICT(collection) DO UPDATE
            SET last_error = excluded.last_error, next_attempt_at = excluded.next_attempt_at
            "#,
        )
        .bind(collection.key())
        .bind(error)
        .bind(&now)
        .bind(&now)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    /// Records a failed push and when to try again.
    pub async fn outbox_record_failure(
        &self,
        collection: Collection,
        error: &str,
        next_attempt_at: DateTime<Utc>,
    ) -> Result<(), LocalStoreError> {
        sqlx::query(
            "UPDATE outbox SET attempts = attempts + 1, last_error = ?, next_attempt_at = ? WHERE collection = ?",
        )
        .bind(error)
        .bind(format_time(next_attempt_at))
        .bind(collection.key())
        .execute(self.pool())
        .await?;
        Ok(())
    }

    pub async fn outbox_remove(&self, collection: Collection) -> Result<(), LocalStoreError> {
        sqlx::query("DELETE FROM outbox WHERE collection = ?")
            .bind(collection.key())
            .execute(self.pool())
            .await?;
        Ok(())
    }

    pub async fn outbox_all(&self) -> Result<Vec<OutboxEntry>, LocalStoreError> {
        let rows: Vec<OutboxRow> = sqlx::query_as("SELECT * FROM outbox ORDER BY enqueued_at")
            .fetch_all(self.pool())
            .await?;
        Ok(rows.into_iter().filter_map(OutboxRow::into_entry).collect())
    }

    /// Entries whose next attempt is at or before `now`.
    pub async fn outbox_due(&self, now: DateTime<Utc>) -> Result<Vec<OutboxEntry>, LocalStoreError> {
        let rows: Vec<OutboxRow> = sqlx::query_as(
            "SELECT * FROM outbox WHERE next_attempt_at <= ? ORDER BY enqueued_at",
        )
        .bind(format_time(now))
        .fetch_all(self.pool())
        .await?;
        Ok(rows.into_iter().filter_map(OutboxRow::into_entry).collect())
    }
}
