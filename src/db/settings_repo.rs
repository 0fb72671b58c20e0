use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::{LocalStore, LocalTransaction};
use crate::error::LocalStoreError;

/// Fixed key of the singleton settings row.
const SETTINGS_KEY: &str = "app";

impl LocalStore {
    /// Reads the settings row, if one has been saved.
    pub async fn load_settings<T: DeserializeOwned>(&self) -> Result<Option<T>, LocalStoreError> {
        let row: Option<String> = sqlx::query_scalar("SELECT data FROM settings WHERE key = ?")
            .bind(SETTINGS_KEY)
            .fetch_optional(self.pool())
            .await?;

        match row {
            Some(data) => Ok(Some(serde_json::from_str(&data)?)),
            None => Ok(None),
        }
    }

    /// Replaces the settings row.
    pub async fn store_settings<T: Serialize>(&self, settings: &T) -> Result<(), LocalStoreError> {
        let data = serde_json::to_string(settings)?;
        upsert(self.pool(), &data).await
    }

    pub async fn delete_settings(&self) -> Result<(), LocalStoreError> {
        sqlx::query("DELETE FROM settings WHERE key = ?")
            .bind(SETTINGS_KEY)
            .execute(self.pool())
            .await?;
        Ok(())
    }
}

impl LocalTransaction {
    /// Replaces the settings row as part of this transaction.
    pub async fn store_settings<T: Serialize>(&mut self, settings: &T) -> Result<(), LocalStoreError> {
        let data = serde_json::to_string(settings)?;
        upsert(self.conn(), &data).await
    }
}

async fn upsert<'e, E>(executor: E, data: &str) -> Result<(), LocalStoreError>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    sqlx::query(
        r#"
        INSERT INTO settings (key, data, updated_at) VALUES (?, ?, ?)
        ON CONFLICT(key) DO UPDATE SET data = excluded.data, updated_at = excluded.updated_at
        "#,
    )
    .bind(SETTINGS_KEY)
    .bind(data)
    .bind(Utc::now().to_rfc3339())
    .execute(executor)
    .await?;
    Ok(())
}
