//! Error types shared by the stores and the sync engine.

use thiserror::Error;

use crate::models::Collection;

/// Errors raised by the Local Store.
///
/// Local failures are unexpected (the medium is on-device and durable), so the
/// engine always propagates them to the caller.
#[derive(Debug, Error)]
pub enum LocalStoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("failed to encode record: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("failed to prepare database directory {0}: {1}")]
    Io(std::path::PathBuf, std::io::Error),

    #[error("collection '{0}' is not locked by this transaction")]
    NotLocked(Collection),

    #[error("record in '{0}' has no id")]
    MissingId(Collection),
}

/// Errors raised by the Remote Store adapter.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RemoteError {
    /// No remote client has been initialized.
    #[error("remote store is not connected")]
    NotConnected,

    /// Transport failure, timeout or unexpected server response.
    #[error("remote connection error: {0}")]
    ConnectionError(String),

    /// The credentials lack read or write rights for the collection.
    #[error("permission denied: {0}")]
    PermissionDenied(String),
}

impl RemoteError {
    /// Whether retrying the same request later could succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::NotConnected | Self::ConnectionError(_))
    }
}

/// Errors surfaced by the sync engine.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Local(#[from] LocalStoreError),

    #[error("invalid snapshot: {0}")]
    InvalidFormat(String),

    #[error("record in '{collection}' has no id")]
    InvalidRecord { collection: Collection },

    #[error("duplicate id '{id}' in '{collection}'")]
    DuplicateId { collection: Collection, id: String },

    #[error("failed to decode '{collection}' record: {source}")]
    Decode {
        collection: Collection,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode record: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("snapshot file error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<sqlx::Error> for SyncError {
    fn from(e: sqlx::Error) -> Self {
        SyncError::Local(LocalStoreError::Database(e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(RemoteError::NotConnected.is_retryable());
        assert!(RemoteError::ConnectionError("timeout".into()).is_retryable());
        assert!(!RemoteError::PermissionDenied("guests".into()).is_retryable());
    }

    #[test]
    fn test_error_display() {
        let err = SyncError::DuplicateId {
            collection: Collection::Rooms,
            id: "r1".to_string(),
        };
        assert_eq!(err.to_string(), "duplicate id 'r1' in 'rooms'");

        let err = SyncError::InvalidFormat("missing data".to_string());
        assert!(err.to_string().contains("missing data"));
    }
}
