//! Server-side collection storage.
//!
//! Stores one JSON document per tenant per collection:
//! ```text
//! <DATA_DIR>/
//!   <tenant_id>/
//!     rooms.json
//!     guests.json
//!     ...
//! ```
//!
//! Writes go to a uniquely named temp file that is renamed over the target,
//! so a reader sees either the old or the new list, never a mix.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;

use crate::models::Collection;

#[derive(Serialize, Deserialize)]
struct StoredCollection {
    items: Vec<Value>,
}

/// Errors that can occur during server storage operations.
#[derive(Debug)]
pub enum ServerStorageError {
    /// I/O error reading or writing a file.
    IoError(PathBuf, io::Error),
    /// A stored document is not valid JSON.
    CorruptDocument(PathBuf, String),
    /// Invalid tenant ID (e.g., contains path separators).
    InvalidTenantId(String),
}

impl std::fmt::Display for ServerStorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServerStorageError::IoError(path, e) => {
                write!(f, "I/O error for {}: {}", path.display(), e)
            }
            ServerStorageError::CorruptDocument(path, e) => {
                write!(f, "Failed to parse {}: {}", path.display(), e)
            }
            ServerStorageError::InvalidTenantId(id) => {
                write!(f, "Invalid tenant ID: {}", id)
            }
        }
    }
}

impl std::error::Error for ServerStorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ServerStorageError::IoError(_, e) => Some(e),
            _ => None,
        }
    }
}

/// Per-tenant collection documents under a data directory.
#[derive(Debug, Clone)]
pub struct ServerStorage {
    data_dir: PathBuf,
}

impl ServerStorage {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    /// Rejects tenant IDs that could escape the data directory.
    pub fn validate_tenant_id(tenant_id: &str) -> Result<(), ServerStorageError> {
        if tenant_id.is_empty()
            || tenant_id.contains('/')
            || tenant_id.contains('\\')
            || tenant_id.contains("..")
            || tenant_id.starts_with('.')
        {
            return Err(ServerStorageError::InvalidTenantId(tenant_id.to_string()));
        }
        Ok(())
    }

    fn tenant_dir(&self, tenant_id: &str) -> PathBuf {
        self.data_dir.join(tenant_id)
    }

    fn doc_path(&self, tenant_id: &str, collection: Collection) -> PathBuf {
        self.tenant_dir(tenant_id)
            .join(format!("{}.json", collection.key()))
    }

    /// Loads a tenant's collection. A collection never written is empty.
    pub fn load(
        &self,
        tenant_id: &str,
        collection: Collection,
    ) -> Result<Vec<Value>, ServerStorageError> {
        Self::validate_tenant_id(tenant_id)?;

        let path = self.doc_path(tenant_id, collection);

        match fs::read(&path) {
            Ok(bytes) => {
                let doc: StoredCollection = serde_json::from_slice(&bytes)
                    .map_err(|e| ServerStorageError::CorruptDocument(path, e.to_string()))?;
                Ok(doc.items)
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(ServerStorageError::IoError(path, e)),
        }
    }

    /// Replaces a tenant's collection with `items`.
    ///
    /// Creates the tenant directory if it doesn't exist.
    pub fn save(
        &self,
        tenant_id: &str,
        collection: Collection,
        items: &[Value],
    ) -> Result<(), ServerStorageError> {
        Self::validate_tenant_id(tenant_id)?;

        let tenant_dir = self.tenant_dir(tenant_id);
        let path = self.doc_path(tenant_id, collection);

        fs::create_dir_all(&tenant_dir)
            .map_err(|e| ServerStorageError::IoError(tenant_dir.clone(), e))?;

        let bytes = serde_json::to_vec(&StoredCollection {
            items: items.to_vec(),
        })
        .map_err(|e| ServerStorageError::CorruptDocument(path.clone(), e.to_string()))?;

        // Unique temp name so concurrent writers never share a file
        let temp_path = tenant_dir.join(format!(
            ".{}.{}.tmp",
            collection.key(),
            uuid::Uuid::new_v4()
        ));

        let mut file = fs::File::create(&temp_path)
            .map_err(|e| ServerStorageError::IoError(temp_path.clone(), e))?;

        file.write_all(&bytes)
            .map_err(|e| ServerStorageError::IoError(temp_path.clone(), e))?;

        file.sync_all()
            .map_err(|e| ServerStorageError::IoError(temp_path.clone(), e))?;

        if let Err(e) = fs::rename(&temp_path, &path) {
            let _ = fs::remove_file(&temp_path);
            return Err(ServerStorageError::IoError(path, e));
        }

        Ok(())
    }

    pub fn exists(
        &self,
        tenant_id: &str,
        collection: Collection,
    ) -> Result<bool, ServerStorageError> {
        Self::validate_tenant_id(tenant_id)?;
        Ok(self.doc_path(tenant_id, collection).exists())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn setup() -> (ServerStorage, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let storage = ServerStorage::new(temp_dir.path());
        (storage, temp_dir)
    }

    #[test]
    fn test_validate_tenant_id() {
        // Valid
        assert!(ServerStorage::validate_tenant_id("harbor").is_ok());
        assert!(ServerStorage::validate_tenant_id("harbor-inn").is_ok());
        assert!(ServerStorage::validate_tenant_id("tenant_123").is_ok());

        // Invalid
        assert!(ServerStorage::validate_tenant_id("").is_err());
        assert!(ServerStorage::validate_tenant_id("../evil").is_err());
        assert!(ServerStorage::validate_tenant_id("foo/bar").is_err());
        assert!(ServerStorage::validate_tenant_id("foo\\bar").is_err());
        assert!(ServerStorage::validate_tenant_id(".hidden").is_err());
    }

    #[test]
    fn test_load_unwritten_is_empty() {
        let (storage, _temp) = setup();
        assert!(storage.load("harbor", Collection::Rooms).unwrap().is_empty());
        assert!(!storage.exists("harbor", Collection::Rooms).unwrap());
    }

    #[test]
    fn test_save_replaces_whole_list() {
        let (storage, temp) = setup();

        storage
            .save("harbor", Collection::Guests, &[json!({ "id": "g1" }), json!({ "id": "g2" })])
            .unwrap();
        storage
            .save("harbor", Collection::Guests, &[json!({ "id": "g3" })])
            .unwrap();

        let items = storage.load("harbor", Collection::Guests).unwrap();
        assert_eq!(items, vec![json!({ "id": "g3" })]);
        assert!(temp.path().join("harbor").join("guests.json").exists());

        // No temp files left behind
        let leftovers = fs::read_dir(temp.path().join("harbor"))
            .unwrap()
            .filter(|e| {
                e.as_ref()
                    .unwrap()
                    .file_name()
                    .to_string_lossy()
                    .ends_with(".tmp")
            })
            .count();
        assert_eq!(leftovers, 0);
    }

    #[test]
    fn test_tenants_are_isolated() {
        let (storage, _temp) = setup();

        storage
            .save("one", Collection::Staff, &[json!({ "id": "s1" })])
            .unwrap();

        assert_eq!(storage.load("one", Collection::Staff).unwrap().len(), 1);
        assert!(storage.load("two", Collection::Staff).unwrap().is_empty());
    }

    #[test]
    fn test_rejects_traversal() {
        let (storage, _temp) = setup();
        let result = storage.save("../outside", Collection::Rooms, &[]);
        assert!(matches!(result, Err(ServerStorageError::InvalidTenantId(_))));
    }

    #[test]
    fn test_corrupt_document_is_reported() {
        let (storage, temp) = setup();
        fs::create_dir_all(temp.path().join("harbor")).unwrap();
        fs::write(temp.path().join("harbor").join("rooms.json"), b"not json").unwrap();

        let result = storage.load("harbor", Collection::Rooms);
        assert!(matches!(result, Err(ServerStorageError::CorruptDocument(_, _))));
    }
}
