use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::new_id;

/// A document kept in the document vault (contracts, IDs, invoices).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredDocument {
    pub id: String,
    pub name: String,
    pub category: String,
    pub mime_type: String,
    pub size_bytes: u64,
    /// Base64 content, absent when only metadata is stored.
    pub content: Option<String>,
    pub uploaded_at: DateTime<Utc>,
}

impl StoredDocument {
    pub fn new(name: impl Into<String>, category: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            name: name.into(),
            category: category.into(),
            mime_type: mime_type.into(),
            size_bytes: 0,
            content: None,
            uploaded_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureStatus {
    Requested,
    Planned,
    Done,
}

/// A feature request submitted by staff.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureRequest {
    pub id: String,
    pub title: String,
    pub description: String,
    pub status: FeatureStatus,
    pub votes: u32,
    pub created_at: DateTime<Utc>,
}

impl FeatureRequest {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            title: title.into(),
            description: description.into(),
            status: FeatureStatus::Requested,
            votes: 0,
            created_at: Utc::now(),
        }
    }
}

/// A do-not-rent entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DnrRecord {
    pub id: String,
    pub guest_name: String,
    pub id_number: Option<String>,
    pub reason: String,
    pub added_by: String,
    pub created_at: DateTime<Utc>,
}

impl DnrRecord {
    pub fn new(guest_name: impl Into<String>, reason: impl Into<String>, added_by: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            guest_name: guest_name.into(),
            id_number: None,
            reason: reason.into(),
            added_by: added_by.into(),
            created_at: Utc::now(),
        }
    }
}
