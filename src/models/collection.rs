use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The domain collections kept in sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    Rooms,
    Guests,
    Staff,
    Transactions,
    Maintenance,
    Bookings,
    Documents,
    FeatureRequests,
    Attendance,
    Dnr,
}

/// Secondary index columns of the Local Store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexField {
    Status,
    Category,
    Date,
}

impl Collection {
    pub const ALL: [Collection; 10] = [
        Collection::Rooms,
        Collection::Guests,
        Collection::Staff,
        Collection::Transactions,
        Collection::Maintenance,
        Collection::Bookings,
        Collection::Documents,
        Collection::FeatureRequests,
        Collection::Attendance,
        Collection::Dnr,
    ];

    /// Stable key used for table rows, remote paths and snapshot files.
    pub fn key(&self) -> &'static str {
        match self {
            Collection::Rooms => "rooms",
            Collection::Guests => "guests",
            Collection::Staff => "staff",
            Collection::Transactions => "transactions",
            Collection::Maintenance => "maintenance",
            Collection::Bookings => "bookings",
            Collection::Documents => "documents",
            Collection::FeatureRequests => "feature_requests",
            Collection::Attendance => "attendance",
            Collection::Dnr => "dnr",
        }
    }

    /// Exact match on [`Collection::key`].
    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.key() == key)
    }

    /// Lenient parse for user input: case and `-` are folded. Unknown keys
    /// yield `None`.
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|c| c.key() == s.to_lowercase().replace('-', "_"))
    }

    /// Dense index, used to address per-collection locks and channels.
    pub fn index(&self) -> usize {
        *self as usize
    }

    /// The record field feeding the given index column, if the collection has one.
    pub fn index_source(&self, field: IndexField) -> Option<&'static str> {
        use Collection::*;
        use IndexField::*;

        match (self, field) {
            (Rooms, Status) => Some("status"),
            (Rooms, Category) => Some("type"),
            (Guests, Status) => Some("status"),
            (Guests, Date) => Some("checkIn"),
            (Staff, Status) => Some("status"),
            (Staff, Category) => Some("role"),
            (Transactions, Category) => Some("category"),
            (Transactions, Date) => Some("date"),
            (Maintenance, Status) => Some("status"),
            (Maintenance, Category) => Some("priority"),
            (Maintenance, Date) => Some("reportedAt"),
            (Bookings, Status) => Some("status"),
            (Bookings, Date) => Some("checkIn"),
            (Documents, Category) => Some("category"),
            (Documents, Date) => Some("uploadedAt"),
            (FeatureRequests, Status) => Some("status"),
            (FeatureRequests, Date) => Some("createdAt"),
            (Attendance, Category) => Some("staffId"),
            (Attendance, Date) => Some("date"),
            (Dnr, Date) => Some("createdAt"),
            _ => None,
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Collection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| {
            let valid: Vec<&str> = Self::ALL.iter().map(|c| c.key()).collect();
            format!(
                "Invalid collection '{}'. Valid options: {}",
                s,
                valid.join(", ")
            )
        })
    }
}
