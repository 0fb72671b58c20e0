use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::new_id;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Medium,
    High,
    Urgent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    Open,
    InProgress,
    Resolved,
}

/// A maintenance ticket raised against a room or common area.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaintenanceTicket {
    pub id: String,
    pub room_id: Option<String>,
    pub title: String,
    pub description: String,
    pub priority: Priority,
    pub status: TicketStatus,
    pub reported_by: String,
    pub reported_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl MaintenanceTicket {
    pub fn new(title: impl Into<String>, priority: Priority, reported_by: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            room_id: None,
            title: title.into(),
            description: String::new(),
            priority,
            status: TicketStatus::Open,
            reported_by: reported_by.into(),
            reported_at: Utc::now(),
            resolved_at: None,
        }
    }

    pub fn for_room(mut self, room_id: impl Into<String>) -> Self {
        self.room_id = Some(room_id.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn resolve(&mut self) {
        self.status = TicketStatus::Resolved;
        self.resolved_at = Some(Utc::now());
    }
}

impl fmt::Display for MaintenanceTicket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Maintenance ticket: {}", self.title)?;
        writeln!(f, "{}", "=".repeat(30))?;
        writeln!(f, "Priority: {:?}", self.priority)?;
        writeln!(f, "Status: {:?}", self.status)?;
        if let Some(room) = &self.room_id {
            writeln!(f, "Room: {}", room)?;
        }
        writeln!(f, "Reported by {} at {}", self.reported_by, self.reported_at.to_rfc3339())?;

        if !self.description.is_empty() {
            writeln!(f, "\n{}", self.description)?;
        }

        Ok(())
    }
}
