use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::new_id;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StaffStatus {
    Active,
    OnLeave,
    Inactive,
}

/// A member of the staff roster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Staff {
    pub id: String,
    pub name: String,
    pub role: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub status: StaffStatus,
}

impl Staff {
    pub fn new(name: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            name: name.into(),
            role: role.into(),
            email: None,
            phone: None,
            status: StaffStatus::Active,
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }
}

/// One clock-in/clock-out entry for a staff member.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceLog {
    pub id: String,
    pub staff_id: String,
    pub date: NaiveDate,
    pub clock_in: DateTime<Utc>,
    pub clock_out: Option<DateTime<Utc>>,
}

impl AttendanceLog {
    pub fn clock_in(staff_id: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            id: new_id(),
            staff_id: staff_id.into(),
            date: at.date_naive(),
            clock_in: at,
            clock_out: None,
        }
    }

    pub fn with_clock_out(mut self, at: DateTime<Utc>) -> Self {
        self.clock_out = Some(at);
        self
    }

    /// Worked minutes, if the shift has ended.
    pub fn minutes_worked(&self) -> Option<i64> {
        self.clock_out
            .map(|out| (out - self.clock_in).num_minutes().max(0))
    }
}
