use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::new_id;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Completed,
    Cancelled,
    NoShow,
}

/// A past stay, kept for the guest history view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingHistory {
    pub id: String,
    pub guest_id: String,
    pub room_id: String,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub total_cents: i64,
    pub status: BookingStatus,
}

impl BookingHistory {
    pub fn new(
        guest_id: impl Into<String>,
        room_id: impl Into<String>,
        check_in: NaiveDate,
        check_out: NaiveDate,
        total_cents: i64,
    ) -> Self {
        Self {
            id: new_id(),
            guest_id: guest_id.into(),
            room_id: room_id.into(),
            check_in,
            check_out,
            total_cents,
            status: BookingStatus::Completed,
        }
    }

    pub fn nights(&self) -> i64 {
        (self.check_out - self.check_in).num_days().max(0)
    }
}
