use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::new_id;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuestStatus {
    Reserved,
    CheckedIn,
    CheckedOut,
}

/// An entry in the guest directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Guest {
    pub id: String,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub room_id: Option<String>,
    pub check_in: Option<NaiveDate>,
    pub check_out: Option<NaiveDate>,
    pub status: GuestStatus,
    #[serde(default)]
    pub notes: Option<String>,
}

impl Guest {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            name: name.into(),
            email: None,
            phone: None,
            room_id: None,
            check_in: None,
            check_out: None,
            status: GuestStatus::Reserved,
            notes: None,
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = Some(phone.into());
        self
    }

    pub fn with_stay(mut self, room_id: impl Into<String>, check_in: NaiveDate, check_out: NaiveDate) -> Self {
        self.room_id = Some(room_id.into());
        self.check_in = Some(check_in);
        self.check_out = Some(check_out);
        self
    }

    pub fn checked_in(mut self) -> Self {
        self.status = GuestStatus::CheckedIn;
        self
    }
}
