use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::new_id;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Income,
    Expense,
}

/// An accounting entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: String,
    pub date: NaiveDate,
    pub kind: TransactionKind,
    pub category: String,
    /// Amount in cents, always positive; `kind` carries the sign.
    pub amount_cents: i64,
    pub description: String,
    pub guest_id: Option<String>,
}

impl Transaction {
    pub fn new(
        date: NaiveDate,
        kind: TransactionKind,
        category: impl Into<String>,
        amount_cents: i64,
    ) -> Self {
        Self {
            id: new_id(),
            date,
            kind,
            category: category.into(),
            amount_cents: amount_cents.abs(),
            description: String::new(),
            guest_id: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_guest(mut self, guest_id: impl Into<String>) -> Self {
        self.guest_id = Some(guest_id.into());
        self
    }

    /// Signed amount: income positive, expense negative.
    pub fn signed_cents(&self) -> i64 {
        match self.kind {
            TransactionKind::Income => self.amount_cents,
            TransactionKind::Expense => -self.amount_cents,
        }
    }
}
