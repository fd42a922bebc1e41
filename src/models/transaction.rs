//! Transaction (book-history record) model and related types

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::enums::ReturnCondition;
use super::fine::days_overdue;
use crate::error::{AppError, AppResult};

/// Transaction status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Current,
    Returned,
    Overdue,
}

impl std::fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            TransactionStatus::Current => "current",
            TransactionStatus::Returned => "returned",
            TransactionStatus::Overdue => "overdue",
        };
        write!(f, "{}", label)
    }
}

/// One issue-to-return cycle linking a book and a user
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Transaction {
    pub id: Uuid,
    pub book_id: Uuid,
    pub user_id: Uuid,
    pub issued_date: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub return_date: Option<DateTime<Utc>>,
    pub status: TransactionStatus,
    pub days_overdue: Option<i64>,
    pub fine_amount: Option<Decimal>,
    pub condition: Option<ReturnCondition>,
    pub notes: Option<String>,
}

impl Transaction {
    /// Open a new transaction
    pub fn open(book_id: Uuid, user_id: Uuid, issued_date: DateTime<Utc>, due_date: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            book_id,
            user_id,
            issued_date,
            due_date,
            return_date: None,
            status: TransactionStatus::Current,
            days_overdue: None,
            fine_amount: None,
            condition: None,
            notes: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.return_date.is_none()
    }

    /// Status as displayed at `now`: an open transaction past its due date reads as overdue
    pub fn effective_status(&self, now: DateTime<Utc>) -> TransactionStatus {
        if !self.is_open() {
            TransactionStatus::Returned
        } else if self.due_date < now {
            TransactionStatus::Overdue
        } else {
            TransactionStatus::Current
        }
    }

    /// Whole days late, measured at the return date or at `now` while still open
    pub fn days_overdue_at(&self, now: DateTime<Utc>) -> i64 {
        days_overdue(self.due_date, self.return_date.unwrap_or(now))
    }
}

/// Issue request
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct IssueBook {
    pub book_id: Uuid,
    pub user_id: Uuid,
    /// RFC 3339 timestamp or YYYY-MM-DD (end of that day, UTC)
    pub due_date: String,
}

/// Return request
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ReturnBook {
    pub book_id: Uuid,
    pub user_id: Uuid,
    /// good, fair, damaged or lost
    pub condition: String,
    /// At most 1000 characters; blank notes are dropped
    pub notes: Option<String>,
}

/// Parse a due date given as an RFC 3339 timestamp or a plain calendar date
pub fn parse_due_date(value: &str) -> AppResult<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Ok(ts.with_timezone(&Utc));
    }
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        let end_of_day = NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN);
        return Ok(date.and_time(end_of_day).and_utc());
    }
    Err(AppError::validation(
        "due_date",
        "Due date must be an RFC 3339 timestamp or a YYYY-MM-DD date",
    ))
}
