//! Fine model and overdue arithmetic

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use super::book::Book;
use super::enums::PaymentMethod;
use super::transaction::Transaction;

const SECONDS_PER_DAY: i64 = 86_400;

/// Fine status; `paid` and `waived` are terminal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum FineStatus {
    Pending,
    Paid,
    Waived,
}

impl std::fmt::Display for FineStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            FineStatus::Pending => "pending",
            FineStatus::Paid => "paid",
            FineStatus::Waived => "waived",
        };
        write!(f, "{}", label)
    }
}

/// Monetary penalty for a late transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Fine {
    pub id: Uuid,
    pub transaction_id: Uuid,
    pub user_id: Uuid,
    pub book_id: Uuid,
    pub book_title: String,
    pub isbn: String,
    pub days_overdue: i64,
    pub fine_per_day: Decimal,
    pub fine_amount: Decimal,
    pub status: FineStatus,
    pub created_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
    pub payment_method: Option<PaymentMethod>,
    pub waived_at: Option<DateTime<Utc>>,
    pub waiver_reason: Option<String>,
    pub notes: Option<String>,
}

impl Fine {
    /// New pending fine for a late transaction
    pub fn pending(
        transaction: &Transaction,
        book: &Book,
        days_overdue: i64,
        fine_per_day: Decimal,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            transaction_id: transaction.id,
            user_id: transaction.user_id,
            book_id: book.id,
            book_title: book.title.clone(),
            isbn: book.isbn.clone(),
            days_overdue,
            fine_per_day,
            fine_amount: fine_amount(days_overdue, fine_per_day),
            status: FineStatus::Pending,
            created_at: now,
            paid_at: None,
            payment_method: None,
            waived_at: None,
            waiver_reason: None,
            notes: None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == FineStatus::Pending
    }

    /// Apply a settlement, refusing anything but a pending fine
    pub fn settle(&mut self, update: &FineStatusUpdate) -> crate::error::AppResult<()> {
        if !self.is_pending() {
            return Err(crate::error::AppError::AlreadyProcessed {
                fine_id: self.id,
                status: self.status,
            });
        }
        match update {
            FineStatusUpdate::Paid { paid_at, payment_method, notes } => {
                self.status = FineStatus::Paid;
                self.paid_at = Some(*paid_at);
                self.payment_method = Some(*payment_method);
                self.notes = notes.clone();
            }
            FineStatusUpdate::Waived { waived_at, reason, notes } => {
                self.status = FineStatus::Waived;
                self.waived_at = Some(*waived_at);
                self.waiver_reason = Some(reason.clone());
                self.notes = notes.clone();
            }
        }
        Ok(())
    }
}

/// Terminal transition applied to a pending fine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum FineStatusUpdate {
    Paid {
        paid_at: DateTime<Utc>,
        payment_method: PaymentMethod,
        notes: Option<String>,
    },
    Waived {
        waived_at: DateTime<Utc>,
        reason: String,
        notes: Option<String>,
    },
}

impl FineStatusUpdate {
    pub fn status(&self) -> FineStatus {
        match self {
            FineStatusUpdate::Paid { .. } => FineStatus::Paid,
            FineStatusUpdate::Waived { .. } => FineStatus::Waived,
        }
    }
}

/// Whole days elapsed past the due date, never negative
pub fn days_overdue(due_date: DateTime<Utc>, at: DateTime<Utc>) -> i64 {
    let seconds = (at - due_date).num_seconds();
    if seconds <= 0 {
        return 0;
    }
    seconds / SECONDS_PER_DAY
}

pub fn fine_amount(days_overdue: i64, fine_per_day: Decimal) -> Decimal {
    Decimal::from(days_overdue.max(0)) * fine_per_day
}

/// Pay fine request
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct PayFine {
    /// cash, card or upi
    pub payment_method: String,
    pub notes: Option<String>,
}

/// Waive fine request
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct WaiveFine {
    pub reason: String,
    pub notes: Option<String>,
}

/// Batch fine calculation request
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CalculateFines {
    #[schema(value_type = String, example = "5.00")]
    pub fine_per_day: Decimal,
}

/// Fine list query parameters
#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct FineQuery {
    pub status: Option<FineStatus>,
}

/// What the batch calculation did with one transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum FineOutcome {
    Created,
    /// A fine already exists for the transaction
    AlreadyFined,
    /// Past due, but less than a full day
    Grace,
}

/// Per-transaction line of a batch calculation
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct FineCalculationDetail {
    pub transaction_id: Uuid,
    pub book_id: Uuid,
    pub user_id: Uuid,
    pub days_overdue: i64,
    pub fine_amount: Decimal,
    pub outcome: FineOutcome,
    pub fine_id: Option<Uuid>,
}

/// Result of a batch calculation
#[derive(Debug, Clone, Default, Serialize, ToSchema)]
pub struct FineCalculationReport {
    pub details: Vec<FineCalculationDetail>,
    pub total_processed: u32,
    pub fines_created: u32,
    pub transactions_updated: u32,
    pub skipped: u32,
}
