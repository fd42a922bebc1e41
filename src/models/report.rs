//! Aggregates consumed by the reporting layer

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use utoipa::ToSchema;

use super::shelf::ShelfUtilization;

/// Count and amount of fines in one status
#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
pub struct FineBucket {
    pub count: u32,
    pub total_amount: Decimal,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
pub struct FineStatusSummary {
    pub pending: FineBucket,
    pub paid: FineBucket,
    pub waived: FineBucket,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct BookCounts {
    pub total: u32,
    pub available: u32,
    pub issued: u32,
}

/// Open transactions split by their effective status
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct TransactionCounts {
    pub open: u32,
    pub current: u32,
    pub overdue: u32,
}

/// Summary report; a section that could not be read keeps its default value
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CirculationReport {
    pub generated_at: DateTime<Utc>,
    pub fines: FineStatusSummary,
    pub shelves: Vec<ShelfUtilization>,
    pub books: BookCounts,
    pub transactions: TransactionCounts,
}
