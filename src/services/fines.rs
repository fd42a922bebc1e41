//! Fine calculation and settlement

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use super::coordinator::{CacheKey, RequestCoordinator};
use crate::{
    error::{AppError, AppResult},
    models::{
        fine::{
            days_overdue, fine_amount, FineCalculationDetail, FineCalculationReport, FineOutcome,
            PayFine, WaiveFine,
        },
        Book, Fine, FineStatus, FineStatusUpdate, PaymentMethod, Transaction, TransactionStatus,
    },
    repository::Repository,
};

const MAX_FINE_PER_DAY: i64 = 1000;
const MAX_NOTES_CHARS: usize = 1000;
const MIN_REASON_CHARS: usize = 5;
const MAX_REASON_CHARS: usize = 500;

static WORD_CHARACTER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\w").expect("word character pattern is valid"));

/// Check a per-day rate is in `(0, 1000]`
pub fn validate_rate(fine_per_day: Decimal) -> AppResult<()> {
    if fine_per_day <= Decimal::ZERO || fine_per_day > Decimal::from(MAX_FINE_PER_DAY) {
        return Err(AppError::validation(
            "fine_per_day",
            "Fine per day must be greater than 0 and at most 1000",
        ));
    }
    Ok(())
}

/// Trim a waiver reason and check its length and content
pub fn validate_waiver_reason(reason: &str) -> AppResult<String> {
    let reason = reason.trim();
    let length = reason.chars().count();
    if !(MIN_REASON_CHARS..=MAX_REASON_CHARS).contains(&length) {
        return Err(AppError::validation(
            "reason",
            "Waiver reason must be between 5 and 500 characters",
        ));
    }
    if !WORD_CHARACTER.is_match(reason) {
        return Err(AppError::validation(
            "reason",
            "Waiver reason must contain at least one letter or digit",
        ));
    }
    Ok(reason.to_string())
}

/// Blank notes are dropped; others are capped at 1000 characters
pub fn validate_notes(notes: Option<&str>) -> AppResult<Option<String>> {
    match notes.map(str::trim) {
        None | Some("") => Ok(None),
        Some(notes) if notes.chars().count() > MAX_NOTES_CHARS => Err(AppError::validation(
            "notes",
            "Notes must be at most 1000 characters",
        )),
        Some(notes) => Ok(Some(notes.to_string())),
    }
}

#[derive(Clone)]
pub struct FinesService {
    repository: Repository,
    coordinator: RequestCoordinator,
}

impl FinesService {
    pub fn new(repository: Repository, coordinator: RequestCoordinator) -> Self {
        Self {
            repository,
            coordinator,
        }
    }

    /// List fines, optionally restricted to one status
    pub async fn list_fines(&self, caller: Option<&str>, status: Option<FineStatus>) -> AppResult<Vec<Fine>> {
        let store = Arc::clone(&self.repository.store);
        self.coordinator
            .read(CacheKey::new(caller, "fines.list", &status), move || {
                let store = Arc::clone(&store);
                async move { store.fetch_fines(status).await }
            })
            .await
    }

    async fn fresh_pending(&self) -> AppResult<Vec<Fine>> {
        let store = &self.repository.store;
        self.coordinator
            .fetch("fines.pending", || store.fetch_fines(Some(FineStatus::Pending)))
            .await
    }

    /// Pending fines on a book, whoever incurred them
    pub async fn pending_fines_for_book(&self, book_id: Uuid) -> AppResult<Vec<Fine>> {
        Ok(self
            .fresh_pending()
            .await?
            .into_iter()
            .filter(|f| f.book_id == book_id)
            .collect())
    }

    /// Pending fines a user owes on a book
    pub async fn pending_fines_for(&self, book_id: Uuid, user_id: Uuid) -> AppResult<Vec<Fine>> {
        Ok(self
            .pending_fines_for_book(book_id)
            .await?
            .into_iter()
            .filter(|f| f.user_id == user_id)
            .collect())
    }

    pub async fn has_pending_fines(&self, book_id: Uuid) -> AppResult<bool> {
        Ok(!self.pending_fines_for_book(book_id).await?.is_empty())
    }

    /// Create pending fines for every late open transaction that has none yet.
    ///
    /// Transactions that already carry a fine (of any status) and those less than a full day
    /// late are skipped, so running the calculation twice creates nothing the second time.
    /// A skipped transaction that has a fine but is not yet marked overdue is marked then.
    pub async fn calculate_fines(&self, fine_per_day: Decimal) -> AppResult<FineCalculationReport> {
        validate_rate(fine_per_day)?;

        let now = Utc::now();
        let store = &self.repository.store;

        let transactions = self
            .coordinator
            .fetch("transactions.list", || store.list_transactions(None))
            .await?;
        let fined: HashMap<Uuid, Fine> = self
            .coordinator
            .fetch("fines.list", || store.fetch_fines(None))
            .await?
            .into_iter()
            .map(|f| (f.transaction_id, f))
            .collect();

        let mut report = FineCalculationReport::default();

        for transaction in transactions
            .into_iter()
            .filter(|t| t.is_open() && t.due_date < now)
        {
            report.total_processed += 1;
            let days_overdue = transaction.days_overdue_at(now);
            let amount = fine_amount(days_overdue, fine_per_day);

            let existing = fined.get(&transaction.id);
            let outcome = if existing.is_some() {
                Some(FineOutcome::AlreadyFined)
            } else if days_overdue == 0 {
                Some(FineOutcome::Grace)
            } else {
                None
            };

            // A fined transaction not yet marked overdue was interrupted between the two writes
            if let Some(fine) = existing {
                if transaction.status != TransactionStatus::Overdue {
                    let (transaction_id, days, amount) =
                        (transaction.id, fine.days_overdue, fine.fine_amount);
                    self.coordinator
                        .batch("transactions.overdue", || {
                            store.mark_transaction_overdue(transaction_id, days, amount)
                        })
                        .await?;
                    report.transactions_updated += 1;
                }
            }

            if let Some(outcome) = outcome {
                report.skipped += 1;
                report.details.push(FineCalculationDetail {
                    transaction_id: transaction.id,
                    book_id: transaction.book_id,
                    user_id: transaction.user_id,
                    days_overdue,
                    fine_amount: amount,
                    outcome,
                    fine_id: None,
                });
                continue;
            }

            let book_id = transaction.book_id;
            let book = self
                .coordinator
                .fetch("books.get", || store.get_book(book_id))
                .await?;

            let fine = Fine::pending(&transaction, &book, days_overdue, fine_per_day, now);
            let fine = self
                .coordinator
                .batch("fines.persist", || store.persist_fine(fine.clone()))
                .await?;
            report.fines_created += 1;

            let transaction_id = transaction.id;
            self.coordinator
                .batch("transactions.overdue", || {
                    store.mark_transaction_overdue(transaction_id, days_overdue, amount)
                })
                .await?;
            if transaction.status != TransactionStatus::Overdue {
                report.transactions_updated += 1;
            }

            report.details.push(FineCalculationDetail {
                transaction_id,
                book_id,
                user_id: transaction.user_id,
                days_overdue,
                fine_amount: fine.fine_amount,
                outcome: FineOutcome::Created,
                fine_id: Some(fine.id),
            });
        }

        tracing::info!(
            "Fine calculation at {}/day: {} processed, {} created, {} transactions updated, {} skipped",
            fine_per_day,
            report.total_processed,
            report.fines_created,
            report.transactions_updated,
            report.skipped
        );

        Ok(report)
    }

    /// Fine for an open transaction being returned at `returned_at`, if it is late and has
    /// none yet.
    ///
    /// Called before the transaction is closed: a failure here leaves the loan open.
    pub async fn assess_late_return(
        &self,
        transaction: &Transaction,
        book: &Book,
        fine_per_day: Decimal,
        returned_at: DateTime<Utc>,
    ) -> AppResult<Option<Fine>> {
        validate_rate(fine_per_day)?;
        let days_overdue = days_overdue(transaction.due_date, returned_at);
        if days_overdue == 0 {
            return Ok(None);
        }

        let store = &self.repository.store;
        let already_fined = self
            .coordinator
            .fetch("fines.list", || store.fetch_fines(None))
            .await?
            .iter()
            .any(|f| f.transaction_id == transaction.id);
        if already_fined {
            return Ok(None);
        }

        let fine = Fine::pending(transaction, book, days_overdue, fine_per_day, returned_at);
        let fine = self
            .coordinator
            .mutate("fines.persist", || store.persist_fine(fine.clone()))
            .await?;

        tracing::info!(
            "Late return of book {} by user {}: {} day(s), fine {}",
            book.id,
            transaction.user_id,
            days_overdue,
            fine.fine_amount
        );
        Ok(Some(fine))
    }

    async fn pending_fine(&self, id: Uuid) -> AppResult<Fine> {
        let store = &self.repository.store;
        let fine = self
            .coordinator
            .fetch("fines.get", || store.get_fine(id))
            .await?;
        if !fine.is_pending() {
            return Err(AppError::AlreadyProcessed {
                fine_id: id,
                status: fine.status,
            });
        }
        Ok(fine)
    }

    /// Record payment of a pending fine
    pub async fn pay_fine(&self, id: Uuid, request: PayFine) -> AppResult<Fine> {
        let payment_method: PaymentMethod = request.payment_method.parse()?;
        let notes = validate_notes(request.notes.as_deref())?;
        self.pending_fine(id).await?;

        let update = FineStatusUpdate::Paid {
            paid_at: Utc::now(),
            payment_method,
            notes,
        };
        let store = &self.repository.store;
        let fine = self
            .coordinator
            .mutate("fines.pay", || store.update_fine_status(id, update.clone()))
            .await?;

        tracing::info!("Fine {} paid by {} ({})", id, payment_method, fine.fine_amount);
        Ok(fine)
    }

    /// Waive a pending fine
    pub async fn waive_fine(&self, id: Uuid, request: WaiveFine) -> AppResult<Fine> {
        let reason = validate_waiver_reason(&request.reason)?;
        let notes = validate_notes(request.notes.as_deref())?;
        self.pending_fine(id).await?;

        let update = FineStatusUpdate::Waived {
            waived_at: Utc::now(),
            reason,
            notes,
        };
        let store = &self.repository.store;
        let fine = self
            .coordinator
            .mutate("fines.waive", || store.update_fine_status(id, update.clone()))
            .await?;

        tracing::info!("Fine {} waived ({})", id, fine.fine_amount);
        Ok(fine)
    }
}
