//! Circulation reports

use chrono::Utc;
use std::sync::Arc;

use super::coordinator::{CacheKey, RequestCoordinator};
use crate::{
    error::AppResult,
    models::{
        report::{BookCounts, CirculationReport, FineBucket, FineStatusSummary, TransactionCounts},
        shelf::ShelfUtilization,
        Book, Fine, FineStatus, Shelf, Transaction, TransactionStatus,
    },
    repository::Repository,
};

#[derive(Clone)]
pub struct ReportsService {
    repository: Repository,
    coordinator: RequestCoordinator,
}

/// Unwrap one report section, falling back to its default on failure
fn section<T: Default>(name: &str, result: AppResult<T>) -> T {
    result.unwrap_or_else(|e| {
        tracing::warn!("Report section {} unavailable: {}", name, e);
        T::default()
    })
}

pub fn summarize_fines(fines: &[Fine]) -> FineStatusSummary {
    let mut summary = FineStatusSummary::default();
    for fine in fines {
        let bucket = match fine.status {
            FineStatus::Pending => &mut summary.pending,
            FineStatus::Paid => &mut summary.paid,
            FineStatus::Waived => &mut summary.waived,
        };
        bucket.count += 1;
        bucket.total_amount += fine.fine_amount;
    }
    summary
}

pub fn count_books(books: &[Book]) -> BookCounts {
    let available = books.iter().filter(|b| b.is_available).count() as u32;
    BookCounts {
        total: books.len() as u32,
        available,
        issued: books.len() as u32 - available,
    }
}

/// Open transactions grouped by their status at `now`
pub fn count_open_transactions(transactions: &[Transaction], now: chrono::DateTime<Utc>) -> TransactionCounts {
    let mut counts = TransactionCounts::default();
    for transaction in transactions.iter().filter(|t| t.is_open()) {
        counts.open += 1;
        match transaction.effective_status(now) {
            TransactionStatus::Overdue => counts.overdue += 1,
            _ => counts.current += 1,
        }
    }
    counts
}

impl ReportsService {
    pub fn new(repository: Repository, coordinator: RequestCoordinator) -> Self {
        Self {
            repository,
            coordinator,
        }
    }

    /// Fines, shelves, books and open transactions at a glance.
    ///
    /// Each section is fetched independently; one that fails is reported empty.
    pub async fn summary(&self, caller: Option<&str>) -> CirculationReport {
        let store = &self.repository.store;

        let fines_store = Arc::clone(store);
        let shelves_store = Arc::clone(store);
        let books_store = Arc::clone(store);
        let transactions_store = Arc::clone(store);

        let (fines, shelves, books, transactions) = tokio::join!(
            self.coordinator
                .read(CacheKey::new(caller, "fines.list", &None::<FineStatus>), move || {
                    let store = Arc::clone(&fines_store);
                    async move { store.fetch_fines(None).await }
                }),
            self.coordinator
                .read(CacheKey::new(caller, "shelves.list", &()), move || {
                    let store = Arc::clone(&shelves_store);
                    async move { store.list_shelves().await }
                }),
            self.coordinator
                .read(CacheKey::new(caller, "books.list", &()), move || {
                    let store = Arc::clone(&books_store);
                    async move { store.list_books().await }
                }),
            self.coordinator
                .read(CacheKey::new(caller, "transactions.list", &()), move || {
                    let store = Arc::clone(&transactions_store);
                    async move { store.list_transactions(None).await }
                }),
        );

        let fines: Vec<Fine> = section("fines", fines);
        let shelves: Vec<Shelf> = section("shelves", shelves);
        let books: Vec<Book> = section("books", books);
        let transactions: Vec<Transaction> = section("transactions", transactions);

        let now = Utc::now();
        CirculationReport {
            generated_at: now,
            fines: summarize_fines(&fines),
            shelves: shelves.iter().map(ShelfUtilization::from).collect(),
            books: count_books(&books),
            transactions: count_open_transactions(&transactions, now),
        }
    }
}
