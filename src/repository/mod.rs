//! Repository layer: the backing store the circulation engine talks to

pub mod memory;
pub mod rest;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::{
    config::{BackendConfig, BackendKind},
    error::AppResult,
    models::{
        Book, Fine, FineStatus, FineStatusUpdate, ReturnCondition, ScanEvent, Shelf,
        ShelfPlacement, Transaction, TransactionStatus, User,
    },
};

/// Persistence/service collaborator behind the circulation engine.
///
/// Every call is atomic on the backing side: a second `create_transaction` for an issued book
/// fails with `BookNotAvailable`, and `update_fine_status` on a settled fine fails with
/// `AlreadyProcessed`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CirculationStore: Send + Sync {
    // Books
    async fn get_book(&self, id: Uuid) -> AppResult<Book>;
    async fn find_book_by_isbn(&self, isbn: &str) -> AppResult<Option<Book>>;
    async fn list_books(&self) -> AppResult<Vec<Book>>;
    async fn insert_book(&self, book: Book) -> AppResult<Book>;
    async fn update_book_placement(&self, id: Uuid, placement: ShelfPlacement) -> AppResult<Book>;
    async fn delete_book(&self, id: Uuid) -> AppResult<()>;

    // Users
    async fn get_user(&self, id: Uuid) -> AppResult<User>;

    // Shelves
    async fn get_shelf(&self, id: Uuid) -> AppResult<Shelf>;
    async fn list_shelves(&self) -> AppResult<Vec<Shelf>>;
    async fn insert_shelf(&self, shelf: Shelf) -> AppResult<Shelf>;
    async fn adjust_shelf_occupancy(&self, id: Uuid, delta: i32) -> AppResult<Shelf>;
    async fn update_shelf_capacity(&self, id: Uuid, capacity: u32) -> AppResult<Shelf>;
    async fn delete_shelf(&self, id: Uuid) -> AppResult<()>;

    // Transactions
    async fn create_transaction(
        &self,
        book_id: Uuid,
        user_id: Uuid,
        due_date: DateTime<Utc>,
    ) -> AppResult<Transaction>;
    async fn close_transaction(
        &self,
        id: Uuid,
        return_date: DateTime<Utc>,
        condition: ReturnCondition,
        notes: Option<String>,
    ) -> AppResult<Transaction>;
    async fn find_open_transaction(&self, book_id: Uuid) -> AppResult<Option<Transaction>>;
    async fn list_transactions(&self, status: Option<TransactionStatus>) -> AppResult<Vec<Transaction>>;
    async fn list_user_transactions(&self, user_id: Uuid) -> AppResult<Vec<Transaction>>;
    async fn mark_transaction_overdue(
        &self,
        id: Uuid,
        days_overdue: i64,
        fine_amount: Decimal,
    ) -> AppResult<Transaction>;

    // Fines
    async fn fetch_fines(&self, status: Option<FineStatus>) -> AppResult<Vec<Fine>>;
    async fn get_fine(&self, id: Uuid) -> AppResult<Fine>;
    async fn persist_fine(&self, fine: Fine) -> AppResult<Fine>;
    async fn update_fine_status(&self, id: Uuid, update: FineStatusUpdate) -> AppResult<Fine>;
}

/// Source of pending barcode/RFID scans for a circulation station
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ScanSource: Send + Sync {
    /// Take the oldest pending scan for `station`, if any
    async fn take_pending_scan(&self, station: &str) -> AppResult<Option<ScanEvent>>;
}

/// Backing store handles shared by all services
#[derive(Clone)]
pub struct Repository {
    pub store: Arc<dyn CirculationStore>,
    pub scans: Arc<dyn ScanSource>,
}

impl Repository {
    /// Build the configured backend
    pub fn from_config(config: &BackendConfig) -> AppResult<Self> {
        match config.kind {
            BackendKind::Memory => Ok(Self::memory(memory::MemoryStore::new())),
            BackendKind::Rest => {
                let store = rest::RestStore::new(
                    &config.base_url,
                    config.api_token.clone(),
                    Duration::from_millis(config.connect_timeout_ms),
                )?;
                Ok(Self {
                    store: Arc::new(store.clone()),
                    scans: Arc::new(store),
                })
            }
        }
    }

    /// Repository backed by an in-process store
    pub fn memory(store: memory::MemoryStore) -> Self {
        Self {
            store: Arc::new(store.clone()),
            scans: Arc::new(store),
        }
    }
}
