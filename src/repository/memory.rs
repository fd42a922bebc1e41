//! In-process backing store
//!
//! Used by the `memory` backend and by tests. Every operation runs under one lock, so each
//! call is atomic with respect to the others.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{CirculationStore, ScanSource};
use crate::{
    error::{AppError, AppResult},
    models::{
        Book, Fine, FineStatus, FineStatusUpdate, ReturnCondition, ScanEvent, Shelf,
        ShelfPlacement, Transaction, TransactionStatus, User,
    },
};

#[derive(Default)]
struct State {
    books: HashMap<Uuid, Book>,
    users: HashMap<Uuid, User>,
    shelves: HashMap<Uuid, Shelf>,
    transactions: Vec<Transaction>,
    fines: Vec<Fine>,
    scans: HashMap<String, VecDeque<ScanEvent>>,
}

impl State {
    fn book_mut(&mut self, id: Uuid) -> AppResult<&mut Book> {
        self.books
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", id)))
    }

    fn shelf_mut(&mut self, id: Uuid) -> AppResult<&mut Shelf> {
        self.shelves
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("Shelf with id {} not found", id)))
    }
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<RwLock<State>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a borrower
    pub async fn add_user(&self, name: &str) -> User {
        let user = User {
            id: Uuid::new_v4(),
            name: name.to_string(),
        };
        self.state.write().await.users.insert(user.id, user.clone());
        user
    }

    /// Load a historical or backdated transaction, projecting it onto its book when open
    pub async fn insert_transaction(&self, transaction: Transaction) -> AppResult<Transaction> {
        let mut state = self.state.write().await;
        if transaction.is_open() {
            let book = state.book_mut(transaction.book_id)?;
            if !book.is_available {
                return Err(AppError::BookNotAvailable { book_id: book.id });
            }
            book.mark_issued(transaction.user_id, transaction.issued_date, transaction.due_date);
        }
        state.transactions.push(transaction.clone());
        Ok(transaction)
    }

    /// Queue a scan as if a station reader had produced it
    pub async fn push_scan(&self, event: ScanEvent) {
        self.state
            .write()
            .await
            .scans
            .entry(event.station.clone())
            .or_default()
            .push_back(event);
    }
}

#[async_trait]
impl CirculationStore for MemoryStore {
    async fn get_book(&self, id: Uuid) -> AppResult<Book> {
        self.state
            .read()
            .await
            .books
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", id)))
    }

    async fn find_book_by_isbn(&self, isbn: &str) -> AppResult<Option<Book>> {
        Ok(self
            .state
            .read()
            .await
            .books
            .values()
            .find(|b| b.isbn == isbn)
            .cloned())
    }

    async fn list_books(&self) -> AppResult<Vec<Book>> {
        let mut books: Vec<Book> = self.state.read().await.books.values().cloned().collect();
        books.sort_by(|a, b| a.title.cmp(&b.title));
        Ok(books)
    }

    async fn insert_book(&self, book: Book) -> AppResult<Book> {
        let mut state = self.state.write().await;
        if state.books.values().any(|b| b.isbn == book.isbn) {
            return Err(AppError::Conflict(format!(
                "A book with ISBN {} already exists",
                book.isbn
            )));
        }
        state.books.insert(book.id, book.clone());
        Ok(book)
    }

    async fn update_book_placement(&self, id: Uuid, placement: ShelfPlacement) -> AppResult<Book> {
        let mut state = self.state.write().await;
        let book = state.book_mut(id)?;
        book.placement = placement;
        Ok(book.clone())
    }

    async fn delete_book(&self, id: Uuid) -> AppResult<()> {
        let mut state = self.state.write().await;
        let book = state.book_mut(id)?;
        if !book.is_available {
            return Err(AppError::BookNotAvailable { book_id: id });
        }
        state.books.remove(&id);
        Ok(())
    }

    async fn get_user(&self, id: Uuid) -> AppResult<User> {
        self.state
            .read()
            .await
            .users
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("User with id {} not found", id)))
    }

    async fn get_shelf(&self, id: Uuid) -> AppResult<Shelf> {
        self.state
            .read()
            .await
            .shelves
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Shelf with id {} not found", id)))
    }

    async fn list_shelves(&self) -> AppResult<Vec<Shelf>> {
        let mut shelves: Vec<Shelf> = self.state.read().await.shelves.values().cloned().collect();
        shelves.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(shelves)
    }

    async fn insert_shelf(&self, shelf: Shelf) -> AppResult<Shelf> {
        let mut state = self.state.write().await;
        if state.shelves.contains_key(&shelf.id) {
            return Err(AppError::Conflict(format!("Shelf {} already exists", shelf.id)));
        }
        state.shelves.insert(shelf.id, shelf.clone());
        Ok(shelf)
    }

    async fn adjust_shelf_occupancy(&self, id: Uuid, delta: i32) -> AppResult<Shelf> {
        let mut state = self.state.write().await;
        let shelf = state.shelf_mut(id)?;
        shelf.try_adjust(delta)?;
        Ok(shelf.clone())
    }

    async fn update_shelf_capacity(&self, id: Uuid, capacity: u32) -> AppResult<Shelf> {
        let mut state = self.state.write().await;
        let shelf = state.shelf_mut(id)?;
        shelf.try_resize(capacity)?;
        Ok(shelf.clone())
    }

    async fn delete_shelf(&self, id: Uuid) -> AppResult<()> {
        let mut state = self.state.write().await;
        state.shelf_mut(id)?.ensure_deletable()?;
        state.shelves.remove(&id);
        Ok(())
    }

    async fn create_transaction(
        &self,
        book_id: Uuid,
        user_id: Uuid,
        due_date: DateTime<Utc>,
    ) -> AppResult<Transaction> {
        let mut state = self.state.write().await;
        if !state.users.contains_key(&user_id) {
            return Err(AppError::NotFound(format!("User with id {} not found", user_id)));
        }

        let now = Utc::now();
        let book = state.book_mut(book_id)?;
        if !book.is_available {
            return Err(AppError::BookNotAvailable { book_id });
        }
        book.mark_issued(user_id, now, due_date);

        let transaction = Transaction::open(book_id, user_id, now, due_date);
        state.transactions.push(transaction.clone());
        Ok(transaction)
    }

    async fn close_transaction(
        &self,
        id: Uuid,
        return_date: DateTime<Utc>,
        condition: ReturnCondition,
        notes: Option<String>,
    ) -> AppResult<Transaction> {
        let mut state = self.state.write().await;
        let transaction = state
            .transactions
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| AppError::NotFound(format!("Transaction with id {} not found", id)))?;

        if !transaction.is_open() {
            return Err(AppError::AlreadyReturned {
                book_id: transaction.book_id,
            });
        }

        transaction.return_date = Some(return_date);
        transaction.status = TransactionStatus::Returned;
        transaction.condition = Some(condition);
        transaction.notes = notes;
        let closed = transaction.clone();

        if let Some(book) = state.books.get_mut(&closed.book_id) {
            book.mark_returned();
        }
        Ok(closed)
    }

    async fn find_open_transaction(&self, book_id: Uuid) -> AppResult<Option<Transaction>> {
        Ok(self
            .state
            .read()
            .await
            .transactions
            .iter()
            .find(|t| t.book_id == book_id && t.is_open())
            .cloned())
    }

    async fn list_transactions(&self, status: Option<TransactionStatus>) -> AppResult<Vec<Transaction>> {
        Ok(self
            .state
            .read()
            .await
            .transactions
            .iter()
            .filter(|t| status.map_or(true, |s| t.status == s))
            .cloned()
            .collect())
    }

    async fn list_user_transactions(&self, user_id: Uuid) -> AppResult<Vec<Transaction>> {
        Ok(self
            .state
            .read()
            .await
            .transactions
            .iter()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn mark_transaction_overdue(
        &self,
        id: Uuid,
        days_overdue: i64,
        fine_amount: Decimal,
    ) -> AppResult<Transaction> {
        let mut state = self.state.write().await;
        let transaction = state
            .transactions
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| AppError::NotFound(format!("Transaction with id {} not found", id)))?;

        if !transaction.is_open() {
            return Err(AppError::AlreadyReturned {
                book_id: transaction.book_id,
            });
        }
        transaction.status = TransactionStatus::Overdue;
        transaction.days_overdue = Some(days_overdue);
        transaction.fine_amount = Some(fine_amount);
        Ok(transaction.clone())
    }

    async fn fetch_fines(&self, status: Option<FineStatus>) -> AppResult<Vec<Fine>> {
        Ok(self
            .state
            .read()
            .await
            .fines
            .iter()
            .filter(|f| status.map_or(true, |s| f.status == s))
            .cloned()
            .collect())
    }

    async fn get_fine(&self, id: Uuid) -> AppResult<Fine> {
        self.state
            .read()
            .await
            .fines
            .iter()
            .find(|f| f.id == id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Fine with id {} not found", id)))
    }

    async fn persist_fine(&self, fine: Fine) -> AppResult<Fine> {
        let mut state = self.state.write().await;
        if state
            .fines
            .iter()
            .any(|f| f.transaction_id == fine.transaction_id)
        {
            return Err(AppError::Conflict(format!(
                "Transaction {} already has a fine",
                fine.transaction_id
            )));
        }
        state.fines.push(fine.clone());
        Ok(fine)
    }

    async fn update_fine_status(&self, id: Uuid, update: FineStatusUpdate) -> AppResult<Fine> {
        let mut state = self.state.write().await;
        let fine = state
            .fines
            .iter_mut()
            .find(|f| f.id == id)
            .ok_or_else(|| AppError::NotFound(format!("Fine with id {} not found", id)))?;
        fine.settle(&update)?;
        Ok(fine.clone())
    }
}

#[async_trait]
impl ScanSource for MemoryStore {
    async fn take_pending_scan(&self, station: &str) -> AppResult<Option<ScanEvent>> {
        Ok(self
            .state
            .write()
            .await
            .scans
            .get_mut(station)
            .and_then(|queue| queue.pop_front()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    async fn seeded() -> (MemoryStore, Book, User) {
        let store = MemoryStore::new();
        let user = store.add_user("Ada").await;
        let book = store
            .insert_book(Book {
                id: Uuid::new_v4(),
                isbn: "9780306406157".into(),
                title: "Signals".into(),
                author: "Someone".into(),
                genre: None,
                placement: ShelfPlacement {
                    rack_id: Uuid::new_v4(),
                    shelf_id: Uuid::new_v4(),
                },
                is_available: true,
                issued_to: None,
                issued_date: None,
                return_date: None,
            })
            .await
            .unwrap();
        (store, book, user)
    }

    #[tokio::test]
    async fn test_second_issue_is_rejected() {
        let (store, book, user) = seeded().await;
        let due = Utc::now() + Duration::days(7);

        store.create_transaction(book.id, user.id, due).await.unwrap();
        let err = store.create_transaction(book.id, user.id, due).await.unwrap_err();
        assert!(matches!(err, AppError::BookNotAvailable { .. }));

        let open: Vec<_> = store
            .list_transactions(None)
            .await
            .unwrap()
            .into_iter()
            .filter(|t| t.is_open())
            .collect();
        assert_eq!(open.len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_user_leaves_book_untouched() {
        let (store, book, _) = seeded().await;
        let err = store
            .create_transaction(book.id, Uuid::new_v4(), Utc::now() + Duration::days(7))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        assert!(store.get_book(book.id).await.unwrap().is_available);
        assert!(store.list_transactions(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_close_projects_availability() {
        let (store, book, user) = seeded().await;
        let tx = store
            .create_transaction(book.id, user.id, Utc::now() + Duration::days(7))
            .await
            .unwrap();
        assert!(!store.get_book(book.id).await.unwrap().is_available);

        let closed = store
            .close_transaction(tx.id, Utc::now(), ReturnCondition::Good, None)
            .await
            .unwrap();
        assert_eq!(closed.status, TransactionStatus::Returned);
        assert!(store.get_book(book.id).await.unwrap().is_available);
        assert!(store.find_open_transaction(book.id).await.unwrap().is_none());

        let again = store
            .close_transaction(tx.id, Utc::now(), ReturnCondition::Good, None)
            .await
            .unwrap_err();
        assert!(matches!(again, AppError::AlreadyReturned { .. }));
    }

    #[tokio::test]
    async fn test_one_fine_per_transaction() {
        let (store, book, user) = seeded().await;
        let tx = store
            .create_transaction(book.id, user.id, Utc::now() + Duration::days(7))
            .await
            .unwrap();
        let fine = Fine::pending(&tx, &book, 2, Decimal::from(5), Utc::now());
        store.persist_fine(fine.clone()).await.unwrap();

        let duplicate = Fine::pending(&tx, &book, 2, Decimal::from(5), Utc::now());
        assert!(matches!(
            store.persist_fine(duplicate).await,
            Err(AppError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_scan_queue_is_fifo() {
        let store = MemoryStore::new();
        for isbn in ["111", "222"] {
            store
                .push_scan(ScanEvent {
                    station: "desk-1".into(),
                    isbn: Some(isbn.into()),
                    rfid: None,
                    scanned_at: Utc::now(),
                })
                .await;
        }
        let first = store.take_pending_scan("desk-1").await.unwrap().unwrap();
        assert_eq!(first.isbn.as_deref(), Some("111"));
        assert!(store.take_pending_scan("desk-2").await.unwrap().is_none());
    }
}
