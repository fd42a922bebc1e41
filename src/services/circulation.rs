//! Circulation: issuing and returning books

use chrono::Utc;
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use super::{
    coordinator::{CacheKey, RequestCoordinator},
    fines::{validate_notes, validate_rate, FinesService},
    returns::ReturnValidator,
};
use crate::{
    error::{AppError, AppResult},
    models::{
        transaction::{parse_due_date, IssueBook, ReturnBook},
        Book, BookState, Fine, ReturnCondition, Transaction,
    },
    repository::Repository,
};

/// Side effect for returns in a condition that carries a fee
pub trait ReturnConditionHook: Send + Sync {
    fn on_condition_fee(&self, transaction: &Transaction, book: &Book, condition: ReturnCondition);
}

/// Records condition fees in the log for staff follow-up
pub struct LoggingConditionHook;

impl ReturnConditionHook for LoggingConditionHook {
    fn on_condition_fee(&self, transaction: &Transaction, book: &Book, condition: ReturnCondition) {
        tracing::warn!(
            "Book {} ({}) returned {} by user {}; condition fee applies",
            book.id,
            book.isbn,
            condition,
            transaction.user_id
        );
    }
}

/// Result of a completed return
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ReturnOutcome {
    pub transaction: Transaction,
    /// Late fine created by this return, if any
    pub fine: Option<Fine>,
    pub book_state: BookState,
}

#[derive(Clone)]
pub struct CirculationService {
    repository: Repository,
    coordinator: RequestCoordinator,
    fines: FinesService,
    validator: ReturnValidator,
    hook: Arc<dyn ReturnConditionHook>,
    fine_per_day: Decimal,
}

impl CirculationService {
    /// Fails with a validation error when `fine_per_day` is outside `(0, 1000]`
    pub fn new(
        repository: Repository,
        coordinator: RequestCoordinator,
        fines: FinesService,
        fine_per_day: Decimal,
    ) -> AppResult<Self> {
        validate_rate(fine_per_day)?;
        Ok(Self {
            repository,
            coordinator,
            validator: ReturnValidator::new(fines.clone()),
            fines,
            hook: Arc::new(LoggingConditionHook),
            fine_per_day,
        })
    }

    /// Replace the condition-fee side effect
    pub fn with_hook(mut self, hook: Arc<dyn ReturnConditionHook>) -> Self {
        self.hook = hook;
        self
    }

    async fn fresh_book(&self, book_id: Uuid) -> AppResult<Book> {
        let store = &self.repository.store;
        self.coordinator
            .fetch("books.get", || store.get_book(book_id))
            .await
    }

    /// Lend an available book to a user until `due_date`
    pub async fn issue(&self, request: IssueBook) -> AppResult<Transaction> {
        let due_date = parse_due_date(&request.due_date)?;
        if due_date <= Utc::now() {
            return Err(AppError::validation("due_date", "Due date must be in the future"));
        }

        let book = self.fresh_book(request.book_id).await?;
        let store = &self.repository.store;
        let user = self
            .coordinator
            .fetch("users.get", || store.get_user(request.user_id))
            .await?;

        if book.state() != BookState::Available {
            return Err(AppError::BookNotAvailable { book_id: book.id });
        }

        let transaction = self
            .coordinator
            .mutate("transactions.create", || {
                store.create_transaction(book.id, user.id, due_date)
            })
            .await?;

        tracing::info!(
            "Issued book {} to user {} until {} (transaction {})",
            book.id,
            user.id,
            due_date,
            transaction.id
        );
        Ok(transaction)
    }

    /// Take a book back from the user it was issued to
    pub async fn return_book(&self, request: ReturnBook) -> AppResult<ReturnOutcome> {
        let condition: ReturnCondition = request.condition.parse()?;
        let notes = validate_notes(request.notes.as_deref())?;
        let (book_id, user_id) = (request.book_id, request.user_id);

        let book = self.fresh_book(book_id).await?;
        let store = &self.repository.store;
        let open = self
            .coordinator
            .fetch("transactions.open", || store.find_open_transaction(book_id))
            .await?;

        let transaction = match open {
            Some(t) if book.state() == BookState::Issued => t,
            _ => return Err(AppError::AlreadyReturned { book_id }),
        };
        if transaction.user_id != user_id {
            return Err(AppError::NotIssuedToUser { book_id, user_id });
        }

        self.validator.check(book_id, user_id).await?;

        // The late fine is recorded while the loan is still open, so a failed write leaves
        // the book issued and the return can be retried
        let returned_at = Utc::now();
        let fine = self
            .fines
            .assess_late_return(&transaction, &book, self.fine_per_day, returned_at)
            .await?;

        let closed = self
            .coordinator
            .mutate("transactions.close", || {
                store.close_transaction(transaction.id, returned_at, condition, notes.clone())
            })
            .await
            .map_err(|e| {
                if let Some(fine) = &fine {
                    tracing::warn!(
                        "Transaction {} left open with pending fine {} after failed close: {}",
                        transaction.id,
                        fine.id,
                        e
                    );
                }
                e
            })?;

        if condition.requires_fee() {
            self.hook.on_condition_fee(&closed, &book, condition);
        }

        tracing::info!(
            "Book {} returned by user {} in {} condition",
            book_id,
            user_id,
            condition
        );

        Ok(ReturnOutcome {
            transaction: closed,
            fine,
            book_state: BookState::Available,
        })
    }

    /// A user's transactions, newest first, with live statuses
    pub async fn user_history(&self, caller: Option<&str>, user_id: Uuid) -> AppResult<Vec<Transaction>> {
        let store = Arc::clone(&self.repository.store);
        let mut transactions = self
            .coordinator
            .read(CacheKey::new(caller, "transactions.user", &user_id), move || {
                let store = Arc::clone(&store);
                async move {
                    store.get_user(user_id).await?;
                    store.list_user_transactions(user_id).await
                }
            })
            .await?;

        let now = Utc::now();
        for transaction in transactions.iter_mut() {
            transaction.status = transaction.effective_status(now);
        }
        transactions.sort_by(|a, b| b.issued_date.cmp(&a.issued_date));
        Ok(transactions)
    }

    pub async fn book_status(&self, caller: Option<&str>, book_id: Uuid) -> AppResult<BookState> {
        let store = Arc::clone(&self.repository.store);
        let book = self
            .coordinator
            .read(CacheKey::new(caller, "books.get", &book_id), move || {
                let store = Arc::clone(&store);
                async move { store.get_book(book_id).await }
            })
            .await?;
        Ok(book.state())
    }
}
