//! REST backend client
//!
//! Speaks JSON to the library backend. HTTP statuses are mapped onto `AppError` variants by
//! status code only; response bodies are used for messages, never for classification.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use rust_decimal::Decimal;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

use super::{CirculationStore, ScanSource};
use crate::{
    error::{AppError, AppResult, TransientKind},
    models::{
        Book, Fine, FineStatus, FineStatusUpdate, ReturnCondition, ScanEvent, Shelf,
        ShelfPlacement, Transaction, TransactionStatus, User,
    },
};

#[derive(Clone)]
pub struct RestStore {
    client: Client,
    base_url: String,
    api_token: Option<String>,
}

#[derive(Deserialize)]
struct BackendErrorBody {
    message: Option<String>,
    error: Option<String>,
}

#[derive(Serialize)]
struct CreateTransactionBody {
    book_id: Uuid,
    user_id: Uuid,
    due_date: DateTime<Utc>,
}

#[derive(Serialize)]
struct CloseTransactionBody {
    return_date: DateTime<Utc>,
    condition: ReturnCondition,
    notes: Option<String>,
}

#[derive(Serialize)]
struct OverdueBody {
    days_overdue: i64,
    fine_amount: Decimal,
}

#[derive(Serialize)]
struct OccupancyBody {
    delta: i32,
}

#[derive(Serialize)]
struct CapacityBody {
    capacity: u32,
}

impl RestStore {
    pub fn new(base_url: &str, api_token: Option<String>, connect_timeout: Duration) -> AppResult<Self> {
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_token,
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self
            .client
            .request(method, format!("{}/{}", self.base_url, path));
        match &self.api_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder) -> AppResult<Response> {
        let response = builder.send().await.map_err(transport_error)?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let message = response
            .json::<BackendErrorBody>()
            .await
            .ok()
            .and_then(|b| b.message.or(b.error))
            .unwrap_or_else(|| status.to_string());
        Err(status_error(status, message))
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> AppResult<T> {
        let response = self.send(self.request(Method::GET, path).query(query)).await?;
        response.json::<T>().await.map_err(decode_error)
    }

    async fn send_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: &B,
    ) -> AppResult<T> {
        let response = self.send(self.request(method, path).json(body)).await?;
        response.json::<T>().await.map_err(decode_error)
    }

    async fn delete(&self, path: &str) -> AppResult<()> {
        self.send(self.request(Method::DELETE, path)).await?;
        Ok(())
    }

    /// GET that treats 404/204 as absence
    async fn get_optional<T: DeserializeOwned>(&self, path: &str) -> AppResult<Option<T>> {
        match self.send(self.request(Method::GET, path)).await {
            Ok(response) if response.status() == StatusCode::NO_CONTENT => Ok(None),
            Ok(response) => response.json::<T>().await.map(Some).map_err(decode_error),
            Err(AppError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// Map a non-success HTTP status onto the error taxonomy
pub(crate) fn status_error(status: StatusCode, message: String) -> AppError {
    match status.as_u16() {
        401 => AppError::Authentication(message),
        403 => AppError::Authorization(message),
        404 => AppError::NotFound(message),
        409 => AppError::Conflict(message),
        400 | 422 => AppError::validation("request", message),
        408 => AppError::transient(TransientKind::Timeout),
        429 => AppError::transient(TransientKind::Server(429)),
        code if code >= 500 => AppError::transient(TransientKind::Server(code)),
        _ => AppError::Internal(format!("Unexpected backend status {}: {}", status, message)),
    }
}

fn transport_error(e: reqwest::Error) -> AppError {
    if e.is_timeout() {
        AppError::transient(TransientKind::Timeout)
    } else if e.is_builder() {
        AppError::Internal(format!("Invalid backend request: {}", e))
    } else {
        tracing::debug!("Backend transport error: {}", e);
        AppError::transient(TransientKind::Network)
    }
}

fn decode_error(e: reqwest::Error) -> AppError {
    AppError::Internal(format!("Failed to decode backend response: {}", e))
}

#[async_trait]
impl CirculationStore for RestStore {
    async fn get_book(&self, id: Uuid) -> AppResult<Book> {
        self.get_json(&format!("books/{}", id), &[]).await
    }

    async fn find_book_by_isbn(&self, isbn: &str) -> AppResult<Option<Book>> {
        let books: Vec<Book> = self
            .get_json("books", &[("isbn", isbn.to_string())])
            .await?;
        Ok(books.into_iter().find(|b| b.isbn == isbn))
    }

    async fn list_books(&self) -> AppResult<Vec<Book>> {
        self.get_json("books", &[]).await
    }

    async fn insert_book(&self, book: Book) -> AppResult<Book> {
        self.send_json(Method::POST, "books", &book).await
    }

    async fn update_book_placement(&self, id: Uuid, placement: ShelfPlacement) -> AppResult<Book> {
        self.send_json(Method::PUT, &format!("books/{}/placement", id), &placement)
            .await
    }

    async fn delete_book(&self, id: Uuid) -> AppResult<()> {
        self.delete(&format!("books/{}", id))
            .await
            .map_err(|e| match e {
                AppError::Conflict(_) => AppError::BookNotAvailable { book_id: id },
                other => other,
            })
    }

    async fn get_user(&self, id: Uuid) -> AppResult<User> {
        self.get_json(&format!("users/{}", id), &[]).await
    }

    async fn get_shelf(&self, id: Uuid) -> AppResult<Shelf> {
        self.get_json(&format!("shelves/{}", id), &[]).await
    }

    async fn list_shelves(&self) -> AppResult<Vec<Shelf>> {
        self.get_json("shelves", &[]).await
    }

    async fn insert_shelf(&self, shelf: Shelf) -> AppResult<Shelf> {
        self.send_json(Method::POST, "shelves", &shelf).await
    }

    async fn adjust_shelf_occupancy(&self, id: Uuid, delta: i32) -> AppResult<Shelf> {
        let result = self
            .send_json(
                Method::POST,
                &format!("shelves/{}/occupancy", id),
                &OccupancyBody { delta },
            )
            .await;

        match result {
            Err(AppError::Conflict(msg)) if delta > 0 => {
                tracing::debug!("Backend refused occupancy change: {}", msg);
                let shelf = self.get_shelf(id).await?;
                Err(AppError::CapacityExceeded {
                    shelf_id: id,
                    capacity: shelf.capacity,
                })
            }
            Err(AppError::Conflict(msg)) => Err(AppError::InvariantViolation(msg)),
            other => other,
        }
    }

    async fn update_shelf_capacity(&self, id: Uuid, capacity: u32) -> AppResult<Shelf> {
        self.send_json(
            Method::PUT,
            &format!("shelves/{}/capacity", id),
            &CapacityBody { capacity },
        )
        .await
    }

    async fn delete_shelf(&self, id: Uuid) -> AppResult<()> {
        self.delete(&format!("shelves/{}", id)).await
    }

    async fn create_transaction(
        &self,
        book_id: Uuid,
        user_id: Uuid,
        due_date: DateTime<Utc>,
    ) -> AppResult<Transaction> {
        let body = CreateTransactionBody {
            book_id,
            user_id,
            due_date,
        };
        self.send_json(Method::POST, "transactions", &body)
            .await
            .map_err(|e| match e {
                AppError::Conflict(_) => AppError::BookNotAvailable { book_id },
                other => other,
            })
    }

    async fn close_transaction(
        &self,
        id: Uuid,
        return_date: DateTime<Utc>,
        condition: ReturnCondition,
        notes: Option<String>,
    ) -> AppResult<Transaction> {
        let body = CloseTransactionBody {
            return_date,
            condition,
            notes,
        };
        self.send_json(Method::POST, &format!("transactions/{}/close", id), &body)
            .await
    }

    async fn find_open_transaction(&self, book_id: Uuid) -> AppResult<Option<Transaction>> {
        self.get_optional(&format!("books/{}/open-transaction", book_id))
            .await
    }

    async fn list_transactions(&self, status: Option<TransactionStatus>) -> AppResult<Vec<Transaction>> {
        let query: Vec<(&str, String)> = status
            .map(|s| vec![("status", s.to_string())])
            .unwrap_or_default();
        self.get_json("transactions", &query).await
    }

    async fn list_user_transactions(&self, user_id: Uuid) -> AppResult<Vec<Transaction>> {
        self.get_json(&format!("users/{}/transactions", user_id), &[])
            .await
    }

    async fn mark_transaction_overdue(
        &self,
        id: Uuid,
        days_overdue: i64,
        fine_amount: Decimal,
    ) -> AppResult<Transaction> {
        self.send_json(
            Method::POST,
            &format!("transactions/{}/overdue", id),
            &OverdueBody {
                days_overdue,
                fine_amount,
            },
        )
        .await
    }

    async fn fetch_fines(&self, status: Option<FineStatus>) -> AppResult<Vec<Fine>> {
        let query: Vec<(&str, String)> = status
            .map(|s| vec![("status", s.to_string())])
            .unwrap_or_default();
        self.get_json("fines", &query).await
    }

    async fn get_fine(&self, id: Uuid) -> AppResult<Fine> {
        self.get_json(&format!("fines/{}", id), &[]).await
    }

    async fn persist_fine(&self, fine: Fine) -> AppResult<Fine> {
        self.send_json(Method::POST, "fines", &fine).await
    }

    async fn update_fine_status(&self, id: Uuid, update: FineStatusUpdate) -> AppResult<Fine> {
        let result = self
            .send_json(Method::PUT, &format!("fines/{}/status", id), &update)
            .await;

        match result {
            Err(AppError::Conflict(msg)) => {
                tracing::debug!("Backend refused fine update: {}", msg);
                let fine = self.get_fine(id).await?;
                Err(AppError::AlreadyProcessed {
                    fine_id: id,
                    status: fine.status,
                })
            }
            other => other,
        }
    }
}

#[async_trait]
impl ScanSource for RestStore {
    async fn take_pending_scan(&self, station: &str) -> AppResult<Option<ScanEvent>> {
        self.get_optional(&format!("scans/{}/pending", station))
            .await
    }
}
