//! Error types for the circulation desk

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::fine::{Fine, FineStatus};

/// Numeric error codes exposed in error response bodies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ErrorCode {
    Failure = 1,
    NotAuthorized = 2,
    NoSuchData = 3,
    BadValue = 4,
    Duplicate = 5,
    BookNotAvailable = 6,
    AlreadyReturned = 7,
    NotIssuedToUser = 8,
    AlreadyProcessed = 9,
    CapacityExceeded = 10,
    CapacityBelowOccupancy = 11,
    ShelfNotEmpty = 12,
    InvariantViolation = 13,
    UnpaidFines = 14,
    BackendUnavailable = 15,
}

/// Closed classification of every error, so callers branch on kind instead of messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    NotFound,
    StateConflict,
    CapacityConflict,
    DependencyGuard,
    TransientInfrastructure,
    Authentication,
    Authorization,
    Internal,
}

/// Class of a transient infrastructure failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransientKind {
    Timeout,
    Network,
    Server(u16),
}

impl std::fmt::Display for TransientKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransientKind::Timeout => write!(f, "timeout"),
            TransientKind::Network => write!(f, "network error"),
            TransientKind::Server(status) => write!(f, "server error {}", status),
        }
    }
}

/// A validation message attached to one input field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// Field-level validation messages
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldErrors(pub Vec<FieldError>);

impl std::fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<String> = self
            .0
            .iter()
            .map(|e| format!("{}: {}", e.field, e.message))
            .collect();
        write!(f, "{}", parts.join("; "))
    }
}

/// Main application error type
#[derive(Error, Debug, Clone)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(FieldErrors),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Book {book_id} is not available")]
    BookNotAvailable { book_id: Uuid },

    #[error("Book {book_id} has no active transaction")]
    AlreadyReturned { book_id: Uuid },

    #[error("Book {book_id} is not issued to user {user_id}")]
    NotIssuedToUser { book_id: Uuid, user_id: Uuid },

    #[error("Fine {fine_id} was already processed ({status})")]
    AlreadyProcessed { fine_id: Uuid, status: FineStatus },

    #[error("Shelf {shelf_id} is full ({capacity} books)")]
    CapacityExceeded { shelf_id: Uuid, capacity: u32 },

    #[error("Shelf {shelf_id} holds {current_books} books, capacity {requested} is too small")]
    CapacityBelowOccupancy {
        shelf_id: Uuid,
        requested: u32,
        current_books: u32,
    },

    #[error("Shelf {shelf_id} still holds {current_books} books")]
    ShelfNotEmpty { shelf_id: Uuid, current_books: u32 },

    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    #[error("{} unpaid fine(s) totalling {total} must be settled first", .fines.len())]
    UnpaidFines { total: Decimal, fines: Vec<Fine> },

    #[error("Backend {kind} after {attempts} attempt(s)")]
    Transient {
        kind: TransientKind,
        attempts: u32,
        may_have_applied: bool,
    },

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Authorization failed: {0}")]
    Authorization(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    /// Single-field validation error
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        AppError::Validation(FieldErrors(vec![FieldError {
            field: field.into(),
            message: message.into(),
        }]))
    }

    /// Transient failure of a single attempt
    pub fn transient(kind: TransientKind) -> Self {
        AppError::Transient {
            kind,
            attempts: 1,
            may_have_applied: false,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::Validation(_) => ErrorKind::Validation,
            AppError::NotFound(_) => ErrorKind::NotFound,
            AppError::Conflict(_)
            | AppError::BookNotAvailable { .. }
            | AppError::AlreadyReturned { .. }
            | AppError::NotIssuedToUser { .. }
            | AppError::AlreadyProcessed { .. } => ErrorKind::StateConflict,
            AppError::CapacityExceeded { .. }
            | AppError::CapacityBelowOccupancy { .. }
            | AppError::ShelfNotEmpty { .. }
            | AppError::InvariantViolation(_) => ErrorKind::CapacityConflict,
            AppError::UnpaidFines { .. } => ErrorKind::DependencyGuard,
            AppError::Transient { .. } => ErrorKind::TransientInfrastructure,
            AppError::Authentication(_) => ErrorKind::Authentication,
            AppError::Authorization(_) => ErrorKind::Authorization,
            AppError::Internal(_) => ErrorKind::Internal,
        }
    }

    pub fn is_transient(&self) -> bool {
        self.kind() == ErrorKind::TransientInfrastructure
    }

    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            AppError::Transient {
                kind: TransientKind::Timeout,
                ..
            }
        )
    }

    /// Record how many attempts were made before this error surfaced
    pub(crate) fn with_attempts(self, made: u32) -> Self {
        match self {
            AppError::Transient {
                kind,
                may_have_applied,
                ..
            } => AppError::Transient {
                kind,
                attempts: made,
                may_have_applied,
            },
            other => other,
        }
    }

    /// Flag a transient failure of a mutating call as an ambiguous outcome
    pub(crate) fn into_ambiguous(self) -> Self {
        match self {
            AppError::Transient { kind, attempts, .. } => AppError::Transient {
                kind,
                attempts,
                may_have_applied: true,
            },
            other => other,
        }
    }

    fn details(&self) -> Option<serde_json::Value> {
        match self {
            AppError::Validation(errors) => serde_json::to_value(&errors.0).ok(),
            AppError::UnpaidFines { total, fines } => Some(serde_json::json!({
                "total": total,
                "fines": fines,
            })),
            AppError::Transient {
                attempts,
                may_have_applied,
                ..
            } => Some(serde_json::json!({
                "attempts": attempts,
                "may_have_applied": may_have_applied,
            })),
            _ => None,
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut fields: Vec<FieldError> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errs)| {
                errs.iter().map(move |err| FieldError {
                    field: field.to_string(),
                    message: err
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| err.code.to_string()),
                })
            })
            .collect();
        fields.sort_by(|a, b| a.field.cmp(&b.field));
        AppError::Validation(FieldErrors(fields))
    }
}

/// Error response body
#[derive(Serialize, ToSchema)]
pub struct ErrorResponse {
    pub code: u32,
    pub error: String,
    pub kind: ErrorKind,
    pub message: String,
    /// Structured detail (field errors, unpaid fines, retry information)
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub details: Option<serde_json::Value>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            AppError::Validation(_) => (StatusCode::BAD_REQUEST, ErrorCode::BadValue),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, ErrorCode::NoSuchData),
            AppError::Conflict(_) => (StatusCode::CONFLICT, ErrorCode::Duplicate),
            AppError::BookNotAvailable { .. } => (StatusCode::CONFLICT, ErrorCode::BookNotAvailable),
            AppError::AlreadyReturned { .. } => (StatusCode::CONFLICT, ErrorCode::AlreadyReturned),
            AppError::NotIssuedToUser { .. } => (StatusCode::CONFLICT, ErrorCode::NotIssuedToUser),
            AppError::AlreadyProcessed { .. } => (StatusCode::CONFLICT, ErrorCode::AlreadyProcessed),
            AppError::CapacityExceeded { .. } => (StatusCode::CONFLICT, ErrorCode::CapacityExceeded),
            AppError::CapacityBelowOccupancy { .. } => {
                (StatusCode::CONFLICT, ErrorCode::CapacityBelowOccupancy)
            }
            AppError::ShelfNotEmpty { .. } => (StatusCode::CONFLICT, ErrorCode::ShelfNotEmpty),
            AppError::InvariantViolation(msg) => {
                tracing::error!("Invariant violation: {}", msg);
                (StatusCode::CONFLICT, ErrorCode::InvariantViolation)
            }
            AppError::UnpaidFines { .. } => {
                (StatusCode::UNPROCESSABLE_ENTITY, ErrorCode::UnpaidFines)
            }
            AppError::Transient {
                kind: TransientKind::Timeout,
                ..
            } => (StatusCode::GATEWAY_TIMEOUT, ErrorCode::BackendUnavailable),
            AppError::Transient { .. } => (StatusCode::BAD_GATEWAY, ErrorCode::BackendUnavailable),
            AppError::Authentication(_) => (StatusCode::UNAUTHORIZED, ErrorCode::NotAuthorized),
            AppError::Authorization(_) => (StatusCode::FORBIDDEN, ErrorCode::NotAuthorized),
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, ErrorCode::Failure)
            }
        };

        let message = match &self {
            AppError::Internal(_) => "Internal server error".to_string(),
            other => other.to_string(),
        };

        let body = Json(ErrorResponse {
            code: code as u32,
            error: format!("{:?}", code),
            kind: self.kind(),
            message,
            details: self.details(),
        });

        (status, body).into_response()
    }
}

/// Result type alias for application operations
pub type AppResult<T> = Result<T, AppError>;
