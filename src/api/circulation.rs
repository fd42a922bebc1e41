//! Issue and return endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::{
        transaction::{IssueBook, ReturnBook},
        Transaction,
    },
    services::circulation::ReturnOutcome,
    AppState,
};

use super::CallerId;

/// Issue a book to a user
#[utoipa::path(
    post,
    path = "/circulation/issue",
    tag = "circulation",
    request_body = IssueBook,
    responses(
        (status = 201, description = "Book issued", body = Transaction),
        (status = 400, description = "Invalid or past due date"),
        (status = 404, description = "Book or user not found"),
        (status = 409, description = "Book not available")
    )
)]
pub async fn issue_book(
    State(state): State<AppState>,
    Json(request): Json<IssueBook>,
) -> AppResult<(StatusCode, Json<Transaction>)> {
    let transaction = state.services.circulation.issue(request).await?;
    Ok((StatusCode::CREATED, Json(transaction)))
}

/// Return an issued book
#[utoipa::path(
    post,
    path = "/circulation/return",
    tag = "circulation",
    request_body = ReturnBook,
    responses(
        (status = 200, description = "Book returned", body = ReturnOutcome),
        (status = 400, description = "Invalid condition or notes"),
        (status = 409, description = "Book already returned or issued to another user"),
        (status = 422, description = "Unpaid fines must be settled first")
    )
)]
pub async fn return_book(
    State(state): State<AppState>,
    Json(request): Json<ReturnBook>,
) -> AppResult<Json<ReturnOutcome>> {
    let outcome = state.services.circulation.return_book(request).await?;
    Ok(Json(outcome))
}

/// Transaction history of a user
#[utoipa::path(
    get,
    path = "/users/{id}/transactions",
    tag = "circulation",
    params(
        ("id" = Uuid, Path, description = "User ID")
    ),
    responses(
        (status = 200, description = "User's transactions, newest first", body = Vec<Transaction>),
        (status = 404, description = "User not found")
    )
)]
pub async fn get_user_history(
    State(state): State<AppState>,
    caller: CallerId,
    Path(user_id): Path<Uuid>,
) -> AppResult<Json<Vec<Transaction>>> {
    let transactions = state
        .services
        .circulation
        .user_history(caller.as_deref(), user_id)
        .await?;
    Ok(Json(transactions))
}
