//! Catalog endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::{book::CreateBook, Book, BookState, Fine, ShelfPlacement},
    AppState,
};

use super::CallerId;

/// Availability of a single book
#[derive(Serialize, ToSchema)]
pub struct BookStatusResponse {
    pub book_id: Uuid,
    pub state: BookState,
}

/// List all books
#[utoipa::path(
    get,
    path = "/books",
    tag = "books",
    responses(
        (status = 200, description = "All books", body = Vec<Book>)
    )
)]
pub async fn list_books(
    State(state): State<AppState>,
    caller: CallerId,
) -> AppResult<Json<Vec<Book>>> {
    let books = state.services.catalog.list_books(caller.as_deref()).await?;
    Ok(Json(books))
}

/// Get a book by ID
#[utoipa::path(
    get,
    path = "/books/{id}",
    tag = "books",
    params(
        ("id" = Uuid, Path, description = "Book ID")
    ),
    responses(
        (status = 200, description = "Book details", body = Book),
        (status = 404, description = "Book not found")
    )
)]
pub async fn get_book(
    State(state): State<AppState>,
    caller: CallerId,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Book>> {
    let book = state.services.catalog.get_book(caller.as_deref(), id).await?;
    Ok(Json(book))
}

/// Add a book to the catalog
#[utoipa::path(
    post,
    path = "/books",
    tag = "books",
    request_body = CreateBook,
    responses(
        (status = 201, description = "Book created", body = Book),
        (status = 400, description = "Invalid ISBN or fields"),
        (status = 409, description = "Duplicate ISBN or shelf full")
    )
)]
pub async fn create_book(
    State(state): State<AppState>,
    Json(request): Json<CreateBook>,
) -> AppResult<(StatusCode, Json<Book>)> {
    let book = state.services.catalog.add_book(request).await?;
    Ok((StatusCode::CREATED, Json(book)))
}

/// Move a book to another shelf
#[utoipa::path(
    put,
    path = "/books/{id}/placement",
    tag = "books",
    params(
        ("id" = Uuid, Path, description = "Book ID")
    ),
    request_body = ShelfPlacement,
    responses(
        (status = 200, description = "Book moved", body = Book),
        (status = 404, description = "Book or shelf not found"),
        (status = 409, description = "Target shelf full")
    )
)]
pub async fn move_book(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(placement): Json<ShelfPlacement>,
) -> AppResult<Json<Book>> {
    let book = state.services.catalog.move_book(id, placement).await?;
    Ok(Json(book))
}

/// Delete a book that is not on loan
#[utoipa::path(
    delete,
    path = "/books/{id}",
    tag = "books",
    params(
        ("id" = Uuid, Path, description = "Book ID")
    ),
    responses(
        (status = 204, description = "Book deleted"),
        (status = 404, description = "Book not found"),
        (status = 409, description = "Book is on loan")
    )
)]
pub async fn delete_book(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    state.services.catalog.delete_book(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Whether a book is available or issued
#[utoipa::path(
    get,
    path = "/books/{id}/status",
    tag = "books",
    params(
        ("id" = Uuid, Path, description = "Book ID")
    ),
    responses(
        (status = 200, description = "Book availability", body = BookStatusResponse),
        (status = 404, description = "Book not found")
    )
)]
pub async fn get_book_status(
    State(state): State<AppState>,
    caller: CallerId,
    Path(id): Path<Uuid>,
) -> AppResult<Json<BookStatusResponse>> {
    let book_state = state
        .services
        .circulation
        .book_status(caller.as_deref(), id)
        .await?;
    Ok(Json(BookStatusResponse {
        book_id: id,
        state: book_state,
    }))
}

/// Pending fines attached to a book
#[utoipa::path(
    get,
    path = "/books/{id}/fines",
    tag = "books",
    params(
        ("id" = Uuid, Path, description = "Book ID")
    ),
    responses(
        (status = 200, description = "Pending fines on the book", body = Vec<Fine>)
    )
)]
pub async fn get_pending_fines(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Vec<Fine>>> {
    let fines = state.services.fines.pending_fines_for_book(id).await?;
    Ok(Json(fines))
}
