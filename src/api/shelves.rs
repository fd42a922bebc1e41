//! Shelf endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::shelf::{CreateShelf, ResizeShelf, Shelf, ShelfUtilization},
    AppState,
};

use super::CallerId;

/// List shelves with their utilization
#[utoipa::path(
    get,
    path = "/shelves",
    tag = "shelves",
    responses(
        (status = 200, description = "All shelves", body = Vec<ShelfUtilization>)
    )
)]
pub async fn list_shelves(
    State(state): State<AppState>,
    caller: CallerId,
) -> AppResult<Json<Vec<ShelfUtilization>>> {
    let shelves = state.services.shelves.utilization(caller.as_deref()).await?;
    Ok(Json(shelves))
}

/// Get a shelf by ID
#[utoipa::path(
    get,
    path = "/shelves/{id}",
    tag = "shelves",
    params(
        ("id" = Uuid, Path, description = "Shelf ID")
    ),
    responses(
        (status = 200, description = "Shelf utilization", body = ShelfUtilization),
        (status = 404, description = "Shelf not found")
    )
)]
pub async fn get_shelf(
    State(state): State<AppState>,
    caller: CallerId,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ShelfUtilization>> {
    let shelf = state.services.shelves.get_shelf(caller.as_deref(), id).await?;
    Ok(Json(ShelfUtilization::from(&shelf)))
}

/// Create a shelf
#[utoipa::path(
    post,
    path = "/shelves",
    tag = "shelves",
    request_body = CreateShelf,
    responses(
        (status = 201, description = "Shelf created", body = Shelf),
        (status = 400, description = "Invalid name or capacity")
    )
)]
pub async fn create_shelf(
    State(state): State<AppState>,
    Json(request): Json<CreateShelf>,
) -> AppResult<(StatusCode, Json<Shelf>)> {
    let shelf = state.services.shelves.create_shelf(request).await?;
    Ok((StatusCode::CREATED, Json(shelf)))
}

/// Change a shelf's capacity
#[utoipa::path(
    put,
    path = "/shelves/{id}/capacity",
    tag = "shelves",
    params(
        ("id" = Uuid, Path, description = "Shelf ID")
    ),
    request_body = ResizeShelf,
    responses(
        (status = 200, description = "Shelf resized", body = Shelf),
        (status = 404, description = "Shelf not found"),
        (status = 409, description = "Capacity below current occupancy")
    )
)]
pub async fn resize_shelf(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<ResizeShelf>,
) -> AppResult<Json<Shelf>> {
    let shelf = state
        .services
        .shelves
        .resize_capacity(id, request.capacity)
        .await?;
    Ok(Json(shelf))
}

/// Delete an empty shelf
#[utoipa::path(
    delete,
    path = "/shelves/{id}",
    tag = "shelves",
    params(
        ("id" = Uuid, Path, description = "Shelf ID")
    ),
    responses(
        (status = 204, description = "Shelf deleted"),
        (status = 404, description = "Shelf not found"),
        (status = 409, description = "Shelf still holds books")
    )
)]
pub async fn delete_shelf(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    state.services.shelves.delete_shelf(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
