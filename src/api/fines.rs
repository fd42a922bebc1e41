//! Fine endpoints

use axum::{
    extract::{Path, Query, State},
    Json,
};
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::{
        fine::{CalculateFines, FineCalculationReport, FineQuery, PayFine, WaiveFine},
        Fine,
    },
    AppState,
};

use super::CallerId;

/// List fines
#[utoipa::path(
    get,
    path = "/fines",
    tag = "fines",
    params(FineQuery),
    responses(
        (status = 200, description = "Fines matching the filter", body = Vec<Fine>)
    )
)]
pub async fn list_fines(
    State(state): State<AppState>,
    caller: CallerId,
    Query(query): Query<FineQuery>,
) -> AppResult<Json<Vec<Fine>>> {
    let fines = state
        .services
        .fines
        .list_fines(caller.as_deref(), query.status)
        .await?;
    Ok(Json(fines))
}

/// Create pending fines for overdue transactions
#[utoipa::path(
    post,
    path = "/fines/calculate",
    tag = "fines",
    request_body = CalculateFines,
    responses(
        (status = 200, description = "Calculation summary", body = FineCalculationReport),
        (status = 400, description = "Rate out of range")
    )
)]
pub async fn calculate_fines(
    State(state): State<AppState>,
    Json(request): Json<CalculateFines>,
) -> AppResult<Json<FineCalculationReport>> {
    let report = state
        .services
        .fines
        .calculate_fines(request.fine_per_day)
        .await?;
    Ok(Json(report))
}

/// Record payment of a fine
#[utoipa::path(
    post,
    path = "/fines/{id}/pay",
    tag = "fines",
    params(
        ("id" = Uuid, Path, description = "Fine ID")
    ),
    request_body = PayFine,
    responses(
        (status = 200, description = "Fine paid", body = Fine),
        (status = 400, description = "Unknown payment method"),
        (status = 404, description = "Fine not found"),
        (status = 409, description = "Fine already paid or waived")
    )
)]
pub async fn pay_fine(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<PayFine>,
) -> AppResult<Json<Fine>> {
    let fine = state.services.fines.pay_fine(id, request).await?;
    Ok(Json(fine))
}

/// Waive a fine
#[utoipa::path(
    post,
    path = "/fines/{id}/waive",
    tag = "fines",
    params(
        ("id" = Uuid, Path, description = "Fine ID")
    ),
    request_body = WaiveFine,
    responses(
        (status = 200, description = "Fine waived", body = Fine),
        (status = 400, description = "Waiver reason rejected"),
        (status = 404, description = "Fine not found"),
        (status = 409, description = "Fine already paid or waived")
    )
)]
pub async fn waive_fine(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<WaiveFine>,
) -> AppResult<Json<Fine>> {
    let fine = state.services.fines.waive_fine(id, request).await?;
    Ok(Json(fine))
}
