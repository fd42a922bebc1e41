//! Station scan endpoint

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use crate::{error::AppResult, models::ScanEvent, AppState};

/// Wait briefly for the next scan at a station
#[utoipa::path(
    get,
    path = "/scans/{station}",
    tag = "scans",
    params(
        ("station" = String, Path, description = "Circulation station name")
    ),
    responses(
        (status = 200, description = "Scan received", body = ScanEvent),
        (status = 204, description = "No scan before the poll gave up")
    )
)]
pub async fn get_pending_scan(
    State(state): State<AppState>,
    Path(station): Path<String>,
) -> AppResult<Response> {
    let response = match state.services.scans.poll(&station).await? {
        Some(event) => Json(event).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    };
    Ok(response)
}
