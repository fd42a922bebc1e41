//! Report endpoints

use axum::{extract::State, Json};

use crate::{models::report::CirculationReport, AppState};

use super::CallerId;

/// Circulation summary
#[utoipa::path(
    get,
    path = "/reports/summary",
    tag = "reports",
    responses(
        (status = 200, description = "Fines, shelves, books and open transactions", body = CirculationReport)
    )
)]
pub async fn get_summary(
    State(state): State<AppState>,
    caller: CallerId,
) -> Json<CirculationReport> {
    Json(state.services.reports.summary(caller.as_deref()).await)
}
