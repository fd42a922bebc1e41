//! API handlers for the circulation desk REST endpoints

pub mod books;
pub mod circulation;
pub mod fines;
pub mod health;
pub mod openapi;
pub mod reports;
pub mod scans;
pub mod shelves;

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::request::Parts,
    routing::{get, post, put},
    Router,
};
use std::convert::Infallible;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::AppState;

/// Header identifying the calling desk or user; scopes request deduplication
pub const CALLER_HEADER: &str = "x-caller-id";

/// Optional caller identity taken from the `X-Caller-Id` header
pub struct CallerId(pub Option<String>);

impl CallerId {
    pub fn as_deref(&self) -> Option<&str> {
        self.0.as_deref()
    }
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for CallerId {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let caller = parts
            .headers
            .get(CALLER_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string);

        Ok(CallerId(caller))
    }
}

/// Create the application router with all routes
pub fn router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // API v1 routes
    let api_v1 = Router::new()
        // Health check
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        // Catalog
        .route("/books", get(books::list_books).post(books::create_book))
        .route("/books/:id", get(books::get_book).delete(books::delete_book))
        .route("/books/:id/placement", put(books::move_book))
        .route("/books/:id/status", get(books::get_book_status))
        .route("/books/:id/fines", get(books::get_pending_fines))
        // Shelves
        .route("/shelves", get(shelves::list_shelves).post(shelves::create_shelf))
        .route("/shelves/:id", get(shelves::get_shelf).delete(shelves::delete_shelf))
        .route("/shelves/:id/capacity", put(shelves::resize_shelf))
        // Circulation
        .route("/circulation/issue", post(circulation::issue_book))
        .route("/circulation/return", post(circulation::return_book))
        .route("/users/:id/transactions", get(circulation::get_user_history))
        // Fines
        .route("/fines", get(fines::list_fines))
        .route("/fines/calculate", post(fines::calculate_fines))
        .route("/fines/:id/pay", post(fines::pay_fine))
        .route("/fines/:id/waive", post(fines::waive_fine))
        // Reports
        .route("/reports/summary", get(reports::get_summary))
        // Scans
        .route("/scans/:station", get(scans::get_pending_scan))
        .with_state(state);

    // OpenAPI documentation
    let openapi = openapi::create_openapi_router();

    Router::new()
        .nest("/api/v1", api_v1)
        .merge(openapi)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
