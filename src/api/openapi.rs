//! OpenAPI documentation

use axum::Router;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{books, circulation, fines, health, reports, scans, shelves};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Circulation Desk API",
        version = "0.1.0",
        description = "Library circulation, shelf capacity and fines REST API"
    ),
    servers(
        (url = "/api/v1", description = "API v1")
    ),
    paths(
        // Health
        health::health_check,
        health::readiness_check,
        // Books
        books::list_books,
        books::get_book,
        books::create_book,
        books::move_book,
        books::delete_book,
        books::get_book_status,
        books::get_pending_fines,
        // Shelves
        shelves::list_shelves,
        shelves::get_shelf,
        shelves::create_shelf,
        shelves::resize_shelf,
        shelves::delete_shelf,
        // Circulation
        circulation::issue_book,
        circulation::return_book,
        circulation::get_user_history,
        // Fines
        fines::list_fines,
        fines::calculate_fines,
        fines::pay_fine,
        fines::waive_fine,
        // Reports
        reports::get_summary,
        // Scans
        scans::get_pending_scan,
    ),
    components(
        schemas(
            // Health
            health::HealthResponse,
            // Books
            crate::models::Book,
            crate::models::BookState,
            crate::models::ShelfPlacement,
            crate::models::book::CreateBook,
            books::BookStatusResponse,
            // Shelves
            crate::models::Shelf,
            crate::models::shelf::CreateShelf,
            crate::models::shelf::ResizeShelf,
            crate::models::shelf::ShelfUtilization,
            // Circulation
            crate::models::Transaction,
            crate::models::TransactionStatus,
            crate::models::ReturnCondition,
            crate::models::transaction::IssueBook,
            crate::models::transaction::ReturnBook,
            crate::services::circulation::ReturnOutcome,
            // Fines
            crate::models::Fine,
            crate::models::FineStatus,
            crate::models::PaymentMethod,
            crate::models::fine::PayFine,
            crate::models::fine::WaiveFine,
            crate::models::fine::CalculateFines,
            crate::models::fine::FineOutcome,
            crate::models::fine::FineCalculationDetail,
            crate::models::fine::FineCalculationReport,
            // Reports
            crate::models::report::CirculationReport,
            crate::models::report::FineStatusSummary,
            crate::models::report::FineBucket,
            crate::models::report::BookCounts,
            crate::models::report::TransactionCounts,
            // Scans
            crate::models::ScanEvent,
            // Errors
            crate::error::ErrorResponse,
            crate::error::ErrorKind,
            crate::error::FieldError,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "books", description = "Catalog management"),
        (name = "shelves", description = "Shelf capacity ledger"),
        (name = "circulation", description = "Issuing and returning books"),
        (name = "fines", description = "Overdue fines"),
        (name = "reports", description = "Circulation reports"),
        (name = "scans", description = "Station barcode/RFID scans")
    )
)]
pub struct ApiDoc;

/// Create OpenAPI documentation router
pub fn create_openapi_router() -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
