//! API integration tests

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use chrono::{Duration, Utc};
use circulation_desk::{api, models::ScanEvent};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use tower::ServiceExt;

use crate::support::{backdated_loan, book, desk, shelf, user, Desk};

fn app(desk: &Desk) -> Router {
    api::router(desk.state.clone())
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder()
        .method(method)
        .uri(format!("/api/v1{}", uri))
        .header("x-caller-id", "desk-7");
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string())),
        None => builder.body(Body::empty()),
    }
    .expect("Failed to build request");

    let response = app
        .clone()
        .oneshot(request)
        .await
        .expect("Failed to send request");
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Failed to read body");
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("Failed to parse response")
    };
    (status, body)
}

fn decimal(value: &Value) -> Decimal {
    match value {
        Value::String(s) => s.parse().expect("Invalid decimal string"),
        other => other.to_string().parse().expect("Invalid decimal number"),
    }
}

#[tokio::test]
async fn test_health_check() {
    let desk = desk();
    let (status, body) = send(&app(&desk), "GET", "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["backend"], "memory");
}

#[tokio::test]
async fn test_readiness_check() {
    let desk = desk();
    let (status, body) = send(&app(&desk), "GET", "/ready", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ready");
}

#[tokio::test]
async fn test_shelf_and_book_lifecycle() {
    let desk = desk();
    let app = app(&desk);

    let (status, shelf) = send(
        &app,
        "POST",
        "/shelves",
        Some(json!({
            "name": "Fiction A",
            "rack_id": uuid::Uuid::new_v4(),
            "capacity": 2
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let shelf_id = shelf["id"].as_str().unwrap().to_string();

    let (status, book) = send(
        &app,
        "POST",
        "/books",
        Some(json!({
            "isbn": "978-0-306-40615-7",
            "title": "Dune",
            "author": "Frank Herbert",
            "placement": { "rack_id": shelf["rack_id"], "shelf_id": shelf_id }
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(book["isbn"], "9780306406157");
    assert_eq!(book["is_available"], true);

    let (status, utilization) = send(&app, "GET", &format!("/shelves/{}", shelf_id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(utilization["current_books"], 1);
    assert_eq!(utilization["utilization_percentage"], 50);

    let (status, body) = send(
        &app,
        "PUT",
        &format!("/shelves/{}/capacity", shelf_id),
        Some(json!({ "capacity": 0 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "validation");

    let (status, body) = send(&app, "DELETE", &format!("/shelves/{}", shelf_id), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "ShelfNotEmpty");
    assert_eq!(body["kind"], "capacity_conflict");

    let book_id = book["id"].as_str().unwrap();
    let (status, _) = send(&app, "DELETE", &format!("/books/{}", book_id), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(&app, "DELETE", &format!("/shelves/{}", shelf_id), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_duplicate_isbn_is_conflict() {
    let desk = desk();
    let app = app(&desk);
    let shelf = shelf(&desk, 5).await;
    let existing = book(&desk, &shelf).await;

    let (status, body) = send(
        &app,
        "POST",
        "/books",
        Some(json!({
            "isbn": existing.isbn,
            "title": "Another copy",
            "author": "Someone",
            "placement": { "rack_id": shelf.rack_id, "shelf_id": shelf.id }
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["kind"], "state_conflict");
}

#[tokio::test]
async fn test_issue_and_return_over_http() {
    let desk = desk();
    let app = app(&desk);
    let shelf = shelf(&desk, 5).await;
    let book = book(&desk, &shelf).await;
    let reader = user(&desk, "Hana").await;

    let due = (Utc::now() + Duration::days(10)).format("%Y-%m-%d").to_string();
    let (status, transaction) = send(
        &app,
        "POST",
        "/circulation/issue",
        Some(json!({ "book_id": book.id, "user_id": reader.id, "due_date": due })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(transaction["status"], "current");

    let (status, body) = send(
        &app,
        "POST",
        "/circulation/issue",
        Some(json!({ "book_id": book.id, "user_id": reader.id, "due_date": due })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "BookNotAvailable");

    let (_, status_body) = send(&app, "GET", &format!("/books/{}/status", book.id), None).await;
    assert_eq!(status_body["state"], "issued");

    let (status, outcome) = send(
        &app,
        "POST",
        "/circulation/return",
        Some(json!({ "book_id": book.id, "user_id": reader.id, "condition": "good" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(outcome["book_state"], "available");
    assert_eq!(outcome["transaction"]["status"], "returned");
    assert!(outcome["fine"].is_null());

    let (status, history) = send(&app, "GET", &format!("/users/{}/transactions", reader.id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(history.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_past_due_date_is_bad_request() {
    let desk = desk();
    let app = app(&desk);
    let shelf = shelf(&desk, 5).await;
    let book = book(&desk, &shelf).await;
    let reader = user(&desk, "Ravi").await;

    let (status, body) = send(
        &app,
        "POST",
        "/circulation/issue",
        Some(json!({ "book_id": book.id, "user_id": reader.id, "due_date": "2020-02-02" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["details"][0]["field"], "due_date");
}

#[tokio::test]
async fn test_unknown_book_is_not_found() {
    let desk = desk();
    let (status, body) = send(
        &app(&desk),
        "GET",
        &format!("/books/{}", uuid::Uuid::new_v4()),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["kind"], "not_found");
}

#[tokio::test]
async fn test_fines_over_http() {
    let desk = desk();
    let app = app(&desk);
    let shelf = shelf(&desk, 5).await;
    let book = book(&desk, &shelf).await;
    let reader = user(&desk, "Aiko").await;
    backdated_loan(&desk, &book, &reader, 15).await;

    let (status, report) = send(&app, "POST", "/fines/calculate", Some(json!({ "fine_per_day": 5 }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["fines_created"], 1);
    assert_eq!(report["details"][0]["outcome"], "created");
    assert_eq!(decimal(&report["details"][0]["fine_amount"]), Decimal::from(75));

    let (status, body) = send(&app, "POST", "/fines/calculate", Some(json!({ "fine_per_day": 0 }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "validation");

    let (status, pending) = send(&app, "GET", "/fines?status=pending", None).await;
    assert_eq!(status, StatusCode::OK);
    let fine_id = pending[0]["id"].as_str().unwrap().to_string();

    let (status, on_book) = send(&app, "GET", &format!("/books/{}/fines", book.id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(on_book.as_array().unwrap().len(), 1);

    let (status, body) = send(
        &app,
        "POST",
        "/circulation/return",
        Some(json!({ "book_id": book.id, "user_id": reader.id, "condition": "good" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["kind"], "dependency_guard");
    assert_eq!(decimal(&body["details"]["total"]), Decimal::from(75));
    assert_eq!(body["details"]["fines"][0]["id"], fine_id);

    let (status, body) = send(
        &app,
        "POST",
        &format!("/fines/{}/pay", fine_id),
        Some(json!({ "payment_method": "cheque" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "validation");

    let (status, paid) = send(
        &app,
        "POST",
        &format!("/fines/{}/pay", fine_id),
        Some(json!({ "payment_method": "upi", "notes": "" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(paid["status"], "paid");
    assert_eq!(paid["payment_method"], "upi");

    let (status, body) = send(
        &app,
        "POST",
        &format!("/fines/{}/waive", fine_id),
        Some(json!({ "reason": "Paid by mistake, reversing" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "AlreadyProcessed");

    let (status, _) = send(
        &app,
        "POST",
        "/circulation/return",
        Some(json!({ "book_id": book.id, "user_id": reader.id, "condition": "good" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_report_summary() {
    let desk = desk();
    let app = app(&desk);
    let shelf = shelf(&desk, 4).await;
    let late = book(&desk, &shelf).await;
    book(&desk, &shelf).await;
    let reader = user(&desk, "Zoe").await;
    backdated_loan(&desk, &late, &reader, 2).await;

    let (status, report) = send(&app, "GET", "/reports/summary", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["books"]["total"], 2);
    assert_eq!(report["books"]["issued"], 1);
    assert_eq!(report["transactions"]["overdue"], 1);
    assert_eq!(report["shelves"][0]["utilization_percentage"], 50);
    assert_eq!(report["fines"]["pending"]["count"], 0);
}

#[tokio::test]
async fn test_pending_scan_lookup() {
    let desk = desk();
    let app = app(&desk);

    let (status, _) = send(&app, "GET", "/scans/desk-1", None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    desk.store
        .push_scan(ScanEvent {
            station: "desk-1".into(),
            isbn: Some("9780306406157".into()),
            rfid: None,
            scanned_at: Utc::now(),
        })
        .await;

    let (status, body) = send(&app, "GET", "/scans/desk-1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["isbn"], "9780306406157");
}

#[tokio::test]
async fn test_openapi_document_is_served() {
    let desk = desk();
    let response = app(&desk)
        .oneshot(
            Request::builder()
                .uri("/api-docs/openapi.json")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
