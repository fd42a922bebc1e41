//! Shared fixtures: a circulation desk wired to an in-memory store

use chrono::{Duration, Utc};
use circulation_desk::{
    config::{AppConfig, ScannerConfig},
    models::{book::CreateBook, shelf::CreateShelf, Book, Shelf, ShelfPlacement, Transaction, User},
    repository::{memory::MemoryStore, Repository},
    services::Services,
    AppState,
};
use std::sync::Arc;
use uuid::Uuid;

pub struct Desk {
    pub store: MemoryStore,
    pub state: AppState,
}

impl Desk {
    pub fn services(&self) -> &Services {
        &self.state.services
    }
}

pub fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.scanner = ScannerConfig {
        max_attempts: 3,
        interval_ms: 1,
        timeout_ms: 200,
    };
    config
}

pub fn desk() -> Desk {
    let config = test_config();
    let store = MemoryStore::new();
    let services = Services::new(Repository::memory(store.clone()), &config)
        .expect("Failed to build services");

    Desk {
        store,
        state: AppState {
            config: Arc::new(config),
            services: Arc::new(services),
        },
    }
}

pub async fn shelf(desk: &Desk, capacity: u32) -> Shelf {
    desk.services()
        .shelves
        .create_shelf(CreateShelf {
            name: format!("Shelf {}", &Uuid::new_v4().to_string()[..8]),
            rack_id: Uuid::new_v4(),
            capacity,
        })
        .await
        .expect("Failed to create shelf")
}

/// A random valid ISBN-13 shaped identifier
pub fn isbn() -> String {
    let digits: String = Uuid::new_v4()
        .as_u128()
        .to_string()
        .chars()
        .take(10)
        .collect();
    format!("978{}", digits)
}

pub async fn book(desk: &Desk, shelf: &Shelf) -> Book {
    desk.services()
        .catalog
        .add_book(CreateBook {
            isbn: isbn(),
            title: "Distributed Systems".into(),
            author: "Tanenbaum".into(),
            genre: Some("Computing".into()),
            placement: ShelfPlacement {
                rack_id: shelf.rack_id,
                shelf_id: shelf.id,
            },
        })
        .await
        .expect("Failed to add book")
}

pub async fn user(desk: &Desk, name: &str) -> User {
    desk.store.add_user(name).await
}

/// Open a transaction whose due date passed `days_late` days ago
pub async fn backdated_loan(desk: &Desk, book: &Book, user: &User, days_late: i64) -> Transaction {
    let now = Utc::now();
    let transaction = Transaction::open(
        book.id,
        user.id,
        now - Duration::days(days_late + 14),
        now - Duration::days(days_late),
    );
    desk.store
        .insert_transaction(transaction)
        .await
        .expect("Failed to insert backdated transaction")
}
