//! Circulation Desk
//!
//! Library circulation engine: issuing and returning books, shelf capacity, and overdue fines,
//! served as a REST JSON API over a pluggable backing store.

use std::sync::Arc;

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod repository;
pub mod services;

pub use config::AppConfig;
pub use error::{AppError, AppResult};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub services: Arc<services::Services>,
}
