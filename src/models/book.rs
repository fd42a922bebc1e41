//! Book model and related types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};

/// Where a book sits in the library
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ShelfPlacement {
    pub rack_id: Uuid,
    pub shelf_id: Uuid,
}

/// Circulation state of a book
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum BookState {
    Available,
    Issued,
}

/// Catalogued book with its circulation projection
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Book {
    pub id: Uuid,
    /// Normalized ISBN (alphanumeric characters only)
    pub isbn: String,
    pub title: String,
    pub author: String,
    pub genre: Option<String>,
    pub placement: ShelfPlacement,
    pub is_available: bool,
    pub issued_to: Option<Uuid>,
    pub issued_date: Option<DateTime<Utc>>,
    /// Due date of the open transaction, if any
    pub return_date: Option<DateTime<Utc>>,
}

impl Book {
    pub fn state(&self) -> BookState {
        if self.is_available {
            BookState::Available
        } else {
            BookState::Issued
        }
    }

    /// Project an opened transaction onto the book
    pub fn mark_issued(&mut self, user_id: Uuid, issued_date: DateTime<Utc>, due_date: DateTime<Utc>) {
        self.is_available = false;
        self.issued_to = Some(user_id);
        self.issued_date = Some(issued_date);
        self.return_date = Some(due_date);
    }

    /// Project a closed transaction onto the book
    pub fn mark_returned(&mut self) {
        self.is_available = true;
        self.issued_to = None;
        self.issued_date = None;
        self.return_date = None;
    }
}

/// Create book request
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateBook {
    pub isbn: String,
    #[validate(length(min = 1, max = 500, message = "Title must be 1-500 characters"))]
    pub title: String,
    #[validate(length(min = 1, max = 200, message = "Author must be 1-200 characters"))]
    pub author: String,
    #[validate(length(max = 100, message = "Genre must be at most 100 characters"))]
    pub genre: Option<String>,
    pub placement: ShelfPlacement,
}

/// Strip separators from an ISBN, keeping digits and the X check character
pub fn normalize_isbn(isbn: &str) -> String {
    isbn.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

/// Normalize an ISBN and check it has the shape of an ISBN-10 or ISBN-13
pub fn parse_isbn(isbn: &str) -> AppResult<String> {
    let normalized = normalize_isbn(isbn);
    let valid = match normalized.len() {
        10 => {
            normalized[..9].chars().all(|c| c.is_ascii_digit())
                && normalized
                    .chars()
                    .last()
                    .map(|c| c.is_ascii_digit() || c == 'X')
                    .unwrap_or(false)
        }
        13 => normalized.chars().all(|c| c.is_ascii_digit()),
        _ => false,
    };

    if !valid {
        return Err(AppError::validation(
            "isbn",
            "ISBN must contain 10 or 13 digits",
        ));
    }
    Ok(normalized)
}
