//! Shelf model and capacity invariants

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};

/// Shelf with its capacity and current occupancy.
///
/// `0 <= current_books <= capacity` holds after every `try_*` call; a failed call leaves the
/// shelf untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Shelf {
    pub id: Uuid,
    pub name: String,
    pub rack_id: Uuid,
    pub capacity: u32,
    pub current_books: u32,
}

impl Shelf {
    /// Occupancy as a rounded percentage, 0 for a zero-capacity shelf
    pub fn utilization_percentage(&self) -> u32 {
        if self.capacity == 0 {
            return 0;
        }
        let current = u64::from(self.current_books) * 100;
        let capacity = u64::from(self.capacity);
        ((current + capacity / 2) / capacity) as u32
    }

    pub fn is_full(&self) -> bool {
        self.current_books >= self.capacity
    }

    pub fn try_place(&mut self) -> AppResult<()> {
        if self.is_full() {
            return Err(AppError::CapacityExceeded {
                shelf_id: self.id,
                capacity: self.capacity,
            });
        }
        self.current_books += 1;
        Ok(())
    }

    pub fn try_remove(&mut self) -> AppResult<()> {
        if self.current_books == 0 {
            return Err(AppError::InvariantViolation(format!(
                "shelf {} occupancy would become negative",
                self.id
            )));
        }
        self.current_books -= 1;
        Ok(())
    }

    /// Apply a signed occupancy change in one step
    pub fn try_adjust(&mut self, delta: i32) -> AppResult<()> {
        let next = i64::from(self.current_books) + i64::from(delta);
        if next < 0 {
            return Err(AppError::InvariantViolation(format!(
                "shelf {} occupancy would become negative",
                self.id
            )));
        }
        if next > i64::from(self.capacity) {
            return Err(AppError::CapacityExceeded {
                shelf_id: self.id,
                capacity: self.capacity,
            });
        }
        self.current_books = next as u32;
        Ok(())
    }

    pub fn try_resize(&mut self, capacity: u32) -> AppResult<()> {
        if capacity == 0 {
            return Err(AppError::validation("capacity", "Capacity must be a positive integer"));
        }
        if capacity < self.current_books {
            return Err(AppError::CapacityBelowOccupancy {
                shelf_id: self.id,
                requested: capacity,
                current_books: self.current_books,
            });
        }
        self.capacity = capacity;
        Ok(())
    }

    pub fn ensure_deletable(&self) -> AppResult<()> {
        if self.current_books > 0 {
            return Err(AppError::ShelfNotEmpty {
                shelf_id: self.id,
                current_books: self.current_books,
            });
        }
        Ok(())
    }
}

/// Create shelf request
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateShelf {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: String,
    pub rack_id: Uuid,
    #[validate(range(min = 1, max = 100000, message = "Capacity must be between 1 and 100000"))]
    pub capacity: u32,
}

/// Resize shelf request
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ResizeShelf {
    pub capacity: u32,
}

/// Per-shelf occupancy line used by reports
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct ShelfUtilization {
    pub shelf_id: Uuid,
    pub name: String,
    pub rack_id: Uuid,
    pub capacity: u32,
    pub current_books: u32,
    pub utilization_percentage: u32,
}

impl From<&Shelf> for ShelfUtilization {
    fn from(shelf: &Shelf) -> Self {
        Self {
            shelf_id: shelf.id,
            name: shelf.name.clone(),
            rack_id: shelf.rack_id,
            capacity: shelf.capacity,
            current_books: shelf.current_books,
            utilization_percentage: shelf.utilization_percentage(),
        }
    }
}
