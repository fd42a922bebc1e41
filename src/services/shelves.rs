//! Shelf capacity ledger

use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use super::coordinator::{CacheKey, RequestCoordinator};
use crate::{
    error::AppResult,
    models::shelf::{CreateShelf, Shelf, ShelfUtilization},
    repository::Repository,
};

#[derive(Clone)]
pub struct ShelvesService {
    repository: Repository,
    coordinator: RequestCoordinator,
}

impl ShelvesService {
    pub fn new(repository: Repository, coordinator: RequestCoordinator) -> Self {
        Self {
            repository,
            coordinator,
        }
    }

    /// Create an empty shelf
    pub async fn create_shelf(&self, request: CreateShelf) -> AppResult<Shelf> {
        request.validate()?;

        let shelf = Shelf {
            id: Uuid::new_v4(),
            name: request.name.trim().to_string(),
            rack_id: request.rack_id,
            capacity: request.capacity,
            current_books: 0,
        };

        let store = &self.repository.store;
        let created = self
            .coordinator
            .mutate("shelves.create", || store.insert_shelf(shelf.clone()))
            .await?;

        tracing::info!(
            "Created shelf {} ({}) with capacity {}",
            created.name,
            created.id,
            created.capacity
        );
        Ok(created)
    }

    pub async fn get_shelf(&self, caller: Option<&str>, id: Uuid) -> AppResult<Shelf> {
        let store = Arc::clone(&self.repository.store);
        self.coordinator
            .read(CacheKey::new(caller, "shelves.get", &id), move || {
                let store = Arc::clone(&store);
                async move { store.get_shelf(id).await }
            })
            .await
    }

    pub async fn list_shelves(&self, caller: Option<&str>) -> AppResult<Vec<Shelf>> {
        let store = Arc::clone(&self.repository.store);
        self.coordinator
            .read(CacheKey::new(caller, "shelves.list", &()), move || {
                let store = Arc::clone(&store);
                async move { store.list_shelves().await }
            })
            .await
    }

    /// Utilization of every shelf
    pub async fn utilization(&self, caller: Option<&str>) -> AppResult<Vec<ShelfUtilization>> {
        let shelves = self.list_shelves(caller).await?;
        Ok(shelves.iter().map(ShelfUtilization::from).collect())
    }

    async fn fresh_shelf(&self, id: Uuid) -> AppResult<Shelf> {
        let store = &self.repository.store;
        self.coordinator
            .fetch("shelves.get", || store.get_shelf(id))
            .await
    }

    /// Take one slot on a shelf for `book_id`
    pub async fn place_book(&self, shelf_id: Uuid, book_id: Uuid) -> AppResult<Shelf> {
        self.fresh_shelf(shelf_id).await?.try_place()?;

        let store = &self.repository.store;
        let shelf = self
            .coordinator
            .mutate("shelves.place", || store.adjust_shelf_occupancy(shelf_id, 1))
            .await?;

        tracing::debug!(
            "Placed book {} on shelf {} ({}/{})",
            book_id,
            shelf_id,
            shelf.current_books,
            shelf.capacity
        );
        Ok(shelf)
    }

    /// Release the slot `book_id` held on a shelf
    pub async fn remove_book(&self, shelf_id: Uuid, book_id: Uuid) -> AppResult<Shelf> {
        self.fresh_shelf(shelf_id).await?.try_remove()?;

        let store = &self.repository.store;
        let shelf = self
            .coordinator
            .mutate("shelves.remove", || store.adjust_shelf_occupancy(shelf_id, -1))
            .await?;

        tracing::debug!(
            "Removed book {} from shelf {} ({}/{})",
            book_id,
            shelf_id,
            shelf.current_books,
            shelf.capacity
        );
        Ok(shelf)
    }

    pub async fn resize_capacity(&self, shelf_id: Uuid, capacity: u32) -> AppResult<Shelf> {
        let mut shelf = self.fresh_shelf(shelf_id).await?;
        let previous = shelf.capacity;
        shelf.try_resize(capacity)?;

        let store = &self.repository.store;
        let shelf = self
            .coordinator
            .mutate("shelves.resize", || store.update_shelf_capacity(shelf_id, capacity))
            .await?;

        tracing::info!(
            "Resized shelf {} from {} to {}",
            shelf_id,
            previous,
            shelf.capacity
        );
        Ok(shelf)
    }

    pub async fn delete_shelf(&self, shelf_id: Uuid) -> AppResult<()> {
        self.fresh_shelf(shelf_id).await?.ensure_deletable()?;

        let store = &self.repository.store;
        self.coordinator
            .mutate("shelves.delete", || store.delete_shelf(shelf_id))
            .await?;

        tracing::info!("Deleted shelf {}", shelf_id);
        Ok(())
    }
}
