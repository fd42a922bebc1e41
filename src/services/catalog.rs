//! Catalog management service

use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use super::{
    coordinator::{CacheKey, RequestCoordinator},
    shelves::ShelvesService,
};
use crate::{
    error::{AppError, AppResult},
    models::{
        book::{parse_isbn, CreateBook},
        Book, ShelfPlacement,
    },
    repository::Repository,
};

#[derive(Clone)]
pub struct CatalogService {
    repository: Repository,
    coordinator: RequestCoordinator,
    shelves: ShelvesService,
}

impl CatalogService {
    pub fn new(repository: Repository, coordinator: RequestCoordinator, shelves: ShelvesService) -> Self {
        Self {
            repository,
            coordinator,
            shelves,
        }
    }

    pub async fn get_book(&self, caller: Option<&str>, id: Uuid) -> AppResult<Book> {
        let store = Arc::clone(&self.repository.store);
        self.coordinator
            .read(CacheKey::new(caller, "books.get", &id), move || {
                let store = Arc::clone(&store);
                async move { store.get_book(id).await }
            })
            .await
    }

    pub async fn list_books(&self, caller: Option<&str>) -> AppResult<Vec<Book>> {
        let store = Arc::clone(&self.repository.store);
        self.coordinator
            .read(CacheKey::new(caller, "books.list", &()), move || {
                let store = Arc::clone(&store);
                async move { store.list_books().await }
            })
            .await
    }

    /// Add a book to the catalog, taking a slot on its shelf.
    ///
    /// The shelf slot is released again if the book cannot be stored.
    pub async fn add_book(&self, request: CreateBook) -> AppResult<Book> {
        request.validate()?;
        let isbn = parse_isbn(&request.isbn)?;

        let store = &self.repository.store;
        let existing = self
            .coordinator
            .fetch("books.by_isbn", || store.find_book_by_isbn(&isbn))
            .await?;
        if let Some(existing) = existing {
            return Err(AppError::Conflict(format!(
                "A book with ISBN {} already exists (id={})",
                isbn, existing.id
            )));
        }

        let book = Book {
            id: Uuid::new_v4(),
            isbn,
            title: request.title.trim().to_string(),
            author: request.author.trim().to_string(),
            genre: request.genre.map(|g| g.trim().to_string()).filter(|g| !g.is_empty()),
            placement: request.placement,
            is_available: true,
            issued_to: None,
            issued_date: None,
            return_date: None,
        };

        self.ensure_rack(&book.placement).await?;
        let shelf_id = book.placement.shelf_id;
        self.shelves.place_book(shelf_id, book.id).await?;

        let inserted = self
            .coordinator
            .mutate("books.create", || store.insert_book(book.clone()))
            .await;

        match inserted {
            Ok(book) => {
                tracing::info!("Added book {} ({}) to shelf {}", book.id, book.isbn, shelf_id);
                Ok(book)
            }
            Err(e) => {
                self.release_slot(shelf_id, book.id).await;
                Err(e)
            }
        }
    }

    /// Move a book to another shelf, keeping both shelves' occupancy consistent
    pub async fn move_book(&self, id: Uuid, placement: ShelfPlacement) -> AppResult<Book> {
        let store = &self.repository.store;
        let book = self
            .coordinator
            .fetch("books.get", || store.get_book(id))
            .await?;
        let from = book.placement.shelf_id;
        self.ensure_rack(&placement).await?;

        if from == placement.shelf_id {
            return self
                .coordinator
                .mutate("books.place", || store.update_book_placement(id, placement))
                .await;
        }

        self.shelves.place_book(placement.shelf_id, id).await?;

        let moved = match self
            .coordinator
            .mutate("books.place", || store.update_book_placement(id, placement))
            .await
        {
            Ok(moved) => moved,
            Err(e) => {
                self.release_slot(placement.shelf_id, id).await;
                return Err(e);
            }
        };

        if let Err(e) = self.shelves.remove_book(from, id).await {
            // The old shelf still counts the book, so put it back there
            self.restore_placement(id, book.placement).await;
            self.release_slot(placement.shelf_id, id).await;
            return Err(e);
        }

        tracing::info!("Moved book {} from shelf {} to {}", id, from, placement.shelf_id);
        Ok(moved)
    }

    /// Remove a book that is not on loan, freeing its shelf slot.
    ///
    /// The slot is released first and taken back if the book cannot be deleted.
    pub async fn delete_book(&self, id: Uuid) -> AppResult<()> {
        let store = &self.repository.store;
        let book = self
            .coordinator
            .fetch("books.get", || store.get_book(id))
            .await?;
        if !book.is_available {
            return Err(AppError::BookNotAvailable { book_id: id });
        }

        let shelf_id = book.placement.shelf_id;
        self.shelves.remove_book(shelf_id, id).await?;

        if let Err(e) = self
            .coordinator
            .mutate("books.delete", || store.delete_book(id))
            .await
        {
            if let Err(err) = self.shelves.place_book(shelf_id, id).await {
                tracing::error!(
                    "Failed to restore slot on shelf {} for book {}: {}",
                    shelf_id,
                    id,
                    err
                );
            }
            return Err(e);
        }

        tracing::info!("Deleted book {} ({})", id, book.isbn);
        Ok(())
    }

    /// The placement's shelf must exist and sit on the placement's rack
    async fn ensure_rack(&self, placement: &ShelfPlacement) -> AppResult<()> {
        let store = &self.repository.store;
        let shelf = self
            .coordinator
            .fetch("shelves.get", || store.get_shelf(placement.shelf_id))
            .await?;
        if shelf.rack_id != placement.rack_id {
            return Err(AppError::validation(
                "placement.rack_id",
                format!("Shelf {} is on rack {}, not {}", shelf.id, shelf.rack_id, placement.rack_id),
            ));
        }
        Ok(())
    }

    async fn restore_placement(&self, id: Uuid, placement: ShelfPlacement) {
        let store = &self.repository.store;
        if let Err(e) = self
            .coordinator
            .mutate("books.place", || store.update_book_placement(id, placement))
            .await
        {
            tracing::error!(
                "Failed to restore book {} to shelf {}: {}",
                id,
                placement.shelf_id,
                e
            );
        }
    }

    async fn release_slot(&self, shelf_id: Uuid, book_id: Uuid) {
        if let Err(e) = self.shelves.remove_book(shelf_id, book_id).await {
            tracing::error!(
                "Failed to release slot on shelf {} for book {}: {}",
                shelf_id,
                book_id,
                e
            );
        }
    }
}
