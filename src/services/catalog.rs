//! Catalog management service

use uuid::Uuid;

use crate::{
    error::AppResult,
    models::{
        book::{Book, BookQuery, CreateBook, UpdateBook},
        Pagination,
    },
    repository::Repository,
};

#[derive(Clone)]
pub struct CatalogService {
    repository: Repository,
}

impl CatalogService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// List or search books with pagination
    pub async fn search(&self, query: &BookQuery) -> AppResult<(Vec<Book>, Pagination)> {
        let (books, total) = self.repository.books.search(query).await?;
        Ok((books, Pagination::new(query.page, query.limit, total)))
    }

    /// Get an active book
    pub async fn get(&self, id: Uuid) -> AppResult<Book> {
        self.repository.books.get_active(id).await
    }

    /// Get a book including inactive ones (admin)
    pub async fn get_any(&self, id: Uuid) -> AppResult<Book> {
        self.repository.books.get_any(id).await
    }

    /// Create a new catalog entry (admin)
    pub async fn create(&self, book: &CreateBook) -> AppResult<Book> {
        let created = self.repository.books.create(book).await?;
        tracing::info!(book_id = %created.id, title = %created.title, "book created");
        Ok(created)
    }

    /// Update a catalog entry (admin)
    pub async fn update(&self, id: Uuid, update: &UpdateBook) -> AppResult<Book> {
        self.repository.books.update(id, update).await
    }

    /// Soft-delete a catalog entry (admin). The book disappears from
    /// borrow/search but stays referenced by historical loans.
    pub async fn deactivate(&self, id: Uuid) -> AppResult<()> {
        self.repository.books.deactivate(id).await?;
        tracing::info!(book_id = %id, "book deactivated");
        Ok(())
    }
}
