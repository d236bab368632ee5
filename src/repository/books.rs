//! Books repository: the catalog store
//!
//! Copy-count changes go through `decrement_available` / `increment_available`
//! only. Both are guarded updates, so `0 <= available_copies <= total_copies`
//! holds no matter how the surrounding transaction interleaves.

use sqlx::{Pool, Postgres, Transaction};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::book::{Book, BookQuery, CreateBook, UpdateBook},
};

/// Sortable columns for catalog listings
const SORTABLE: &[&str] = &["title", "author", "published_year", "created_at"];

#[derive(Clone)]
pub struct BooksRepository {
    pool: Pool<Postgres>,
}

impl BooksRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Get an active book by ID
    pub async fn get_active(&self, id: Uuid) -> AppResult<Book> {
        sqlx::query_as::<_, Book>("SELECT * FROM books WHERE id = $1 AND is_active = TRUE")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::BookNotFound(id))
    }

    /// Get a book by ID regardless of active flag (admin views)
    pub async fn get_any(&self, id: Uuid) -> AppResult<Book> {
        sqlx::query_as::<_, Book>("SELECT * FROM books WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::BookNotFound(id))
    }

    /// Lock the active book row for the duration of the transaction. This is
    /// the serialization point for all circulation operations on a book.
    pub async fn lock_active(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
    ) -> AppResult<Book> {
        sqlx::query_as::<_, Book>(
            "SELECT * FROM books WHERE id = $1 AND is_active = TRUE FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or_else(|| AppError::BookNotFound(id))
    }

    /// Lock the book row regardless of the active flag. Returns still go
    /// through for books deactivated while copies were out.
    pub async fn lock_any(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
    ) -> AppResult<Book> {
        sqlx::query_as::<_, Book>("SELECT * FROM books WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut **tx)
            .await?
            .ok_or_else(|| AppError::BookNotFound(id))
    }

    /// Take one copy off the shelf. Fails with NoCopiesAvailable when none
    /// are left; the guard in the WHERE clause keeps the count non-negative.
    pub async fn decrement_available(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
    ) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE books
            SET available_copies = available_copies - 1, updated_at = NOW()
            WHERE id = $1 AND available_copies > 0
            "#,
        )
        .bind(id)
        .execute(&mut **tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NoCopiesAvailable);
        }
        Ok(())
    }

    /// Put one copy back on the shelf. Refuses to exceed total_copies.
    pub async fn increment_available(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
    ) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE books
            SET available_copies = available_copies + 1, updated_at = NOW()
            WHERE id = $1 AND available_copies < total_copies
            "#,
        )
        .bind(id)
        .execute(&mut **tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::Conflict(
                "All copies of this book are already on the shelf".to_string(),
            ));
        }
        Ok(())
    }

    /// List/search books with pagination and optional filters
    pub async fn search(&self, query: &BookQuery) -> AppResult<(Vec<Book>, i64)> {
        let where_clause = r#"
            ($1::bool OR is_active = TRUE)
            AND ($2::text IS NULL
                 OR title ILIKE '%' || $2 || '%'
                 OR author ILIKE '%' || $2 || '%'
                 OR description ILIKE '%' || $2 || '%'
                 OR EXISTS (SELECT 1 FROM unnest(tags) tag WHERE tag ILIKE '%' || $2 || '%'))
            AND ($3::text IS NULL OR genre ILIKE '%' || $3 || '%')
            AND ($4::int4 IS NULL OR published_year = $4)
        "#;

        let sort_by = if SORTABLE.contains(&query.sort_by.as_str()) {
            query.sort_by.as_str()
        } else {
            "title"
        };
        let direction = if query.sort_desc { "DESC" } else { "ASC" };

        let books = sqlx::query_as::<_, Book>(&format!(
            "SELECT * FROM books WHERE {} ORDER BY {} {} LIMIT $5 OFFSET $6",
            where_clause, sort_by, direction
        ))
        .bind(query.include_inactive)
        .bind(&query.search)
        .bind(&query.genre)
        .bind(query.published_year)
        .bind(query.limit)
        .bind((query.page - 1) * query.limit)
        .fetch_all(&self.pool)
        .await?;

        let total: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM books WHERE {}",
            where_clause
        ))
        .bind(query.include_inactive)
        .bind(&query.search)
        .bind(&query.genre)
        .bind(query.published_year)
        .fetch_one(&self.pool)
        .await?;

        Ok((books, total))
    }

    /// Create a new book
    pub async fn create(&self, book: &CreateBook) -> AppResult<Book> {
        let available = book
            .available_copies
            .unwrap_or(book.total_copies)
            .clamp(0, book.total_copies);

        let created = sqlx::query_as::<_, Book>(
            r#"
            INSERT INTO books (title, author, isbn, genre, published_year, description,
                               total_copies, available_copies, shelf, section, tags)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING *
            "#,
        )
        .bind(&book.title)
        .bind(&book.author)
        .bind(&book.isbn)
        .bind(&book.genre)
        .bind(book.published_year)
        .bind(&book.description)
        .bind(book.total_copies)
        .bind(available)
        .bind(&book.shelf)
        .bind(&book.section)
        .bind(&book.tags)
        .fetch_one(&self.pool)
        .await
        .map_err(map_unique_isbn)?;

        Ok(created)
    }

    /// Update a book. Only provided fields change; available_copies is
    /// clamped so it never exceeds the (possibly reduced) total.
    pub async fn update(&self, id: Uuid, update: &UpdateBook) -> AppResult<Book> {
        sqlx::query_as::<_, Book>(
            r#"
            UPDATE books SET
                title = COALESCE($2, title),
                author = COALESCE($3, author),
                isbn = COALESCE($4, isbn),
                genre = COALESCE($5, genre),
                published_year = COALESCE($6, published_year),
                description = COALESCE($7, description),
                total_copies = COALESCE($8, total_copies),
                available_copies = LEAST(available_copies, COALESCE($8, total_copies)),
                shelf = COALESCE($9, shelf),
                section = COALESCE($10, section),
                tags = COALESCE($11, tags),
                is_active = COALESCE($12, is_active),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&update.title)
        .bind(&update.author)
        .bind(&update.isbn)
        .bind(&update.genre)
        .bind(update.published_year)
        .bind(&update.description)
        .bind(update.total_copies)
        .bind(&update.shelf)
        .bind(&update.section)
        .bind(&update.tags)
        .bind(update.is_active)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_unique_isbn)?
        .ok_or_else(|| AppError::BookNotFound(id))
    }

    /// Soft-delete a book. Historical loan records keep referencing it.
    pub async fn deactivate(&self, id: Uuid) -> AppResult<()> {
        let result =
            sqlx::query("UPDATE books SET is_active = FALSE, updated_at = NOW() WHERE id = $1")
                .bind(id)
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::BookNotFound(id));
        }
        Ok(())
    }

    /// Count active catalog entries
    pub async fn count_active(&self) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM books WHERE is_active = TRUE")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

fn map_unique_isbn(e: sqlx::Error) -> AppError {
    if let sqlx::Error::Database(ref db) = e {
        if db.code().as_deref() == Some("23505") {
            return AppError::Conflict("A book with this ISBN already exists".to_string());
        }
    }
    AppError::Database(e)
}
