//! Borrow records repository: the loan ledger
//!
//! Mutations that belong to a circulation workflow (create, return, renew)
//! take an open transaction so they commit together with the matching
//! copy-count change. Read paths use the logical status predicates on
//! `returned_at` / `due_at`, never the persisted status column alone.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, Pool, Postgres, Row, Transaction};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{
        book::BookSummary,
        borrow::{BorrowDetails, BorrowRecord, LoanStatus},
    },
};

#[derive(Clone)]
pub struct BorrowsRepository {
    pool: Pool<Postgres>,
}

impl BorrowsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Create a borrow record within the borrow transaction
    pub async fn create(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        user_id: Uuid,
        book_id: Uuid,
        borrowed_at: DateTime<Utc>,
        due_at: DateTime<Utc>,
    ) -> AppResult<BorrowRecord> {
        let record = sqlx::query_as::<_, BorrowRecord>(
            r#"
            INSERT INTO borrow_records (user_id, book_id, borrowed_at, due_at, status)
            VALUES ($1, $2, $3, $4, 'borrowed')
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(book_id)
        .bind(borrowed_at)
        .bind(due_at)
        .fetch_one(&mut **tx)
        .await?;

        Ok(record)
    }

    /// Get a borrow record by ID
    pub async fn get_by_id(&self, id: Uuid) -> AppResult<BorrowRecord> {
        sqlx::query_as::<_, BorrowRecord>("SELECT * FROM borrow_records WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::LoanNotFound(id))
    }

    /// Lock a borrow record row for the duration of the transaction
    pub async fn get_for_update(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
    ) -> AppResult<BorrowRecord> {
        sqlx::query_as::<_, BorrowRecord>(
            "SELECT * FROM borrow_records WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or_else(|| AppError::LoanNotFound(id))
    }

    /// Find the active (unreturned) record for a (user, book) pair, locking
    /// it when found
    pub async fn find_active_for(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        user_id: Uuid,
        book_id: Uuid,
    ) -> AppResult<Option<BorrowRecord>> {
        let record = sqlx::query_as::<_, BorrowRecord>(
            r#"
            SELECT * FROM borrow_records
            WHERE user_id = $1 AND book_id = $2 AND returned_at IS NULL
            FOR UPDATE
            "#,
        )
        .bind(user_id)
        .bind(book_id)
        .fetch_optional(&mut **tx)
        .await?;

        Ok(record)
    }

    /// Count a user's active loans (logical definition: not yet returned)
    pub async fn count_active_for(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        user_id: Uuid,
    ) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM borrow_records WHERE user_id = $1 AND returned_at IS NULL",
        )
        .bind(user_id)
        .fetch_one(&mut **tx)
        .await?;
        Ok(count)
    }

    /// Finalize a return. The fine is computed fresh by the caller from
    /// due_at/returned_at and overwrites any earlier lazy estimate.
    pub async fn mark_returned(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
        returned_at: DateTime<Utc>,
        fine_amount: Decimal,
    ) -> AppResult<BorrowRecord> {
        let record = sqlx::query_as::<_, BorrowRecord>(
            r#"
            UPDATE borrow_records
            SET returned_at = $2, status = 'returned', fine_amount = $3, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(returned_at)
        .bind(fine_amount)
        .fetch_one(&mut **tx)
        .await?;

        Ok(record)
    }

    /// Apply a renewal: new due date, bumped count, status back to renewed
    pub async fn apply_renewal(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
        due_at: DateTime<Utc>,
        renewed_count: i16,
    ) -> AppResult<BorrowRecord> {
        let record = sqlx::query_as::<_, BorrowRecord>(
            r#"
            UPDATE borrow_records
            SET due_at = $2, renewed_count = $3, status = 'renewed', updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(due_at)
        .bind(renewed_count)
        .fetch_one(&mut **tx)
        .await?;

        Ok(record)
    }

    /// Opportunistically persist the overdue status (and a fine estimate)
    /// for records whose due date has passed. Rows already stamped overdue
    /// are included so the estimate keeps advancing as days accrue. Callers
    /// never rely on this having run; it only keeps the stored columns close
    /// to reality.
    pub async fn refresh_overdue(
        &self,
        user_id: Option<Uuid>,
        fine_per_day: Decimal,
    ) -> AppResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE borrow_records
            SET status = 'overdue',
                fine_amount = CEIL(EXTRACT(EPOCH FROM (NOW() - due_at)) / 86400.0)::numeric * $2,
                updated_at = NOW()
            WHERE ($1::uuid IS NULL OR user_id = $1)
              AND returned_at IS NULL
              AND due_at < NOW()
            "#,
        )
        .bind(user_id)
        .bind(fine_per_day)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// A user's active loans with book details
    pub async fn active_for_user(&self, user_id: Uuid) -> AppResult<Vec<BorrowDetails>> {
        let rows = sqlx::query(
            r#"
            SELECT br.*, b.title AS book_title, b.author AS book_author,
                   b.isbn AS book_isbn, b.genre AS book_genre
            FROM borrow_records br
            JOIN books b ON br.book_id = b.id
            WHERE br.user_id = $1 AND br.returned_at IS NULL
            ORDER BY br.due_at
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        let now = Utc::now();
        rows.into_iter()
            .map(|row| {
                let record = BorrowRecord::from_row(&row)?;
                let book = book_summary(&row, record.book_id)?;
                Ok(BorrowDetails::from_record(record, book, None, now))
            })
            .collect()
    }

    /// A user's full borrow history, newest first, optionally filtered by
    /// logical status
    pub async fn history_for_user(
        &self,
        user_id: Uuid,
        status: Option<LoanStatus>,
        page: i64,
        limit: i64,
    ) -> AppResult<(Vec<BorrowDetails>, i64)> {
        let status_filter = status.map(|s| s.as_str());

        let rows = sqlx::query(
            r#"
            SELECT br.*, b.title AS book_title, b.author AS book_author,
                   b.isbn AS book_isbn, b.genre AS book_genre
            FROM borrow_records br
            JOIN books b ON br.book_id = b.id
            WHERE br.user_id = $1
              AND ($2::text IS NULL OR
                   (CASE WHEN br.returned_at IS NOT NULL THEN 'returned'
                         WHEN br.due_at < NOW() THEN 'overdue'
                         WHEN br.renewed_count > 0 THEN 'renewed'
                         ELSE 'borrowed' END) = $2)
            ORDER BY br.borrowed_at DESC
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(user_id)
        .bind(status_filter)
        .bind(limit)
        .bind((page - 1) * limit)
        .fetch_all(&self.pool)
        .await?;

        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM borrow_records br
            WHERE br.user_id = $1
              AND ($2::text IS NULL OR
                   (CASE WHEN br.returned_at IS NOT NULL THEN 'returned'
                         WHEN br.due_at < NOW() THEN 'overdue'
                         WHEN br.renewed_count > 0 THEN 'renewed'
                         ELSE 'borrowed' END) = $2)
            "#,
        )
        .bind(user_id)
        .bind(status_filter)
        .fetch_one(&self.pool)
        .await?;

        let now = Utc::now();
        let details = rows
            .into_iter()
            .map(|row| {
                let record = BorrowRecord::from_row(&row)?;
                let book = book_summary(&row, record.book_id)?;
                Ok(BorrowDetails::from_record(record, book, None, now))
            })
            .collect::<AppResult<Vec<_>>>()?;

        Ok((details, total))
    }
}

fn book_summary(row: &sqlx::postgres::PgRow, book_id: Uuid) -> AppResult<BookSummary> {
    Ok(BookSummary {
        id: book_id,
        title: row.try_get("book_title")?,
        author: row.try_get("book_author")?,
        isbn: row.try_get("book_isbn")?,
        genre: row.try_get("book_genre")?,
    })
}
