//! Statistics service
//!
//! Pure read-side aggregations over the loan ledger. Every query classifies
//! records by the logical predicates on `returned_at` / `due_at` so a row
//! whose persisted status lags reality is still counted exactly once.

use rust_decimal::Decimal;
use sqlx::{FromRow, Row};
use uuid::Uuid;

use crate::{
    api::stats::{DashboardStats, GenreCount, PopularBook, UserStatsResponse},
    error::AppResult,
    models::{
        book::BookSummary,
        borrow::{BorrowDetails, BorrowRecord},
        user::UserSummary,
    },
    repository::Repository,
};

/// Accrued-plus-finalized fines: returned records contribute their stamped
/// fine, unreturned overdue records contribute the live per-day estimate.
const FINES_SUM: &str = r#"
    COALESCE(SUM(CASE
        WHEN returned_at IS NOT NULL THEN fine_amount
        WHEN due_at < NOW() THEN
            CEIL(EXTRACT(EPOCH FROM (NOW() - due_at)) / 86400.0)::numeric * $2
        ELSE 0
    END), 0)
"#;

#[derive(Clone)]
pub struct StatsService {
    repository: Repository,
    fine_per_day: Decimal,
}

impl StatsService {
    pub fn new(repository: Repository, fine_per_day: Decimal) -> Self {
        Self {
            repository,
            fine_per_day,
        }
    }

    /// Borrowing statistics for one user
    pub async fn user_stats(&self, user_id: Uuid) -> AppResult<UserStatsResponse> {
        self.repository.users.get_by_id(user_id).await?;
        let pool = &self.repository.pool;

        let total_borrows: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM borrow_records WHERE user_id = $1")
                .bind(user_id)
                .fetch_one(pool)
                .await?;

        let active_borrows: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM borrow_records
             WHERE user_id = $1 AND returned_at IS NULL AND due_at >= NOW()",
        )
        .bind(user_id)
        .fetch_one(pool)
        .await?;

        let overdue_borrows: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM borrow_records
             WHERE user_id = $1 AND returned_at IS NULL AND due_at < NOW()",
        )
        .bind(user_id)
        .fetch_one(pool)
        .await?;

        let returned_books: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM borrow_records WHERE user_id = $1 AND returned_at IS NOT NULL",
        )
        .bind(user_id)
        .fetch_one(pool)
        .await?;

        let total_fines: Decimal = sqlx::query_scalar(&format!(
            "SELECT {} FROM borrow_records WHERE user_id = $1",
            FINES_SUM
        ))
        .bind(user_id)
        .bind(self.fine_per_day)
        .fetch_one(pool)
        .await?;

        let favorite_genres = sqlx::query(
            r#"
            SELECT b.genre, COUNT(*) AS borrow_count
            FROM borrow_records br
            JOIN books b ON br.book_id = b.id
            WHERE br.user_id = $1 AND b.genre IS NOT NULL
            GROUP BY b.genre
            ORDER BY borrow_count DESC
            LIMIT 5
            "#,
        )
        .bind(user_id)
        .fetch_all(pool)
        .await?
        .into_iter()
        .map(|row| GenreCount {
            genre: row.get("genre"),
            count: row.get("borrow_count"),
        })
        .collect();

        Ok(UserStatsResponse {
            total_borrows,
            active_borrows,
            overdue_borrows,
            returned_books,
            total_fines,
            favorite_genres,
        })
    }

    /// Library-wide dashboard statistics (admin)
    pub async fn dashboard(&self) -> AppResult<DashboardStats> {
        let pool = &self.repository.pool;

        let total_books = self.repository.books.count_active().await?;
        let total_users = self.repository.users.count_members().await?;

        let active_borrowings: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM borrow_records WHERE returned_at IS NULL AND due_at >= NOW()",
        )
        .fetch_one(pool)
        .await?;

        let overdue_borrowings: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM borrow_records WHERE returned_at IS NULL AND due_at < NOW()",
        )
        .fetch_one(pool)
        .await?;

        let total_fines: Decimal = sqlx::query_scalar(&format!(
            "SELECT {} FROM borrow_records WHERE $1::uuid IS NULL OR user_id = $1",
            FINES_SUM
        ))
        .bind(None::<Uuid>)
        .bind(self.fine_per_day)
        .fetch_one(pool)
        .await?;

        let recent_borrows = self.recent_borrows(10).await?;
        let popular_books = self.popular_books(5).await?;

        Ok(DashboardStats {
            total_books,
            total_users,
            active_borrowings,
            overdue_borrowings,
            total_fines,
            recent_borrows,
            popular_books,
        })
    }

    /// Most recent active loans with user and book details
    async fn recent_borrows(&self, limit: i64) -> AppResult<Vec<BorrowDetails>> {
        let rows = sqlx::query(
            r#"
            SELECT br.*, b.title AS book_title, b.author AS book_author,
                   b.isbn AS book_isbn, b.genre AS book_genre,
                   u.name AS user_name, u.email AS user_email
            FROM borrow_records br
            JOIN books b ON br.book_id = b.id
            JOIN users u ON br.user_id = u.id
            WHERE br.returned_at IS NULL
            ORDER BY br.borrowed_at DESC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.repository.pool)
        .await?;

        let now = chrono::Utc::now();
        rows.into_iter()
            .map(|row| {
                let record = BorrowRecord::from_row(&row)?;
                let book = BookSummary {
                    id: record.book_id,
                    title: row.try_get("book_title")?,
                    author: row.try_get("book_author")?,
                    isbn: row.try_get("book_isbn")?,
                    genre: row.try_get("book_genre")?,
                };
                let user = UserSummary {
                    id: record.user_id,
                    name: row.try_get("user_name")?,
                    email: row.try_get("user_email")?,
                };
                Ok(BorrowDetails::from_record(record, book, Some(user), now))
            })
            .collect()
    }

    /// Top-N books by all-time borrow count
    async fn popular_books(&self, limit: i64) -> AppResult<Vec<PopularBook>> {
        let rows = sqlx::query(
            r#"
            SELECT b.id, b.title, b.author, b.isbn, b.genre, COUNT(*) AS borrow_count
            FROM borrow_records br
            JOIN books b ON br.book_id = b.id
            GROUP BY b.id, b.title, b.author, b.isbn, b.genre
            ORDER BY borrow_count DESC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.repository.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                Ok(PopularBook {
                    book: BookSummary {
                        id: row.try_get("id")?,
                        title: row.try_get("title")?,
                        author: row.try_get("author")?,
                        isbn: row.try_get("isbn")?,
                        genre: row.try_get("genre")?,
                    },
                    borrow_count: row.try_get("borrow_count")?,
                })
            })
            .collect()
    }
}
