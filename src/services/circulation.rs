//! Circulation service: atomic borrow / return / renew workflows
//!
//! Each operation runs as one database transaction. The active book row is
//! locked with `SELECT ... FOR UPDATE` before any check-then-act step, so two
//! concurrent borrows of the last copy serialize on the row lock and exactly
//! one succeeds. When Postgres reports a serialization failure or deadlock
//! the whole transaction is retried a bounded number of times before the
//! caller sees `ConcurrencyConflict`.

use std::future::Future;

use chrono::{Duration, Utc};
use uuid::Uuid;

use crate::{
    config::CirculationConfig,
    error::{AppError, AppResult},
    models::{
        book::Book,
        borrow::{self, BorrowDetails, LoanStatus},
        user::UserSummary,
    },
    repository::Repository,
};

#[derive(Clone)]
pub struct CirculationService {
    repository: Repository,
    policy: CirculationConfig,
}

impl CirculationService {
    pub fn new(repository: Repository, policy: CirculationConfig) -> Self {
        Self { repository, policy }
    }

    /// Borrow a book for a user
    pub async fn borrow(&self, book_id: Uuid, user_id: Uuid) -> AppResult<BorrowDetails> {
        self.with_retries("borrow", || self.try_borrow(book_id, user_id))
            .await
    }

    /// Return a borrowed book
    pub async fn return_book(&self, book_id: Uuid, user_id: Uuid) -> AppResult<BorrowDetails> {
        self.with_retries("return", || self.try_return(book_id, user_id))
            .await
    }

    /// Renew a loan. Copy counts are unaffected, so no catalog mutation.
    pub async fn renew(&self, borrow_id: Uuid, user_id: Uuid) -> AppResult<BorrowDetails> {
        self.with_retries("renew", || self.try_renew(borrow_id, user_id))
            .await
    }

    /// A user's active loans, with the persisted overdue status refreshed
    /// opportunistically on the way through
    pub async fn active_loans(&self, user_id: Uuid) -> AppResult<Vec<BorrowDetails>> {
        self.repository.users.get_by_id(user_id).await?;
        self.repository
            .borrows
            .refresh_overdue(Some(user_id), self.policy.fine_per_day)
            .await?;
        self.repository.borrows.active_for_user(user_id).await
    }

    /// A user's borrow history, optionally filtered by logical status
    pub async fn borrow_history(
        &self,
        user_id: Uuid,
        status: Option<LoanStatus>,
        page: i64,
        limit: i64,
    ) -> AppResult<(Vec<BorrowDetails>, i64)> {
        self.repository
            .borrows
            .refresh_overdue(Some(user_id), self.policy.fine_per_day)
            .await?;
        self.repository
            .borrows
            .history_for_user(user_id, status, page, limit)
            .await
    }

    /// Reserve a book. Holds queueing is not implemented; this validates the
    /// book and acknowledges the request, matching the historical contract.
    pub async fn reserve(&self, book_id: Uuid, _user_id: Uuid) -> AppResult<Book> {
        self.repository.books.get_active(book_id).await
    }

    async fn try_borrow(&self, book_id: Uuid, user_id: Uuid) -> AppResult<BorrowDetails> {
        let mut tx = self.repository.pool.begin().await?;

        // The user row lock serializes borrows by the same user across
        // different books; the count below stays valid until commit.
        // Lock order is user then book, for every writer.
        let user = self.repository.users.lock_active(&mut tx, user_id).await?;
        let book = self.repository.books.lock_active(&mut tx, book_id).await?;
        if !book.is_available() {
            return Err(AppError::NoCopiesAvailable);
        }

        if self
            .repository
            .borrows
            .find_active_for(&mut tx, user_id, book_id)
            .await?
            .is_some()
        {
            return Err(AppError::AlreadyBorrowed);
        }

        let active = self
            .repository
            .borrows
            .count_active_for(&mut tx, user_id)
            .await?;
        if active >= self.policy.max_active_loans {
            return Err(AppError::BorrowLimitExceeded(self.policy.max_active_loans));
        }

        let now = Utc::now();
        let due_at = now + Duration::days(self.policy.loan_period_days);
        let record = self
            .repository
            .borrows
            .create(&mut tx, user_id, book_id, now, due_at)
            .await?;
        self.repository
            .books
            .decrement_available(&mut tx, book_id)
            .await?;

        tx.commit().await?;

        tracing::info!(%user_id, %book_id, borrow_id = %record.id, %due_at, "book borrowed");

        Ok(BorrowDetails::from_record(
            record,
            book.summary(),
            Some(UserSummary {
                id: user.id,
                name: user.name,
                email: user.email,
            }),
            now,
        ))
    }

    async fn try_return(&self, book_id: Uuid, user_id: Uuid) -> AppResult<BorrowDetails> {
        let mut tx = self.repository.pool.begin().await?;

        // lock_any: a book deactivated while on loan can still be returned
        let book = self.repository.books.lock_any(&mut tx, book_id).await?;

        let record = self
            .repository
            .borrows
            .find_active_for(&mut tx, user_id, book_id)
            .await?
            .ok_or(AppError::NoActiveLoan)?;

        let now = Utc::now();
        let fine = borrow::fine_for(record.due_at, now, self.policy.fine_per_day);
        let record = self
            .repository
            .borrows
            .mark_returned(&mut tx, record.id, now, fine)
            .await?;
        self.repository
            .books
            .increment_available(&mut tx, book_id)
            .await?;

        tx.commit().await?;

        tracing::info!(
            %user_id, %book_id, borrow_id = %record.id, fine = %record.fine_amount,
            "book returned"
        );

        Ok(BorrowDetails::from_record(record, book.summary(), None, now))
    }

    async fn try_renew(&self, borrow_id: Uuid, user_id: Uuid) -> AppResult<BorrowDetails> {
        let mut tx = self.repository.pool.begin().await?;

        let record = self
            .repository
            .borrows
            .get_for_update(&mut tx, borrow_id)
            .await?;
        if record.user_id != user_id {
            return Err(AppError::NotOwner);
        }

        let now = Utc::now();
        record.ensure_renewable(now, self.policy.max_renewals)?;

        let record = self
            .repository
            .borrows
            .apply_renewal(
                &mut tx,
                record.id,
                record.due_at + Duration::days(self.policy.loan_period_days),
                record.renewed_count + 1,
            )
            .await?;

        tx.commit().await?;

        tracing::info!(
            %user_id, borrow_id = %record.id, due_at = %record.due_at,
            renewed_count = record.renewed_count, "loan renewed"
        );

        let book = self.repository.books.get_any(record.book_id).await?;
        Ok(BorrowDetails::from_record(record, book.summary(), None, now))
    }

    /// Re-run a transactional closure after serialization/deadlock failures,
    /// at most `max_txn_retries` extra attempts
    async fn with_retries<T, F, Fut>(&self, op: &'static str, mut f: F) -> AppResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = AppResult<T>>,
    {
        let mut attempts = 0;
        loop {
            match f().await {
                Err(e) if is_retryable(&e) => {
                    if attempts >= self.policy.max_txn_retries {
                        tracing::warn!(op, attempts, "transaction kept conflicting, giving up");
                        return Err(AppError::ConcurrencyConflict);
                    }
                    attempts += 1;
                    tracing::debug!(op, attempt = attempts, "transaction conflict, retrying");
                }
                other => return other,
            }
        }
    }
}

/// Postgres serialization_failure (40001) and deadlock_detected (40P01)
fn is_retryable(err: &AppError) -> bool {
    match err {
        AppError::Database(sqlx::Error::Database(db)) => {
            matches!(db.code().as_deref(), Some("40001") | Some("40P01"))
        }
        _ => false,
    }
}
