//! Users repository for database operations

use sqlx::{Pool, Postgres, Transaction};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::user::{User, UserRole},
};

#[derive(Clone)]
pub struct UsersRepository {
    pool: Pool<Postgres>,
}

impl UsersRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Get an active user by ID
    pub async fn get_by_id(&self, id: Uuid) -> AppResult<User> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1 AND is_active = TRUE")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::UserNotFound(id))
    }

    /// Lock the active user row for the duration of the transaction. Borrows
    /// by the same user serialize here, so the active-loan count checked
    /// afterwards cannot be overtaken by a concurrent borrow of another book.
    pub async fn lock_active(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
    ) -> AppResult<User> {
        sqlx::query_as::<_, User>(
            "SELECT * FROM users WHERE id = $1 AND is_active = TRUE FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or_else(|| AppError::UserNotFound(id))
    }

    /// Get an active user by email (login)
    pub async fn get_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT * FROM users WHERE lower(email) = lower($1) AND is_active = TRUE",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    /// Create a new user account
    pub async fn create(
        &self,
        name: &str,
        email: &str,
        password_hash: &str,
        role: UserRole,
    ) -> AppResult<User> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (name, email, password_hash, role)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(name)
        .bind(email)
        .bind(password_hash)
        .bind(role)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db) = e {
                if db.code().as_deref() == Some("23505") {
                    return AppError::Conflict("Email already in use".to_string());
                }
            }
            AppError::Database(e)
        })?;

        Ok(user)
    }

    /// Check whether an email is taken by another account
    pub async fn email_taken(&self, email: &str, exclude: Uuid) -> AppResult<bool> {
        let taken: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM users WHERE lower(email) = lower($1) AND id != $2)",
        )
        .bind(email)
        .bind(exclude)
        .fetch_one(&self.pool)
        .await?;
        Ok(taken)
    }

    /// Update a user's profile fields
    pub async fn update_profile(
        &self,
        id: Uuid,
        name: Option<&str>,
        email: Option<&str>,
    ) -> AppResult<User> {
        sqlx::query_as::<_, User>(
            r#"
            UPDATE users SET
                name = COALESCE($2, name),
                email = COALESCE($3, email),
                updated_at = NOW()
            WHERE id = $1 AND is_active = TRUE
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(name)
        .bind(email)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::UserNotFound(id))
    }

    /// Count active member accounts (excludes admins)
    pub async fn count_members(&self) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM users WHERE is_active = TRUE AND role = 'user'",
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }
}
