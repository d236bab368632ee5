//! Authentication service: registration, login, profile
//!
//! Thin boundary around the circulation core. Only identity and ownership
//! matter to the rest of the system; tokens carry the user id and role.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use uuid::Uuid;

use crate::{
    config::AuthConfig,
    error::{AppError, AppResult},
    models::user::{
        AuthResponse, LoginRequest, RegisterRequest, UpdateProfile, User, UserClaims, UserPublic,
        UserRole,
    },
    repository::Repository,
};

#[derive(Clone)]
pub struct AuthService {
    repository: Repository,
    config: AuthConfig,
}

impl AuthService {
    pub fn new(repository: Repository, config: AuthConfig) -> Self {
        Self { repository, config }
    }

    /// Register a new member account
    pub async fn register(&self, request: &RegisterRequest) -> AppResult<AuthResponse> {
        let hash = hash_password(&request.password)?;
        let user = self
            .repository
            .users
            .create(&request.name, &request.email, &hash, UserRole::User)
            .await?;

        tracing::info!(user_id = %user.id, "user registered");
        self.issue_token(user)
    }

    /// Authenticate with email and password
    pub async fn login(&self, request: &LoginRequest) -> AppResult<AuthResponse> {
        let user = self
            .repository
            .users
            .get_by_email(&request.email)
            .await?
            .ok_or_else(|| AppError::Authentication("Invalid email or password".to_string()))?;

        verify_password(&request.password, &user.password_hash)
            .map_err(|_| AppError::Authentication("Invalid email or password".to_string()))?;

        self.issue_token(user)
    }

    /// Resolve the authenticated user's profile
    pub async fn me(&self, user_id: Uuid) -> AppResult<UserPublic> {
        let user = self.repository.users.get_by_id(user_id).await?;
        Ok(user.into())
    }

    /// Update name and/or email of the authenticated user
    pub async fn update_profile(
        &self,
        user_id: Uuid,
        update: &UpdateProfile,
    ) -> AppResult<UserPublic> {
        if let Some(ref email) = update.email {
            if self.repository.users.email_taken(email, user_id).await? {
                return Err(AppError::Conflict(
                    "Email already in use by another account".to_string(),
                ));
            }
        }

        let user = self
            .repository
            .users
            .update_profile(user_id, update.name.as_deref(), update.email.as_deref())
            .await?;
        Ok(user.into())
    }

    fn issue_token(&self, user: User) -> AppResult<AuthResponse> {
        let claims = UserClaims::new(&user, self.config.jwt_expiration_hours);
        let token = claims
            .to_token(&self.config.jwt_secret)
            .map_err(|e| AppError::Internal(format!("Failed to sign token: {}", e)))?;

        Ok(AuthResponse {
            token,
            token_type: "Bearer".to_string(),
            user: user.into(),
        })
    }
}

fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))
}

fn verify_password(password: &str, hash: &str) -> Result<(), argon2::password_hash::Error> {
    let parsed = PasswordHash::new(hash)?;
    Argon2::default().verify_password(password.as_bytes(), &parsed)
}
