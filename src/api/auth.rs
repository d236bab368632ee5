//! Authentication endpoints

use axum::{extract::State, http::StatusCode, Json};
use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    models::user::{AuthResponse, LoginRequest, RegisterRequest, UpdateProfile, UserPublic},
    AppState,
};

use super::AuthenticatedUser;

/// Register a new member account
#[utoipa::path(
    post,
    path = "/auth/register",
    tag = "auth",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created", body = AuthResponse),
        (status = 400, description = "Invalid request"),
        (status = 409, description = "Email already in use")
    )
)]
pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> AppResult<(StatusCode, Json<AuthResponse>)> {
    request
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let response = state.services.auth.register(&request).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// Log in with email and password
#[utoipa::path(
    post,
    path = "/auth/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Authenticated", body = AuthResponse),
        (status = 401, description = "Invalid credentials")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> AppResult<Json<AuthResponse>> {
    request
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let response = state.services.auth.login(&request).await?;
    Ok(Json(response))
}

/// Get the authenticated user's profile
#[utoipa::path(
    get,
    path = "/auth/me",
    tag = "auth",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Current user", body = UserPublic),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn me(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<UserPublic>> {
    let user = state.services.auth.me(claims.sub).await?;
    Ok(Json(user))
}

/// Update the authenticated user's profile
#[utoipa::path(
    put,
    path = "/user/profile",
    tag = "auth",
    security(("bearer_auth" = [])),
    request_body = UpdateProfile,
    responses(
        (status = 200, description = "Profile updated", body = UserPublic),
        (status = 409, description = "Email already in use")
    )
)]
pub async fn update_profile(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(request): Json<UpdateProfile>,
) -> AppResult<Json<UserPublic>> {
    request
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let user = state
        .services
        .auth
        .update_profile(claims.sub, &request)
        .await?;
    Ok(Json(user))
}
