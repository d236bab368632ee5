//! Admin catalog management endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use utoipa::IntoParams;
use uuid::Uuid;
use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    models::book::{Book, BookQuery, CreateBook, UpdateBook},
    AppState,
};

use super::{books::BookListResponse, AuthenticatedUser};

/// Admin catalog listing parameters
#[derive(Debug, Deserialize, IntoParams)]
pub struct AdminListParams {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub include_inactive: Option<bool>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
}

/// List all books including inactive ones
#[utoipa::path(
    get,
    path = "/admin/books",
    tag = "admin",
    security(("bearer_auth" = [])),
    params(AdminListParams),
    responses(
        (status = 200, description = "Book list", body = BookListResponse),
        (status = 403, description = "Admin privileges required")
    )
)]
pub async fn list_books(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Query(params): Query<AdminListParams>,
) -> AppResult<Json<BookListResponse>> {
    claims.require_admin()?;

    let defaults = BookQuery::default();
    let query = BookQuery {
        page: params.page.unwrap_or(1).max(1),
        limit: params.limit.unwrap_or(20).clamp(1, 100),
        sort_by: params.sort_by.unwrap_or(defaults.sort_by),
        sort_desc: params.sort_order.as_deref() == Some("desc"),
        include_inactive: params.include_inactive.unwrap_or(false),
        ..defaults
    };

    let (books, pagination) = state.services.catalog.search(&query).await?;
    Ok(Json(BookListResponse { books, pagination }))
}

/// Create a new book
#[utoipa::path(
    post,
    path = "/admin/books",
    tag = "admin",
    security(("bearer_auth" = [])),
    request_body = CreateBook,
    responses(
        (status = 201, description = "Book created", body = Book),
        (status = 403, description = "Admin privileges required"),
        (status = 409, description = "Duplicate ISBN")
    )
)]
pub async fn create_book(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(request): Json<CreateBook>,
) -> AppResult<(StatusCode, Json<Book>)> {
    claims.require_admin()?;
    request
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let book = state.services.catalog.create(&request).await?;
    Ok((StatusCode::CREATED, Json(book)))
}

/// Update a book
#[utoipa::path(
    put,
    path = "/admin/books/{id}",
    tag = "admin",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Book ID")),
    request_body = UpdateBook,
    responses(
        (status = 200, description = "Book updated", body = Book),
        (status = 403, description = "Admin privileges required"),
        (status = 404, description = "Book not found")
    )
)]
pub async fn update_book(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateBook>,
) -> AppResult<Json<Book>> {
    claims.require_admin()?;
    request
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let book = state.services.catalog.update(id, &request).await?;
    Ok(Json(book))
}

/// Soft-delete a book
#[utoipa::path(
    delete,
    path = "/admin/books/{id}",
    tag = "admin",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Book ID")),
    responses(
        (status = 204, description = "Book deactivated"),
        (status = 403, description = "Admin privileges required"),
        (status = 404, description = "Book not found")
    )
)]
pub async fn delete_book(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    claims.require_admin()?;
    state.services.catalog.deactivate(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
