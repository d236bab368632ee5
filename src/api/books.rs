//! Catalog and circulation endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::{
        book::{Book, BookQuery},
        borrow::BorrowDetails,
        Pagination,
    },
    AppState,
};

use super::AuthenticatedUser;

/// Catalog listing parameters
#[derive(Debug, Deserialize, IntoParams)]
pub struct ListBooksParams {
    /// Free-text search over title, author, description and tags
    pub q: Option<String>,
    pub genre: Option<String>,
    pub published_year: Option<i32>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
}

impl ListBooksParams {
    fn into_query(self) -> BookQuery {
        let defaults = BookQuery::default();
        BookQuery {
            search: self.q,
            genre: self.genre,
            published_year: self.published_year,
            page: self.page.unwrap_or(1).max(1),
            limit: self.limit.unwrap_or(12).clamp(1, 50),
            sort_by: self.sort_by.unwrap_or(defaults.sort_by),
            sort_desc: self.sort_order.as_deref() == Some("desc"),
            include_inactive: false,
        }
    }
}

/// Paginated catalog response
#[derive(Serialize, ToSchema)]
pub struct BookListResponse {
    pub books: Vec<Book>,
    pub pagination: Pagination,
}

/// Borrow/return response
#[derive(Serialize, ToSchema)]
pub struct BorrowResponse {
    pub message: String,
    pub borrow_record: BorrowDetails,
}

/// Reservation acknowledgement
#[derive(Serialize, ToSchema)]
pub struct ReserveResponse {
    pub message: String,
    pub book: Book,
}

/// List books with pagination and filters
#[utoipa::path(
    get,
    path = "/books",
    tag = "books",
    params(ListBooksParams),
    responses(
        (status = 200, description = "Book list", body = BookListResponse)
    )
)]
pub async fn list_books(
    State(state): State<AppState>,
    Query(params): Query<ListBooksParams>,
) -> AppResult<Json<BookListResponse>> {
    let query = params.into_query();
    let (books, pagination) = state.services.catalog.search(&query).await?;
    Ok(Json(BookListResponse { books, pagination }))
}

/// Get a single book
#[utoipa::path(
    get,
    path = "/books/{id}",
    tag = "books",
    params(("id" = Uuid, Path, description = "Book ID")),
    responses(
        (status = 200, description = "Book details", body = Book),
        (status = 404, description = "Book not found")
    )
)]
pub async fn get_book(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Book>> {
    let book = state.services.catalog.get(id).await?;
    Ok(Json(book))
}

/// Borrow a book
#[utoipa::path(
    post,
    path = "/books/{id}/borrow",
    tag = "circulation",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Book ID")),
    responses(
        (status = 201, description = "Book borrowed", body = BorrowResponse),
        (status = 404, description = "Book not found"),
        (status = 409, description = "No copies available, already borrowed, or borrow limit reached"),
        (status = 503, description = "Concurrent update conflict, retry")
    )
)]
pub async fn borrow_book(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> AppResult<(StatusCode, Json<BorrowResponse>)> {
    let record = state.services.circulation.borrow(id, claims.sub).await?;
    Ok((
        StatusCode::CREATED,
        Json(BorrowResponse {
            message: "Book borrowed successfully".to_string(),
            borrow_record: record,
        }),
    ))
}

/// Return a borrowed book
#[utoipa::path(
    post,
    path = "/books/{id}/return",
    tag = "circulation",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Book ID")),
    responses(
        (status = 200, description = "Book returned", body = BorrowResponse),
        (status = 404, description = "Book not found"),
        (status = 409, description = "No active borrow record for this book"),
        (status = 503, description = "Concurrent update conflict, retry")
    )
)]
pub async fn return_book(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<BorrowResponse>> {
    let record = state.services.circulation.return_book(id, claims.sub).await?;
    Ok(Json(BorrowResponse {
        message: "Book returned successfully".to_string(),
        borrow_record: record,
    }))
}

/// Reserve a book (reservation queueing is not implemented; the request is
/// validated and acknowledged)
#[utoipa::path(
    post,
    path = "/books/{id}/reserve",
    tag = "circulation",
    security(("bearer_auth" = [])),
    params(("id" = Uuid, Path, description = "Book ID")),
    responses(
        (status = 200, description = "Reservation acknowledged", body = ReserveResponse),
        (status = 404, description = "Book not found")
    )
)]
pub async fn reserve_book(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ReserveResponse>> {
    let book = state.services.circulation.reserve(id, claims.sub).await?;
    Ok(Json(ReserveResponse {
        message: "Book reserved successfully (feature coming soon)".to_string(),
        book,
    }))
}
