//! Statistics endpoints

use axum::{extract::State, Json};
use rust_decimal::Decimal;
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    error::AppResult,
    models::{book::BookSummary, borrow::BorrowDetails},
    AppState,
};

use super::AuthenticatedUser;

/// Per-user borrowing statistics
#[derive(Serialize, ToSchema)]
pub struct UserStatsResponse {
    pub total_borrows: i64,
    /// Active and not yet due
    pub active_borrows: i64,
    /// Active and past due
    pub overdue_borrows: i64,
    pub returned_books: i64,
    /// Finalized fines plus live accrual on overdue loans
    pub total_fines: Decimal,
    pub favorite_genres: Vec<GenreCount>,
}

#[derive(Serialize, ToSchema)]
pub struct GenreCount {
    pub genre: String,
    pub count: i64,
}

/// Library-wide dashboard statistics
#[derive(Serialize, ToSchema)]
pub struct DashboardStats {
    pub total_books: i64,
    pub total_users: i64,
    pub active_borrowings: i64,
    pub overdue_borrowings: i64,
    pub total_fines: Decimal,
    pub recent_borrows: Vec<BorrowDetails>,
    pub popular_books: Vec<PopularBook>,
}

#[derive(Serialize, ToSchema)]
pub struct PopularBook {
    pub book: BookSummary,
    pub borrow_count: i64,
}

/// Get the authenticated user's borrowing statistics
#[utoipa::path(
    get,
    path = "/user/stats",
    tag = "user",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "User statistics", body = UserStatsResponse)
    )
)]
pub async fn user_stats(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<UserStatsResponse>> {
    let stats = state.services.stats.user_stats(claims.sub).await?;
    Ok(Json(stats))
}

/// Get dashboard statistics (admin)
#[utoipa::path(
    get,
    path = "/admin/dashboard/stats",
    tag = "admin",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Dashboard statistics", body = DashboardStats),
        (status = 403, description = "Admin privileges required")
    )
)]
pub async fn dashboard_stats(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<DashboardStats>> {
    claims.require_admin()?;
    let stats = state.services.stats.dashboard().await?;
    Ok(Json(stats))
}
