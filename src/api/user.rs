//! Member-facing loan endpoints

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{borrow::BorrowDetails, borrow::LoanStatus, Pagination},
    AppState,
};

use super::AuthenticatedUser;

/// Borrow history parameters
#[derive(Debug, Deserialize, IntoParams)]
pub struct HistoryParams {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    /// Filter by logical status (borrowed, renewed, overdue, returned)
    pub status: Option<String>,
}

/// Active borrows response
#[derive(Serialize, ToSchema)]
pub struct ActiveBorrowsResponse {
    pub data: Vec<BorrowDetails>,
    pub count: usize,
}

/// Borrow history response
#[derive(Serialize, ToSchema)]
pub struct HistoryResponse {
    pub data: Vec<BorrowDetails>,
    pub pagination: Pagination,
}

/// Renewal response
#[derive(Serialize, ToSchema)]
pub struct RenewResponse {
    pub message: String,
    pub borrow_record: BorrowDetails,
}

/// Get the authenticated user's active borrows
#[utoipa::path(
    get,
    path = "/user/active-borrows",
    tag = "user",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Active borrows", body = ActiveBorrowsResponse)
    )
)]
pub async fn active_borrows(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> AppResult<Json<ActiveBorrowsResponse>> {
    let loans = state.services.circulation.active_loans(claims.sub).await?;
    let count = loans.len();
    Ok(Json(ActiveBorrowsResponse { data: loans, count }))
}

/// Get the authenticated user's borrow history
#[utoipa::path(
    get,
    path = "/user/borrow-history",
    tag = "user",
    security(("bearer_auth" = [])),
    params(HistoryParams),
    responses(
        (status = 200, description = "Borrow history", body = HistoryResponse),
        (status = 400, description = "Invalid status filter")
    )
)]
pub async fn borrow_history(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Query(params): Query<HistoryParams>,
) -> AppResult<Json<HistoryResponse>> {
    let page = params.page.unwrap_or(1).max(1);
    let limit = params.limit.unwrap_or(10).clamp(1, 50);
    let status = params.status.as_deref().map(parse_status).transpose()?;

    let (records, total) = state
        .services
        .circulation
        .borrow_history(claims.sub, status, page, limit)
        .await?;

    Ok(Json(HistoryResponse {
        data: records,
        pagination: Pagination::new(page, limit, total),
    }))
}

/// Renew a borrowed book
#[utoipa::path(
    post,
    path = "/user/renew/{borrow_id}",
    tag = "user",
    security(("bearer_auth" = [])),
    params(("borrow_id" = Uuid, Path, description = "Borrow record ID")),
    responses(
        (status = 200, description = "Loan renewed", body = RenewResponse),
        (status = 403, description = "Loan belongs to another user"),
        (status = 404, description = "Borrow record not found"),
        (status = 409, description = "Max renewals reached or loan not renewable")
    )
)]
pub async fn renew_borrow(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(borrow_id): Path<Uuid>,
) -> AppResult<Json<RenewResponse>> {
    let record = state
        .services
        .circulation
        .renew(borrow_id, claims.sub)
        .await?;

    Ok(Json(RenewResponse {
        message: "Book renewed successfully".to_string(),
        borrow_record: record,
    }))
}

fn parse_status(s: &str) -> AppResult<LoanStatus> {
    match s {
        "borrowed" => Ok(LoanStatus::Borrowed),
        "renewed" => Ok(LoanStatus::Renewed),
        "overdue" => Ok(LoanStatus::Overdue),
        "returned" => Ok(LoanStatus::Returned),
        other => Err(AppError::Validation(format!("Invalid status: {}", other))),
    }
}
