//! Data models for Libris server

pub mod book;
pub mod borrow;
pub mod user;

use serde::Serialize;
use utoipa::ToSchema;

/// Pagination metadata returned alongside paginated collections
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Pagination {
    pub current_page: i64,
    pub total_pages: i64,
    pub total: i64,
    pub limit: i64,
    pub has_next_page: bool,
    pub has_prev_page: bool,
}

impl Pagination {
    pub fn new(page: i64, limit: i64, total: i64) -> Self {
        let total_pages = if total == 0 {
            0
        } else {
            (total + limit - 1) / limit
        };
        Self {
            current_page: page,
            total_pages,
            total,
            limit,
            has_next_page: page < total_pages,
            has_prev_page: page > 1,
        }
    }
}
