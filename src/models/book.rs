//! Book model and catalog-management types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Book model from database
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Book {
    pub id: Uuid,
    pub title: String,
    pub author: String,
    pub isbn: Option<String>,
    pub genre: Option<String>,
    pub published_year: Option<i32>,
    pub description: Option<String>,
    pub total_copies: i32,
    pub available_copies: i32,
    pub shelf: Option<String>,
    pub section: Option<String>,
    pub tags: Vec<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Book {
    pub fn borrowed_copies(&self) -> i32 {
        self.total_copies - self.available_copies
    }

    pub fn is_available(&self) -> bool {
        self.available_copies > 0
    }

    pub fn summary(&self) -> BookSummary {
        BookSummary {
            id: self.id,
            title: self.title.clone(),
            author: self.author.clone(),
            isbn: self.isbn.clone(),
            genre: self.genre.clone(),
        }
    }
}

/// Compact book representation embedded in loan responses
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct BookSummary {
    pub id: Uuid,
    pub title: String,
    pub author: String,
    pub isbn: Option<String>,
    pub genre: Option<String>,
}

/// Create book request (admin)
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateBook {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(min = 1, max = 100))]
    pub author: String,
    #[validate(length(min = 10, max = 13))]
    pub isbn: Option<String>,
    #[validate(length(max = 50))]
    pub genre: Option<String>,
    #[validate(range(min = 1000, max = 2100))]
    pub published_year: Option<i32>,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    #[validate(range(min = 1))]
    pub total_copies: i32,
    /// Defaults to total_copies when omitted
    #[validate(range(min = 0))]
    pub available_copies: Option<i32>,
    pub shelf: Option<String>,
    pub section: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Update book request (admin). Only provided fields are changed.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateBook {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub author: Option<String>,
    #[validate(length(min = 10, max = 13))]
    pub isbn: Option<String>,
    #[validate(length(max = 50))]
    pub genre: Option<String>,
    #[validate(range(min = 1000, max = 2100))]
    pub published_year: Option<i32>,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    #[validate(range(min = 1))]
    pub total_copies: Option<i32>,
    pub shelf: Option<String>,
    pub section: Option<String>,
    pub tags: Option<Vec<String>>,
    pub is_active: Option<bool>,
}

/// Catalog listing/search parameters
#[derive(Debug, Clone)]
pub struct BookQuery {
    pub search: Option<String>,
    pub genre: Option<String>,
    pub published_year: Option<i32>,
    pub page: i64,
    pub limit: i64,
    pub sort_by: String,
    pub sort_desc: bool,
    pub include_inactive: bool,
}

impl Default for BookQuery {
    fn default() -> Self {
        Self {
            search: None,
            genre: None,
            published_year: None,
            page: 1,
            limit: 12,
            sort_by: "title".to_string(),
            sort_desc: false,
            include_inactive: false,
        }
    }
}
