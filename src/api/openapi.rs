//! OpenAPI documentation

use axum::Router;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{admin, auth, books, health, stats, user};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Libris API",
        version = "1.0.0",
        description = "Library Circulation Server REST API",
        license(name = "AGPL-3.0", url = "https://www.gnu.org/licenses/agpl-3.0.html")
    ),
    servers(
        (url = "/api/v1", description = "API v1")
    ),
    paths(
        // Health
        health::health_check,
        health::readiness_check,
        // Auth
        auth::register,
        auth::login,
        auth::me,
        auth::update_profile,
        // Books
        books::list_books,
        books::get_book,
        books::borrow_book,
        books::return_book,
        books::reserve_book,
        // User
        user::active_borrows,
        user::borrow_history,
        user::renew_borrow,
        stats::user_stats,
        // Admin
        stats::dashboard_stats,
        admin::list_books,
        admin::create_book,
        admin::update_book,
        admin::delete_book,
    ),
    components(
        schemas(
            // Auth
            crate::models::user::RegisterRequest,
            crate::models::user::LoginRequest,
            crate::models::user::UpdateProfile,
            crate::models::user::AuthResponse,
            crate::models::user::UserPublic,
            crate::models::user::UserSummary,
            crate::models::user::UserRole,
            // Books
            crate::models::book::Book,
            crate::models::book::BookSummary,
            crate::models::book::CreateBook,
            crate::models::book::UpdateBook,
            books::BookListResponse,
            books::BorrowResponse,
            books::ReserveResponse,
            // Loans
            crate::models::borrow::BorrowRecord,
            crate::models::borrow::BorrowDetails,
            crate::models::borrow::LoanStatus,
            user::ActiveBorrowsResponse,
            user::HistoryResponse,
            user::RenewResponse,
            // Stats
            stats::UserStatsResponse,
            stats::GenreCount,
            stats::DashboardStats,
            stats::PopularBook,
            // Pagination
            crate::models::Pagination,
            // Health
            health::HealthResponse,
            // Errors
            crate::error::ErrorResponse,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "auth", description = "Authentication endpoints"),
        (name = "books", description = "Catalog browsing"),
        (name = "circulation", description = "Borrow, return and reserve"),
        (name = "user", description = "Member loan management"),
        (name = "admin", description = "Administration")
    )
)]
pub struct ApiDoc;

/// Create the OpenAPI documentation router
pub fn create_openapi_router() -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
