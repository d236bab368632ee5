//! Error types for Libris server

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

/// Application error codes exposed to API clients
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ErrorCode {
    Success = 0,
    Failure = 1,
    NotAuthorized = 2,
    DbFailure = 3,
    NoSuchUser = 4,
    NoSuchBook = 5,
    NoSuchLoan = 6,
    NoCopiesAvailable = 7,
    AlreadyBorrowed = 8,
    NoActiveLoan = 9,
    BorrowLimitExceeded = 10,
    MaxRenewalsExceeded = 11,
    NotRenewable = 12,
    NotOwner = 13,
    ConcurrencyConflict = 14,
    Duplicate = 15,
    BadValue = 16,
}

/// Main application error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Authorization failed: {0}")]
    Authorization(String),

    #[error("Book with id {0} not found")]
    BookNotFound(Uuid),

    #[error("User with id {0} not found")]
    UserNotFound(Uuid),

    #[error("Borrow record {0} not found")]
    LoanNotFound(Uuid),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("No copies available for borrowing")]
    NoCopiesAvailable,

    #[error("You already have this book borrowed")]
    AlreadyBorrowed,

    #[error("No active borrow record found for this book")]
    NoActiveLoan,

    #[error("Maximum borrowing limit reached ({0} books)")]
    BorrowLimitExceeded(i64),

    #[error("Maximum renewals reached ({0})")]
    MaxRenewalsExceeded(i16),

    #[error("Loan is not renewable")]
    NotRenewable,

    #[error("Loan belongs to another user")]
    NotOwner,

    #[error("Operation could not complete due to concurrent updates, please retry")]
    ConcurrencyConflict,

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal server error: {0}")]
    Internal(String),
}

/// Error response body
#[derive(Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    pub code: u32,
    pub error: String,
    pub message: String,
}

impl AppError {
    /// Status code, machine-readable error code and client message for
    /// this error
    fn parts(&self) -> (StatusCode, ErrorCode, String) {
        match self {
            AppError::Authentication(msg) => {
                (StatusCode::UNAUTHORIZED, ErrorCode::NotAuthorized, msg.clone())
            }
            AppError::Authorization(msg) => {
                (StatusCode::FORBIDDEN, ErrorCode::NotAuthorized, msg.clone())
            }
            AppError::BookNotFound(_) => {
                (StatusCode::NOT_FOUND, ErrorCode::NoSuchBook, self.to_string())
            }
            AppError::UserNotFound(_) => {
                (StatusCode::NOT_FOUND, ErrorCode::NoSuchUser, self.to_string())
            }
            AppError::LoanNotFound(_) => {
                (StatusCode::NOT_FOUND, ErrorCode::NoSuchLoan, self.to_string())
            }
            AppError::Validation(msg) => {
                (StatusCode::BAD_REQUEST, ErrorCode::BadValue, msg.clone())
            }
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, ErrorCode::BadValue, msg.clone())
            }
            AppError::Conflict(msg) => {
                (StatusCode::CONFLICT, ErrorCode::Duplicate, msg.clone())
            }
            AppError::NoCopiesAvailable => (
                StatusCode::CONFLICT,
                ErrorCode::NoCopiesAvailable,
                self.to_string(),
            ),
            AppError::AlreadyBorrowed => (
                StatusCode::CONFLICT,
                ErrorCode::AlreadyBorrowed,
                self.to_string(),
            ),
            AppError::NoActiveLoan => (
                StatusCode::CONFLICT,
                ErrorCode::NoActiveLoan,
                self.to_string(),
            ),
            AppError::BorrowLimitExceeded(_) => (
                StatusCode::CONFLICT,
                ErrorCode::BorrowLimitExceeded,
                self.to_string(),
            ),
            AppError::MaxRenewalsExceeded(_) => (
                StatusCode::CONFLICT,
                ErrorCode::MaxRenewalsExceeded,
                self.to_string(),
            ),
            AppError::NotRenewable => (
                StatusCode::CONFLICT,
                ErrorCode::NotRenewable,
                self.to_string(),
            ),
            AppError::NotOwner => {
                (StatusCode::FORBIDDEN, ErrorCode::NotOwner, self.to_string())
            }
            AppError::ConcurrencyConflict => (
                StatusCode::SERVICE_UNAVAILABLE,
                ErrorCode::ConcurrencyConflict,
                self.to_string(),
            ),
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorCode::DbFailure,
                    "Database error".to_string(),
                )
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorCode::Failure,
                    "Internal server error".to_string(),
                )
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = self.parts();

        let body = Json(ErrorResponse {
            code: code as u32,
            error: format!("{:?}", code),
            message,
        });

        (status, body).into_response()
    }
}

/// Result type alias for application operations
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_resources_map_to_their_own_codes() {
        let id = Uuid::new_v4();

        let (status, code, msg) = AppError::BookNotFound(id).parts();
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(code, ErrorCode::NoSuchBook);
        assert!(msg.contains(&id.to_string()));

        let (status, code, _) = AppError::UserNotFound(id).parts();
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(code, ErrorCode::NoSuchUser);

        let (status, code, _) = AppError::LoanNotFound(id).parts();
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(code, ErrorCode::NoSuchLoan);
    }

    #[test]
    fn business_rule_violations_are_conflicts() {
        for err in [
            AppError::NoCopiesAvailable,
            AppError::AlreadyBorrowed,
            AppError::NoActiveLoan,
            AppError::BorrowLimitExceeded(5),
            AppError::MaxRenewalsExceeded(2),
            AppError::NotRenewable,
        ] {
            assert_eq!(err.parts().0, StatusCode::CONFLICT);
        }

        assert_eq!(AppError::NotOwner.parts().0, StatusCode::FORBIDDEN);
        assert_eq!(
            AppError::ConcurrencyConflict.parts().0,
            StatusCode::SERVICE_UNAVAILABLE
        );
    }
}
