//!
//! # Application Error Handling
//!
//! This module defines the custom error type `AppError` used throughout the application.
//! It centralizes error management so that every failure, from a rejected payload to a
//! broken upstream weather call, is reported to the client in the same shape.
//!
//! `AppError` implements `actix_web::error::ResponseError` to convert application errors
//! into HTTP responses with a `{"error": "..."}` JSON body. `From` implementations for
//! `sqlx::Error`, `validator::ValidationErrors`, `bcrypt::BcryptError` and
//! `reqwest::Error` allow conversion with the `?` operator.

use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use serde_json::json;
use std::fmt;
use validator::ValidationErrors;

/// Represents all possible errors that can occur within the application.
///
/// Each variant carries a message detailing the issue and maps to a fixed
/// HTTP status code.
#[derive(Debug)]
pub enum AppError {
    /// A malformed or rejected request, including failed payload validation (HTTP 400).
    Validation(String),
    /// Missing or invalid credentials (HTTP 401).
    Unauthenticated(String),
    /// The caller is authenticated but not allowed to perform the action (HTTP 403).
    Forbidden(String),
    /// A requested resource does not exist (HTTP 404).
    NotFound(String),
    /// An unexpected server-side failure, including upstream service errors (HTTP 500).
    Service(String),
    /// An error originating from database operations (HTTP 500).
    /// Wraps errors from the `sqlx` crate.
    Database(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AppError::Validation(msg) => write!(f, "Validation: {}", msg),
            AppError::Unauthenticated(msg) => write!(f, "Unauthenticated: {}", msg),
            AppError::Forbidden(msg) => write!(f, "Forbidden: {}", msg),
            AppError::NotFound(msg) => write!(f, "Not Found: {}", msg),
            AppError::Service(msg) => write!(f, "Service Error: {}", msg),
            AppError::Database(msg) => write!(f, "Database Error: {}", msg),
        }
    }
}

/// Converts `AppError` variants into `HttpResponse` objects.
///
/// This implementation lets Actix Web translate `AppError` results from handlers
/// into the correct HTTP status codes and JSON error bodies.
impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            // Database errors are presented as generic server errors to the client.
            AppError::Service(_) | AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let message = match self {
            AppError::Validation(msg)
            | AppError::Unauthenticated(msg)
            | AppError::Forbidden(msg)
            | AppError::NotFound(msg)
            | AppError::Service(msg)
            | AppError::Database(msg) => msg,
        };
        HttpResponse::build(self.status_code()).json(json!({
            "error": message
        }))
    }
}

/// Converts `sqlx::Error` into `AppError`.
///
/// `sqlx::Error::RowNotFound` is mapped to `AppError::NotFound`, while other
/// database errors become `AppError::Database`.
impl From<sqlx::Error> for AppError {
    fn from(error: sqlx::Error) -> AppError {
        match error {
            sqlx::Error::RowNotFound => AppError::NotFound("Record not found".into()),
            _ => AppError::Database(error.to_string()),
        }
    }
}

/// Converts `validator::ValidationErrors` into `AppError::Validation`.
///
/// The detailed validation messages are preserved.
impl From<ValidationErrors> for AppError {
    fn from(error: ValidationErrors) -> AppError {
        AppError::Validation(error.to_string())
    }
}

/// Converts `bcrypt::BcryptError` into `AppError::Service`.
///
/// This handles errors during password hashing or verification.
impl From<bcrypt::BcryptError> for AppError {
    fn from(error: bcrypt::BcryptError) -> AppError {
        AppError::Service(error.to_string())
    }
}

/// Converts `reqwest::Error` into `AppError::Service`.
///
/// Used when a call to the upstream weather provider fails.
impl From<reqwest::Error> for AppError {
    fn from(error: reqwest::Error) -> AppError {
        AppError::Service(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_responses() {
        // Test Validation
        let error = AppError::Validation("title is too long".into());
        let response = error.error_response();
        assert_eq!(response.status(), 400);

        // Test Unauthenticated
        let error = AppError::Unauthenticated("Invalid token.".into());
        let response = error.error_response();
        assert_eq!(response.status(), 401);

        // Test Forbidden
        let error = AppError::Forbidden("You do not own this task".into());
        let response = error.error_response();
        assert_eq!(response.status(), 403);

        // Test NotFound
        let error = AppError::NotFound("Task not found".into());
        let response = error.error_response();
        assert_eq!(response.status(), 404);

        // Test Service
        let error = AppError::Service("weather provider unreachable".into());
        let response = error.error_response();
        assert_eq!(response.status(), 500);

        // Test Database
        let error = AppError::Database("connection refused".into());
        let response = error.error_response();
        assert_eq!(response.status(), 500);
    }

    #[test]
    fn test_row_not_found_maps_to_not_found() {
        let error: AppError = sqlx::Error::RowNotFound.into();
        assert_eq!(error.error_response().status(), 404);
    }
}
