//! Error handling for the stock ledger server
//!
//! Every error leaves the server as the same JSON envelope with
//! `success: false`, so clients can branch on a single field.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use shared::FilterError;
use thiserror::Error;

use crate::stores::StoreError;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Authentication errors
    #[error("Invalid token")]
    InvalidToken,

    #[error("Insufficient permissions")]
    InsufficientPermissions,

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    // Validation errors
    #[error("Validation error: {message}")]
    Validation { field: String, message: String },

    // Data source errors
    #[error("Data source unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Query error: {0}")]
    Query(String),

    // Internal errors
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl From<FilterError> for AppError {
    fn from(err: FilterError) -> Self {
        AppError::Validation {
            field: err.field().to_string(),
            message: err.to_string(),
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let (field, message) = errors
            .field_errors()
            .into_iter()
            .next()
            .map(|(field, errs)| {
                let message = errs
                    .first()
                    .and_then(|e| e.message.as_ref().map(|m| m.to_string()))
                    .unwrap_or_else(|| format!("{} is invalid", field));
                (field.to_string(), message)
            })
            .unwrap_or_else(|| ("request".to_string(), errors.to_string()));

        AppError::Validation { field, message }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable(msg) => AppError::StoreUnavailable(msg),
            StoreError::Query(msg) => AppError::Query(msg),
        }
    }
}

/// Error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl ErrorResponse {
    pub fn new(code: &str, message: impl Into<String>, field: Option<String>) -> Self {
        Self {
            success: false,
            error: ErrorDetail {
                code: code.to_string(),
                message: message.into(),
                field,
            },
        }
    }
}

impl AppError {
    fn status_and_detail(&self) -> (StatusCode, ErrorResponse) {
        match self {
            AppError::InvalidToken => (
                StatusCode::UNAUTHORIZED,
                ErrorResponse::new("INVALID_TOKEN", "Invalid token", None),
            ),
            AppError::InsufficientPermissions => (
                StatusCode::FORBIDDEN,
                ErrorResponse::new(
                    "INSUFFICIENT_PERMISSIONS",
                    "You do not have permission to perform this action",
                    None,
                ),
            ),
            AppError::Unauthorized(message) => (
                StatusCode::UNAUTHORIZED,
                ErrorResponse::new("UNAUTHORIZED", message.clone(), None),
            ),
            AppError::Validation { field, message } => (
                StatusCode::BAD_REQUEST,
                ErrorResponse::new("VALIDATION_ERROR", message.clone(), Some(field.clone())),
            ),
            AppError::StoreUnavailable(_) => (
                StatusCode::SERVICE_UNAVAILABLE,
                ErrorResponse::new(
                    "STORE_UNAVAILABLE",
                    "A data source is temporarily unavailable",
                    None,
                ),
            ),
            AppError::Query(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorResponse::new("QUERY_ERROR", format!("Query failed: {}", msg), None),
            ),
            AppError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorResponse::new("INTERNAL_ERROR", msg.clone(), None),
            ),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = self.status_and_detail();

        if status.is_server_error() {
            tracing::error!("Error: {:?}", self);
        } else {
            tracing::debug!("Request rejected: {}", self);
        }

        (status, Json(body)).into_response()
    }
}

/// Result type alias for handlers
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_errors_map_to_bad_request() {
        let err: AppError = FilterError::MissingProductCode.into();
        let (status, body) = err.status_and_detail();

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.error.code, "VALIDATION_ERROR");
        assert_eq!(body.error.field.as_deref(), Some("productCode"));
        assert!(!body.success);
    }

    #[test]
    fn test_query_errors_are_surfaced() {
        let err: AppError = StoreError::Query("column \"qty\" does not exist".into()).into();
        let (status, body) = err.status_and_detail();

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.error.code, "QUERY_ERROR");
    }

    #[test]
    fn test_unavailable_store_maps_to_503() {
        let err: AppError = StoreError::Unavailable("pool timed out".into()).into();
        assert_eq!(err.status_and_detail().0, StatusCode::SERVICE_UNAVAILABLE);
    }
}
