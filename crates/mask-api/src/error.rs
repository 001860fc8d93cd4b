//! # API Error Types
//!
//! Maps store, allocation, and validation failures to HTTP status codes
//! with a structured JSON body. Internal failure details are logged and
//! never returned to clients.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use mask_core::{StoreError, ValidationError};
use mask_engine::AllocationError;

/// User-facing message when the pool is exhausted for a pair.
pub const NO_CAPACITY_MESSAGE: &str = "No number available! Please extend your pool.";

/// Structured JSON error response body.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

/// Inner error detail.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g., "NOT_FOUND", "NO_CAPACITY").
    pub code: String,
    /// Human-readable error message.
    pub message: String,
}

/// Application-level error type that implements [`IntoResponse`] for Axum.
#[derive(Error, Debug)]
pub enum AppError {
    /// Resource not found (404).
    #[error("not found: {0}")]
    NotFound(String),

    /// Request body or parameters were rejected (422).
    #[error("validation error: {0}")]
    Validation(String),

    /// Conflict with current resource state (409).
    #[error("conflict: {0}")]
    Conflict(String),

    /// The proxy pool is exhausted for the requested pair (409).
    #[error("no proxy number available for this pair")]
    NoCapacity,

    /// Internal server error (500). Message is logged but not returned to client.
    #[error("internal error: {0}")]
    Internal(String),

    /// The backing store is unreachable (503).
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
}

impl AppError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            Self::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR"),
            Self::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
            Self::NoCapacity => (StatusCode::CONFLICT, "NO_CAPACITY"),
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
            Self::ServiceUnavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, "SERVICE_UNAVAILABLE"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        let message = match &self {
            Self::Internal(_) => "An internal error occurred".to_string(),
            Self::ServiceUnavailable(_) => "The service is temporarily unavailable".to_string(),
            Self::NoCapacity => NO_CAPACITY_MESSAGE.to_string(),
            other => other.to_string(),
        };

        match &self {
            Self::Internal(_) => tracing::error!(error = %self, "internal server error"),
            Self::ServiceUnavailable(_) => tracing::warn!(error = %self, "service unavailable"),
            _ => {}
        }

        let body = ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message,
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        Self::Validation(err.to_string())
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable(_) => Self::ServiceUnavailable(err.to_string()),
            StoreError::Corrupt { .. } => Self::Internal(err.to_string()),
            StoreError::DuplicateAddress(_) => Self::Conflict(err.to_string()),
            StoreError::Invalid(e) => Self::from(e),
        }
    }
}

impl From<AllocationError> for AppError {
    fn from(err: AllocationError) -> Self {
        match err {
            AllocationError::RequesterNotFound(_) | AllocationError::ProviderNotFound(_) => {
                Self::NotFound(err.to_string())
            }
            AllocationError::NoCapacity { .. } => Self::NoCapacity,
            AllocationError::ConstraintViolation(_) => Self::Internal(err.to_string()),
            AllocationError::Store(e) => Self::from(e),
        }
    }
}
