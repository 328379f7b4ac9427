//! Service error types with HTTP status code mapping.
//!
//! [`HappinessError`] is the central error type for the crate. Each variant
//! maps to a specific HTTP status code and structured JSON error response.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;

use crate::domain::{BunnyId, EventId};

/// Structured JSON error response body.
///
/// All error responses follow this shape:
/// ```json
/// {
///   "error": {
///     "code": 1001,
///     "message": "validation failed: lettuce must be non-negative",
///     "details": null
///   }
/// }
/// ```
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Numeric error code (see [`HappinessError`] code ranges).
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
    /// Optional additional details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Error enum shared by the engine, the storage backends and the service.
///
/// # Error Code Ranges
///
/// | Range     | Category          | HTTP Status               |
/// |-----------|-------------------|---------------------------|
/// | 1000–1999 | Validation        | 400 Bad Request           |
/// | 2000–2999 | Not Found         | 404 Not Found             |
/// | 3000–3999 | Server / Storage  | 500 Internal Server Error |
/// | 4000–4999 | Invalid operation | 422 Unprocessable Entity  |
#[derive(Debug, thiserror::Error)]
pub enum HappinessError {
    /// Bunny with the given ID does not exist.
    #[error("bunny not found: {0}")]
    BunnyNotFound(BunnyId),

    /// Ledger event with the given ID does not exist.
    #[error("event not found: {0}")]
    EventNotFound(EventId),

    /// Operation is not allowed for these arguments (e.g. self-play).
    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    /// Input failed validation (names, URLs, point values).
    #[error("validation failed: {0}")]
    Validation(String),

    /// A stored event whose type and details disagree.
    #[error("malformed event {event_id}: {reason}")]
    MalformedEvent {
        /// Offending event.
        event_id: EventId,
        /// What is wrong with it.
        reason: String,
    },

    /// Underlying persistence failure.
    #[error("storage error: {0}")]
    Storage(String),

    /// Internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl HappinessError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::Validation(_) => 1001,
            Self::BunnyNotFound(_) => 2001,
            Self::EventNotFound(_) => 2002,
            Self::Internal(_) => 3000,
            Self::Storage(_) => 3001,
            Self::InvalidOperation(_) => 4001,
            Self::MalformedEvent { .. } => 4002,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::BunnyNotFound(_) | Self::EventNotFound(_) => StatusCode::NOT_FOUND,
            Self::InvalidOperation(_) | Self::MalformedEvent { .. } => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            Self::Storage(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<sqlx::Error> for HappinessError {
    fn from(err: sqlx::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

impl IntoResponse for HappinessError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.error_code(),
                message: self.to_string(),
                details: None,
            },
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}
