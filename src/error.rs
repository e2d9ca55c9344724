//! Gateway error types with HTTP status code mapping.
//!
//! [`GatewayError`] is the central error type for the gateway. Each variant
//! maps to a specific HTTP status code and structured JSON error response.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;

use crate::domain::{ServiceId, SessionId, SessionStatus};

/// Structured JSON error response body.
///
/// All error responses follow this shape:
/// ```json
/// {
///   "error": {
///     "code": 1001,
///     "message": "invalid rating: must be between 1 and 5",
///     "details": "rating"
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
    /// Numeric error code (see code ranges on [`GatewayError`]).
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
    /// Offending field for validation errors.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Server-side error enum with HTTP status code mapping.
///
/// # Error Code Ranges
///
/// | Range     | Category        | HTTP Status                   |
/// |-----------|-----------------|-------------------------------|
/// | 1000–1999 | Validation      | 400 / 401 / 403               |
/// | 2000–2999 | State/Not Found | 404 Not Found / 409 Conflict  |
/// | 3000–3999 | Server          | 500 / 502                     |
/// | 4000–4999 | Domain rule     | 422 Unprocessable Entity      |
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Request input failed validation.
    #[error("invalid {field}: {message}")]
    Validation {
        /// Offending field.
        field: &'static str,
        /// What is wrong with it.
        message: String,
    },

    /// Request did not carry an authenticated actor.
    #[error("missing or invalid actor identity")]
    Unauthorized,

    /// Actor is not allowed to act on this session.
    #[error("{0}")]
    Forbidden(String),

    /// Session with the given ID was not found.
    #[error("session not found: {0}")]
    SessionNotFound(SessionId),

    /// Referenced user does not exist.
    #[error("user not found: {0}")]
    UserNotFound(uuid::Uuid),

    /// Provider has the requested weekday off.
    #[error("provider is unavailable on {weekday}; please select a different date")]
    ProviderUnavailable {
        /// Weekday of the requested date.
        weekday: chrono::Weekday,
    },

    /// Proposal was already accepted or rejected.
    #[error("session {0} has already been actioned")]
    AlreadyActioned(SessionId),

    /// Session was already paid for.
    #[error("session {0} has already been paid")]
    AlreadySettled(SessionId),

    /// Requested transition is not an edge of the session lifecycle.
    #[error("cannot move session from {from} to {to}")]
    IllegalTransition {
        /// Current status.
        from: SessionStatus,
        /// Requested status.
        to: SessionStatus,
    },

    /// Payment could not be captured. Details are only logged.
    #[error("payment could not be completed, please try again later")]
    SettlementFailed,

    /// Catalog holds an offering without a usable cost.
    #[error("catalog entry {0} has a missing or negative cost")]
    CatalogIntegrity(ServiceId),

    /// Persistence layer failure.
    #[error("persistence error: {0}")]
    PersistenceError(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    /// Shorthand for [`GatewayError::Validation`].
    #[must_use]
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }

    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::Validation { .. } => 1001,
            Self::Unauthorized => 1002,
            Self::Forbidden(_) => 1003,
            Self::SessionNotFound(_) => 2001,
            Self::UserNotFound(_) => 2002,
            Self::AlreadyActioned(_) => 2003,
            Self::AlreadySettled(_) => 2004,
            Self::IllegalTransition { .. } => 2005,
            Self::Internal(_) => 3000,
            Self::PersistenceError(_) => 3001,
            Self::CatalogIntegrity(_) => 3002,
            Self::SettlementFailed => 3003,
            Self::ProviderUnavailable { .. } => 4001,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation { .. } => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::SessionNotFound(_) | Self::UserNotFound(_) => StatusCode::NOT_FOUND,
            Self::AlreadyActioned(_) | Self::AlreadySettled(_) | Self::IllegalTransition { .. } => {
                StatusCode::CONFLICT
            }
            Self::ProviderUnavailable { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Self::SettlementFailed => StatusCode::BAD_GATEWAY,
            Self::CatalogIntegrity(_) | Self::PersistenceError(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Returns `true` for faults that are not the caller's doing.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::CatalogIntegrity(_) | Self::PersistenceError(_) | Self::Internal(_)
        )
    }
}

impl From<sqlx::Error> for GatewayError {
    fn from(err: sqlx::Error) -> Self {
        Self::PersistenceError(err.to_string())
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        if self.is_fatal() {
            tracing::error!(error = %self, "request failed");
        }
        let status = self.status_code();
        let details = match &self {
            Self::Validation { field, .. } => Some((*field).to_string()),
            _ => None,
        };
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.error_code(),
                message: self.to_string(),
                details,
            },
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}
