//! Error handling for the engine.
//!
//! Every failure a caller can see is a discriminable variant; checkout flows
//! branch on `is_retryable` to decide whether resubmitting the same request
//! makes sense.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Engine error type
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("requested {requested} seats but only {available} available")]
    CapacityExceeded { requested: i32, available: i32 },

    #[error("booking cutoff passed at {deadline}")]
    CutoffPassed { deadline: DateTime<Utc> },

    #[error("occurrence is {status}")]
    OccurrenceClosed { status: String },

    #[error("could not acquire occurrence lock in time")]
    ConcurrencyConflict,

    #[error("configuration error: {message}")]
    Configuration {
        message: String,
        errors: Vec<String>,
    },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl EngineError {
    /// Whether the caller may safely retry the same request unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, EngineError::ConcurrencyConflict)
    }

    fn code(&self) -> &'static str {
        match self {
            EngineError::Validation(_) => "validation_error",
            EngineError::NotFound(_) => "not_found",
            EngineError::CapacityExceeded { .. } => "capacity_exceeded",
            EngineError::CutoffPassed { .. } => "cutoff_passed",
            EngineError::OccurrenceClosed { .. } => "occurrence_closed",
            EngineError::ConcurrencyConflict => "concurrency_conflict",
            EngineError::Configuration { .. } => "configuration_error",
            EngineError::Database(_) => "database_error",
        }
    }
}

/// JSON error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    errors: Vec<String>,
    retryable: bool,
}

impl IntoResponse for EngineError {
    fn into_response(self) -> Response {
        let retryable = self.is_retryable();
        let (status, details, errors) = match &self {
            EngineError::Validation(msg) => (StatusCode::BAD_REQUEST, Some(msg.clone()), vec![]),
            EngineError::NotFound(msg) => (StatusCode::NOT_FOUND, Some(msg.clone()), vec![]),
            EngineError::CapacityExceeded { .. } => {
                (StatusCode::CONFLICT, Some(self.to_string()), vec![])
            }
            EngineError::CutoffPassed { .. } | EngineError::OccurrenceClosed { .. } => {
                (StatusCode::GONE, Some(self.to_string()), vec![])
            }
            EngineError::ConcurrencyConflict => {
                (StatusCode::SERVICE_UNAVAILABLE, Some(self.to_string()), vec![])
            }
            EngineError::Configuration { message, errors } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                Some(message.clone()),
                errors.clone(),
            ),
            EngineError::Database(e) => {
                tracing::error!("Database error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, None, vec![])
            }
        };

        let body = ErrorResponse {
            error: self.code(),
            details,
            errors,
            retryable,
        };

        (status, Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_concurrency_conflict_is_retryable() {
        assert!(EngineError::ConcurrencyConflict.is_retryable());
        assert!(!EngineError::Validation("bad".into()).is_retryable());
        assert!(!EngineError::CapacityExceeded {
            requested: 8,
            available: 2
        }
        .is_retryable());
        assert!(!EngineError::CutoffPassed {
            deadline: Utc::now()
        }
        .is_retryable());
    }

    #[test]
    fn test_capacity_exceeded_display() {
        let err = EngineError::CapacityExceeded {
            requested: 8,
            available: 2,
        };
        assert!(err.to_string().contains("8"));
        assert!(err.to_string().contains("2"));
    }
}
