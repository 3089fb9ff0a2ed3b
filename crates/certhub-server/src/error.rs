//! API error taxonomy for the CertHub server.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use certhub_core::db::DatabaseError;
use thiserror::Error;
use tracing::error;

use crate::qr::QrError;

/// Errors surfaced by the HTTP layer, mapped to status codes.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Bad or missing input; the message carries field-level detail.
    #[error("{0}")]
    Validation(String),

    /// Unknown event, certificate, or incoming row.
    #[error("{0}")]
    NotFound(String),

    /// Uniqueness violation surfaced from the store.
    #[error("{0}")]
    Conflict(String),

    /// Failure of a hard external dependency (QR render/upload).
    #[error("{0}")]
    Dependency(String),

    /// Missing or invalid bearer token / identity headers.
    #[error("Unauthorized")]
    Unauthorized,

    /// Identity present but role insufficient.
    #[error("Forbidden")]
    Forbidden,

    /// Storage failure.
    #[error("Database error: {0}")]
    Database(String),
}

impl From<DatabaseError> for ApiError {
    fn from(e: DatabaseError) -> Self {
        match e {
            DatabaseError::NotFound(msg) => Self::NotFound(msg),
            DatabaseError::Conflict(msg) => Self::Conflict(msg),
            other => Self::Database(other.to_string()),
        }
    }
}

impl From<QrError> for ApiError {
    fn from(e: QrError) -> Self {
        Self::Dependency(e.to_string())
    }
}

impl ApiError {
    const fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::Dependency(_) | Self::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(error = %self, "request failed");
        }
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn database_not_found_maps_to_not_found() {
        let err: ApiError = DatabaseError::NotFound("Event e1".to_string()).into();
        assert!(matches!(err, ApiError::NotFound(_)));
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn database_conflict_maps_to_conflict() {
        let err: ApiError = DatabaseError::Conflict("UNIQUE constraint failed".to_string()).into();
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
    }

    #[test]
    fn auth_errors_do_not_leak_detail() {
        assert_eq!(ApiError::Unauthorized.to_string(), "Unauthorized");
        assert_eq!(ApiError::Forbidden.to_string(), "Forbidden");
    }
}
