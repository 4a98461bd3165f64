//! Error types for the portfolio server.
//!
//! Uses thiserror for ergonomic error definitions that integrate
//! with axum's response system. Every error renders as the
//! `{success: false, message}` envelope.

use axum::extract::multipart::MultipartError;
use axum::extract::multipart::MultipartRejection;
use axum::extract::rejection::{BytesRejection, JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::error;

use crate::db::CollectionError;
use crate::storage::StorageError;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    // Auth errors
    #[error("Unauthorized")]
    Unauthenticated,

    #[error("Session not found")]
    SessionNotFound,

    // Resource errors
    #[error("{0}")]
    NotFound(String),

    // Validation errors
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    InvalidInput(String),

    #[error("Request body is too large")]
    PayloadTooLarge,

    // Document or object store faults
    #[error("{message}")]
    Upstream {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    // Generic errors
    #[error("{0}")]
    Internal(String),

    #[error("Internal server error")]
    Other(#[from] anyhow::Error),
}

impl Error {
    pub fn upstream(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Upstream {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            // 401
            Self::Unauthenticated | Self::SessionNotFound => StatusCode::UNAUTHORIZED,

            // 404
            Self::NotFound(_) => StatusCode::NOT_FOUND,

            // 400
            Self::Validation(_) | Self::InvalidInput(_) => StatusCode::BAD_REQUEST,

            // 413
            Self::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,

            // 500
            Self::Upstream { .. } | Self::Internal(_) | Self::Other(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Unauthenticated => "UNAUTHENTICATED",
            Self::SessionNotFound => "SESSION_NOT_FOUND",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::InvalidInput(_) => "INVALID_INPUT",
            Self::PayloadTooLarge => "PAYLOAD_TOO_LARGE",
            Self::Upstream { .. } => "UPSTREAM_FAILURE",
            Self::Internal(_) => "INTERNAL_ERROR",
            Self::Other(_) => "UNKNOWN_ERROR",
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if status.is_server_error() {
            match &self {
                Self::Upstream {
                    message,
                    source: Some(source),
                } => error!(code = self.error_code(), cause = %source, "{}", message),
                Self::Other(err) => error!(code = self.error_code(), cause = ?err, "Unhandled error"),
                _ => error!(code = self.error_code(), "{}", self),
            }
        }

        let body = Json(json!({
            "success": false,
            "message": self.to_string(),
        }));

        (status, body).into_response()
    }
}

// Convenience conversions
impl From<CollectionError> for Error {
    fn from(err: CollectionError) -> Self {
        match err {
            CollectionError::NotFound { .. } => Self::NotFound(err.to_string()),
            CollectionError::Storage { action, source } => Self::upstream(action, source),
            // Logged with its detail, answered with the generic message.
            CollectionError::Decode { .. } => Self::Other(anyhow::Error::new(err)),
        }
    }
}

impl From<StorageError> for Error {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::MissingExtension { .. } => Self::InvalidInput(err.to_string()),
            StorageError::Upload { .. } | StorageError::Delete { .. } => Self::Upstream {
                message: err.to_string(),
                source: Some(Box::new(err)),
            },
        }
    }
}

/// Map an extractor rejection onto the envelope, keeping body-limit hits as 413.
fn rejected(status: StatusCode, message: String) -> Error {
    if status == StatusCode::PAYLOAD_TOO_LARGE {
        Error::PayloadTooLarge
    } else {
        Error::InvalidInput(message)
    }
}

impl From<MultipartError> for Error {
    fn from(err: MultipartError) -> Self {
        rejected(err.status(), format!("Invalid multipart form: {}", err.body_text()))
    }
}

impl From<MultipartRejection> for Error {
    fn from(rejection: MultipartRejection) -> Self {
        rejected(
            rejection.status(),
            "Request must be a multipart/form-data form".to_string(),
        )
    }
}

impl From<JsonRejection> for Error {
    fn from(rejection: JsonRejection) -> Self {
        rejected(
            rejection.status(),
            "Data must be a valid JSON object".to_string(),
        )
    }
}

impl From<QueryRejection> for Error {
    fn from(rejection: QueryRejection) -> Self {
        rejected(
            rejection.status(),
            format!("Invalid query string: {}", rejection.body_text()),
        )
    }
}

impl From<BytesRejection> for Error {
    fn from(rejection: BytesRejection) -> Self {
        rejected(rejection.status(), rejection.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::StoreError;

    #[test]
    fn test_status_codes() {
        assert_eq!(Error::Unauthenticated.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            Error::Validation("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            Error::NotFound("Project not found".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            Error::Other(anyhow::anyhow!("boom")).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_unclassified_error_message_is_generic() {
        let err = Error::Other(anyhow::anyhow!("connection reset by peer"));
        assert_eq!(err.to_string(), "Internal server error");
    }

    #[test]
    fn test_collection_errors_map_to_taxonomy() {
        let not_found: Error = CollectionError::NotFound {
            collection: "projects",
            id: "p1".into(),
        }
        .into();
        assert_eq!(not_found.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(not_found.to_string(), "Document does not exist");

        let storage: Error = CollectionError::Storage {
            action: "Failed getting documents",
            source: StoreError::Malformed("x".into()),
        }
        .into();
        assert_eq!(storage.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(storage.to_string(), "Failed getting documents");

        let decode: Error = CollectionError::Decode {
            collection: "projects",
            message: "missing field `title`".into(),
        }
        .into();
        assert_eq!(decode.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(decode.to_string(), "Internal server error");
    }

    #[test]
    fn test_body_limit_rejection_is_payload_too_large() {
        let err = rejected(StatusCode::PAYLOAD_TOO_LARGE, "length limit exceeded".into());
        assert_eq!(err.status_code(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(err.to_string(), "Request body is too large");

        let err = rejected(StatusCode::UNSUPPORTED_MEDIA_TYPE, "Expected JSON".into());
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }
}
