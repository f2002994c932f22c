use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

/// API error taxonomy. Every handler translates its own failures into one
/// of these; nothing propagates unhandled to the transport layer.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    InvalidInput(&'static str),
    #[error("{0}")]
    Unauthorized(&'static str),
    #[error("{0}")]
    InvalidOperation(&'static str),
    #[error("{0}")]
    NotFound(&'static str),
    #[error("{0}")]
    Conflict(&'static str),
    #[error("server error")]
    Internal(anyhow::Error),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, *msg),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, *msg),
            ApiError::InvalidOperation(msg) => (StatusCode::BAD_REQUEST, *msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, *msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, *msg),
            ApiError::Internal(err) => {
                // Detail stays server-side; clients get a generic message.
                tracing::error!(error = ?err, "internal error");
                (StatusCode::INTERNAL_SERVER_ERROR, "Server error")
            }
        };

        (status, Json(json!({ "message": message }))).into_response()
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        ApiError::Internal(err.into())
    }
}

impl From<jsonwebtoken::errors::Error> for ApiError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        ApiError::Internal(err.into())
    }
}

impl From<argon2::password_hash::Error> for ApiError {
    fn from(err: argon2::password_hash::Error) -> Self {
        ApiError::Internal(anyhow::anyhow!(err))
    }
}
