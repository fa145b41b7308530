//! API error responses.
//!
//! Every failure is rendered as `{"error": "<message>"}`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::application::ports::{SourceError, StorageError};
use crate::domain::market::MarketParseError;
use crate::infrastructure::upstream::UpstreamError;

/// Error body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, serde::Deserialize)]
pub struct ErrorBody {
    /// Human-readable message.
    pub error: String,
}

/// HTTP API errors.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Malformed path or query.
    #[error("{0}")]
    BadRequest(String),

    /// No such board, cache entry or view.
    #[error("{0}")]
    NotFound(String),

    /// Upstream request or decoding failed.
    #[error("{0}")]
    Upstream(String),

    /// Key/value store failure.
    #[error("{0}")]
    Storage(String),
}

impl ApiError {
    /// HTTP status of the error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Upstream(_) | Self::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::warn!(error = %self, "Request failed");
        }
        (
            status,
            Json(ErrorBody {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}

impl From<UpstreamError> for ApiError {
    fn from(error: UpstreamError) -> Self {
        Self::Upstream(error.to_string())
    }
}

impl From<SourceError> for ApiError {
    fn from(error: SourceError) -> Self {
        match error {
            SourceError::UnsupportedCategory { .. } => Self::BadRequest(error.to_string()),
            other => Self::Upstream(other.to_string()),
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(error: StorageError) -> Self {
        Self::Storage(error.to_string())
    }
}

impl From<MarketParseError> for ApiError {
    fn from(error: MarketParseError) -> Self {
        Self::BadRequest(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn renders_error_body() {
        let response = ApiError::Upstream("boom".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: ErrorBody = serde_json::from_slice(&body).unwrap();
        assert_eq!(body.error, "boom");
    }

    #[test]
    fn unknown_category_is_a_bad_request() {
        let err: ApiError = MarketParseError::UnknownCategory("futures".to_string()).into();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }
}
