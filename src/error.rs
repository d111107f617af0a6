use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;

pub type Result<T> = std::result::Result<T, AppError>;

/// Error kinds for the whole service. Handlers and the worker both speak this
/// type; the `IntoResponse` impl below is the only place errors are turned
/// into HTTP status codes.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("invalid request: {0}")]
    Validation(String),

    #[error("payload of {size} bytes exceeds limit of {limit} bytes")]
    PayloadTooLarge { size: usize, limit: usize },

    #[error("unsupported media type: {0}")]
    UnsupportedMediaType(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error("conflict: {0}")]
    Conflict(String),

    /// Object storage is unreachable or returned a server error. Retryable.
    #[error("storage unavailable: {0}")]
    Storage(String),

    /// Video bytes could not be decoded. Not retried.
    #[error("undecodable video: {0}")]
    Decode(String),

    /// Video too short to analyze. Not retried.
    #[error("video has {frames} samples, minimum is {min}")]
    InsufficientContent { frames: usize, min: usize },

    /// Scoring pipeline failure. Retried up to the configured max attempts.
    #[error("scoring failed: {0}")]
    Model(String),

    #[error("database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("queue error: {0}")]
    Queue(#[from] redis::RedisError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Whether the orchestrator should re-enqueue the job after this error.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AppError::Storage(_) | AppError::Model(_) | AppError::Database(_) | AppError::Queue(_)
        )
    }

    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Storage(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Decode(_) | AppError::InsufficientContent { .. } => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            AppError::Model(_)
            | AppError::Database(_)
            | AppError::Queue(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn oversize_maps_to_413() {
        let err = AppError::PayloadTooLarge { size: 700, limit: 500 };
        assert_eq!(err.status_code(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[test]
    fn bad_media_type_maps_to_415() {
        let err = AppError::UnsupportedMediaType("text/plain".into());
        assert_eq!(err.status_code(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    }

    #[test]
    fn lookup_miss_maps_to_404() {
        assert_eq!(
            AppError::NotFound("video".into()).status_code(),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn decode_and_short_videos_are_not_retryable() {
        assert!(!AppError::Decode("bad container".into()).is_retryable());
        assert!(!AppError::InsufficientContent { frames: 2, min: 8 }.is_retryable());
    }

    #[test]
    fn storage_and_model_errors_are_retryable() {
        assert!(AppError::Storage("timeout".into()).is_retryable());
        assert!(AppError::Model("inference crashed".into()).is_retryable());
    }
}
