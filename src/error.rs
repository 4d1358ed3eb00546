//! Error handling for the edgecam server

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Error types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Camera read failed (transient, caller backs off and retries)
    #[error("Capture unavailable: {0}")]
    CaptureUnavailable(String),

    /// Reconnect cycle failed (caller waits longer, never fatal)
    #[error("Reconnect failed: {0}")]
    ReconnectFailed(String),

    /// Detector call failed (degrade to no detection this frame)
    #[error("Detector error: {0}")]
    Detector(String),

    /// Store error (on write: logged, event lost; on read: degraded response)
    #[error("Store error: {0}")]
    Store(String),

    /// SQLx database error
    #[error("SQLx error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// HTTP client error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Image decode/encode error
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match &self {
            Error::CaptureUnavailable(msg) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "CAMERA_UNAVAILABLE",
                msg.clone(),
            ),
            Error::ReconnectFailed(msg) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "CAMERA_RECONNECT_FAILED",
                msg.clone(),
            ),
            Error::Detector(msg) => (StatusCode::BAD_GATEWAY, "DETECTOR_ERROR", msg.clone()),
            Error::Store(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "DATABASE_ERROR",
                msg.clone(),
            ),
            Error::Sqlx(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "DATABASE_ERROR",
                e.to_string(),
            ),
            Error::Http(e) => (StatusCode::BAD_GATEWAY, "HTTP_ERROR", e.to_string()),
            Error::Io(e) => (StatusCode::INTERNAL_SERVER_ERROR, "IO_ERROR", e.to_string()),
            Error::Serialization(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "SERIALIZATION_ERROR",
                e.to_string(),
            ),
            Error::Image(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "IMAGE_ERROR",
                e.to_string(),
            ),
        };

        tracing::error!(
            status = %status,
            error_code = %error_code,
            message = %message,
            "Request error"
        );

        let body = Json(json!({
            "error_code": error_code,
            "message": message
        }));

        (status, body).into_response()
    }
}
