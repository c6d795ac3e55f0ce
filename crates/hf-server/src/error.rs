//! Error-to-HTTP response conversion.
//!
//! Implements `IntoResponse` for [`hf_core::Error`] so that route handlers
//! can return `Result<T, AppError>` and use `?` on core results.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// Wrapper so we can implement `IntoResponse` for an external type.
#[derive(Debug)]
pub struct AppError(pub hf_core::Error);

impl From<hf_core::Error> for AppError {
    fn from(e: hf_core::Error) -> Self {
        Self(e)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.0.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if status.is_server_error() {
            tracing::error!(status = %status, error = %self.0, "Server error in API handler");
        }

        let code = match &self.0 {
            hf_core::Error::Io { .. } => "io_error",
            hf_core::Error::Tool { .. } => "tool_error",
            hf_core::Error::Probe(_) => "probe_error",
            hf_core::Error::Transcode { .. } => "transcode_error",
            hf_core::Error::PlaylistWrite { .. } => "playlist_write_error",
            hf_core::Error::Validation(_) => "validation_error",
            hf_core::Error::Cancelled(_) => "cancelled",
            hf_core::Error::Internal(_) => "internal_error",
        };

        let body = json!({
            "error": self.0.to_string(),
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}
