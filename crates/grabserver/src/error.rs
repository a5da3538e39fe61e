//! HTTP error responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde_json::json;
use thiserror::Error;

use grabcore::core::ValidationError;
use grabcore::FetchFailure;

#[derive(Debug, Error)]
pub enum ApiError {
    /// Request parameters failed validation
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Query string or JSON body could not be decoded
    #[error("{0}")]
    BadRequest(String),

    /// Download and URL fallback both failed
    #[error(transparent)]
    Fetch(#[from] FetchFailure),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Validation(e) => (
                StatusCode::BAD_REQUEST,
                Json(json!({
                    "error": e.to_string(),
                    "suggestion": "Send an http(s) URL and a quality of 0 (audio), 144, 240, 360, 480, 720, 1080, 1440 or 2160."
                })),
            )
                .into_response(),
            ApiError::BadRequest(message) => (
                StatusCode::BAD_REQUEST,
                Json(json!({
                    "error": message,
                    "suggestion": "Expected parameters: url, quality, audioOnly, progress."
                })),
            )
                .into_response(),
            ApiError::Fetch(failure) => (StatusCode::INTERNAL_SERVER_ERROR, Json(failure)).into_response(),
        }
    }
}
