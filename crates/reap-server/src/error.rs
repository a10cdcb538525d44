use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::dto::ErrorResponse;

/// Request rejections, rendered as an [`ErrorResponse`] body.
#[derive(Debug)]
pub enum ApiError {
    Unauthorized,
    RunInProgress,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match self {
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "unauthorized",
                "Missing or invalid Authorization header. Expected: Bearer <api_key>",
            ),
            ApiError::RunInProgress => (
                StatusCode::CONFLICT,
                "run_in_progress",
                "A run is already in progress",
            ),
        };

        let body = ErrorResponse {
            error: error_type.to_string(),
            message: message.to_string(),
        };

        (status, axum::Json(body)).into_response()
    }
}
