//! API error type with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use domain::{AppError, ErrorCode};

/// API-level error: an [`AppError`] rendered as `{"code", "error"}`.
#[derive(Debug)]
pub struct ApiError(pub AppError);

/// Returns the HTTP status for an error code.
pub fn status_for(code: ErrorCode) -> StatusCode {
    match code {
        ErrorCode::InvalidRequest
        | ErrorCode::InvalidPrice
        | ErrorCode::InvalidQuantity
        | ErrorCode::CartFull
        | ErrorCode::CartEmpty => StatusCode::BAD_REQUEST,
        ErrorCode::ProductNotFound => StatusCode::NOT_FOUND,
        ErrorCode::InsufficientStock => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let err = self.0;
        let status = status_for(err.code());

        if status.is_server_error() {
            match err.cause() {
                Some(cause) => {
                    tracing::error!(code = %err.code(), error = %err, %cause, "request failed")
                }
                None => tracing::error!(code = %err.code(), error = %err, "request failed"),
            }
        }

        let body = serde_json::json!({
            "code": err.code(),
            "error": err.message(),
        });
        (status, axum::Json(body)).into_response()
    }
}

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        ApiError(err)
    }
}
