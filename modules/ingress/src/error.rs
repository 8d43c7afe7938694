use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use svckit::UserError;

/// Wire shape of every error reply.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
}

/// Response-side wrapper turning handler errors into HTTP statuses.
///
/// Internal failures are logged with their cause but answered with a fixed
/// message so storage details never leak to clients.
#[derive(Debug)]
pub struct ApiError(UserError);

impl From<UserError> for ApiError {
    fn from(err: UserError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = match &self.0 {
            UserError::NotFound { .. } => (StatusCode::NOT_FOUND, "not_found"),
            UserError::Invalid { .. } => (StatusCode::BAD_REQUEST, "invalid_payload"),
            UserError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        };

        match &self.0 {
            UserError::Internal(cause) => {
                tracing::error!(error = %cause, status = status.as_u16(), "request failed");
            }
            other => {
                tracing::warn!(error = %other, status = status.as_u16(), "request failed");
            }
        }

        let body = ErrorBody {
            code,
            message: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
