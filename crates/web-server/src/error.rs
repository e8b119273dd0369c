use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use engine::{ErrorKind, TradeError};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Trade(#[from] TradeError),

    /// A request the extractors refused before any handler logic ran
    /// (malformed JSON, wrongly-typed query parameters).
    #[error("{0}")]
    BadRequest(String),
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

/// Converts any request failure into an HTTP response. Every failure renders
/// the same `{"success": false, "error": ...}` envelope regardless of origin;
/// only the status code varies.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::Trade(err) => {
                let status = match err.kind {
                    ErrorKind::Validation => StatusCode::BAD_REQUEST,
                    ErrorKind::Auth => StatusCode::UNAUTHORIZED,
                    ErrorKind::NotFound => StatusCode::NOT_FOUND,
                    ErrorKind::RateLimit => StatusCode::TOO_MANY_REQUESTS,
                    ErrorKind::Rejected => StatusCode::UNPROCESSABLE_ENTITY,
                    ErrorKind::Transient => StatusCode::BAD_GATEWAY,
                    ErrorKind::Unknown => StatusCode::INTERNAL_SERVER_ERROR,
                };
                if status.is_server_error() {
                    tracing::error!(kind = %err.kind, error = %err, "Request failed.");
                }
                (status, err.message)
            }
            AppError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
        };

        let body = Json(json!({ "success": false, "error": message }));
        (status, body).into_response()
    }
}
