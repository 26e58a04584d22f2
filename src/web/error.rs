use crate::core::FeedError;
use crate::store::{ErrorCode, QueryOutcome};
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::error;

/// Failure of a listing request, rendered as a tagged `QueryOutcome` error.
#[derive(Debug, Error)]
pub enum WebError {
    #[error(transparent)]
    Query(#[from] FeedError),

    #[error("invalid request: {0}")]
    Input(String),
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        let (status, reason) = match self {
            err @ WebError::Input(_) => (StatusCode::BAD_REQUEST, err.to_string()),
            WebError::Query(
                err @ (FeedError::Validation { .. }
                | FeedError::InvalidCursor(_)
                | FeedError::NotFound(_)),
            ) => (StatusCode::BAD_REQUEST, err.to_string()),
            WebError::Query(err) => {
                error!(error = %err, "listing failed");
                (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
            }
        };

        let body: QueryOutcome<()> = QueryOutcome::Error { reason };
        (status, Json(body)).into_response()
    }
}

/// HTTP status carried alongside a mutation error payload
pub fn mutation_status(code: ErrorCode) -> StatusCode {
    match code {
        ErrorCode::Validation => StatusCode::BAD_REQUEST,
        ErrorCode::Unauthorized => StatusCode::UNAUTHORIZED,
        ErrorCode::NotFound => StatusCode::NOT_FOUND,
        ErrorCode::Conflict => StatusCode::CONFLICT,
        ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
