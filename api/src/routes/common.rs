//! Helpers shared across route handlers.

use axum::http::StatusCode;
use services::ServiceError;

/// Maps core errors onto HTTP status codes. Gateway transport failures never
/// reach this point; dispatch captures them in the delivery log.
pub fn status_for(err: &ServiceError) -> StatusCode {
    match err {
        ServiceError::InvalidTransition { .. } | ServiceError::RetryLimitReached(_) => {
            StatusCode::CONFLICT
        }
        ServiceError::SessionNotFound(_)
        | ServiceError::StudentNotFound(_)
        | ServiceError::LogNotFound(_) => StatusCode::NOT_FOUND,
        ServiceError::Validation(_) | ServiceError::UnknownPlaceholders(_) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        ServiceError::Database(_) | ServiceError::Json(_) | ServiceError::Mail(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}
