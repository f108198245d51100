use db::models::class_session::SessionStatus;
use sea_orm::DbErr;

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Errors surfaced by the notification core.
///
/// Gateway transport failures never appear here from dispatch paths; they are
/// recorded on the affected log rows instead so bulk operations keep making
/// progress. `NoEligibleContact` and duplicate suppression are result values,
/// not errors.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("cannot {action} a {from} session")]
    InvalidTransition {
        from: SessionStatus,
        action: String,
    },

    #[error("session {0} not found")]
    SessionNotFound(i64),

    #[error("student {0} not found")]
    StudentNotFound(i64),

    #[error("notification log {0} not found")]
    LogNotFound(i64),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("template contains unknown placeholders: {0:?}")]
    UnknownPlaceholders(Vec<String>),

    #[error("retry limit reached for notification log {0}")]
    RetryLimitReached(i64),

    #[error("database error: {0}")]
    Database(#[from] DbErr),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("mail error: {0}")]
    Mail(String),
}
