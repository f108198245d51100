use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use services::dispatcher::RetrySweepSummary;

use crate::response::ApiResponse;
use crate::routes::common::status_for;
use crate::state::AppState;

use super::common::NotificationLogResponse;

/// POST /api/notifications/logs/{log_id}/resend
pub async fn resend_log(
    State(state): State<AppState>,
    Path(log_id): Path<i64>,
) -> (StatusCode, Json<ApiResponse<NotificationLogResponse>>) {
    match state.dispatcher().resend(log_id).await {
        Ok(log) => (
            StatusCode::OK,
            Json(ApiResponse::success(
                NotificationLogResponse::from(log),
                "Resend attempted",
            )),
        ),
        Err(e) => (
            status_for(&e),
            Json(ApiResponse::error(format!("Resend rejected: {e}"))),
        ),
    }
}

/// POST /api/notifications/sweep
///
/// Retries every failed row still under the retry limit.
pub async fn retry_sweep(
    State(state): State<AppState>,
) -> (StatusCode, Json<ApiResponse<Value>>) {
    match state.dispatcher().retry_sweep().await {
        Ok(RetrySweepSummary {
            attempted,
            recovered,
            still_failed,
        }) => (
            StatusCode::OK,
            Json(ApiResponse::success(
                json!({
                    "attempted": attempted,
                    "recovered": recovered,
                    "still_failed": still_failed,
                }),
                "Retry sweep completed",
            )),
        ),
        Err(e) => (
            status_for(&e),
            Json(ApiResponse::error(format!("Retry sweep failed: {e}"))),
        ),
    }
}
