use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use crate::response::ApiResponse;
use crate::routes::common::status_for;
use crate::state::AppState;

/// DELETE /api/sessions/{session_id}
///
/// Soft delete; legal only while the session is still `scheduled`.
pub async fn delete_session(
    State(state): State<AppState>,
    Path(session_id): Path<i64>,
) -> (StatusCode, Json<ApiResponse<()>>) {
    match state.sessions().delete_scheduled(session_id).await {
        Ok(()) => (
            StatusCode::OK,
            Json(ApiResponse::success((), "Session deleted")),
        ),
        Err(e) => (
            status_for(&e),
            Json(ApiResponse::error(format!("Delete rejected: {e}"))),
        ),
    }
}
