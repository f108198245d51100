use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use services::session::SessionEdit;

use crate::response::ApiResponse;
use crate::routes::common::status_for;
use crate::state::AppState;

use super::common::{SessionResponse, UpdateSessionReq};

/// PUT /api/sessions/{session_id}
///
/// Editing is legal only while the session is still `scheduled`.
pub async fn edit_session(
    State(state): State<AppState>,
    Path(session_id): Path<i64>,
    Json(body): Json<UpdateSessionReq>,
) -> (StatusCode, Json<ApiResponse<SessionResponse>>) {
    let edit = SessionEdit {
        subject: body.subject,
        teacher_name: body.teacher_name,
        session_date: body.session_date,
        start_time: body.start_time,
        end_time: body.end_time,
        break_duration_minutes: body.break_duration_minutes,
        student_count: body.student_count,
    };

    match state.sessions().update_scheduled(session_id, edit).await {
        Ok(session) => (
            StatusCode::OK,
            Json(ApiResponse::success(
                SessionResponse::from(session),
                "Session updated",
            )),
        ),
        Err(e) => (
            status_for(&e),
            Json(ApiResponse::error(format!("Update rejected: {e}"))),
        ),
    }
}
