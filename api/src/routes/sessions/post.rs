use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use common::format_validation_errors;
use db::models::class_session::{Model as SessionModel, SessionTransition};
use tracing::warn;
use validator::Validate;

use crate::response::ApiResponse;
use crate::routes::common::status_for;
use crate::state::AppState;

use super::common::{CreateSessionReq, SessionResponse, TransitionResponse};

/// POST /api/sessions
pub async fn create_session(
    State(state): State<AppState>,
    Json(body): Json<CreateSessionReq>,
) -> (StatusCode, Json<ApiResponse<SessionResponse>>) {
    if let Err(errors) = body.validate() {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(ApiResponse::error(format_validation_errors(&errors))),
        );
    }

    match SessionModel::create(
        state.db(),
        body.class_id,
        &body.subject,
        &body.teacher_name,
        body.session_date,
        body.start_time,
        body.end_time,
        body.break_duration_minutes.unwrap_or(0),
        body.student_count.unwrap_or(0),
    )
    .await
    {
        Ok(session) => (
            StatusCode::CREATED,
            Json(ApiResponse::success(
                SessionResponse::from(session),
                "Session scheduled",
            )),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiResponse::error(format!(
                "Failed to schedule session: {e}"
            ))),
        ),
    }
}

/// Shared by every lifecycle endpoint: applies the transition, then hands the
/// committed event to the workflow engine. Engine failures do not undo the
/// transition; they only strip the report from the response.
async fn run_transition(
    state: AppState,
    session_id: i64,
    transition: SessionTransition,
) -> (StatusCode, Json<ApiResponse<TransitionResponse>>) {
    let (session, event) = match state.sessions().apply(session_id, transition).await {
        Ok(result) => result,
        Err(e) => {
            return (
                status_for(&e),
                Json(ApiResponse::error(format!("Transition rejected: {e}"))),
            );
        }
    };

    let workflows = match state.engine().handle_event(&event).await {
        Ok(report) => Some(report),
        Err(e) => {
            warn!(
                "Workflow fan-out failed for session {} ({}): {}",
                session_id, transition, e
            );
            None
        }
    };

    (
        StatusCode::OK,
        Json(ApiResponse::success(
            TransitionResponse {
                session: SessionResponse::from(session),
                workflows,
            },
            format!("Session {transition} accepted"),
        )),
    )
}

/// POST /api/sessions/{session_id}/start
pub async fn start_session(
    State(state): State<AppState>,
    Path(session_id): Path<i64>,
) -> (StatusCode, Json<ApiResponse<TransitionResponse>>) {
    run_transition(state, session_id, SessionTransition::Start).await
}

/// POST /api/sessions/{session_id}/break
pub async fn break_session(
    State(state): State<AppState>,
    Path(session_id): Path<i64>,
) -> (StatusCode, Json<ApiResponse<TransitionResponse>>) {
    run_transition(state, session_id, SessionTransition::Break).await
}

/// POST /api/sessions/{session_id}/resume
pub async fn resume_session(
    State(state): State<AppState>,
    Path(session_id): Path<i64>,
) -> (StatusCode, Json<ApiResponse<TransitionResponse>>) {
    run_transition(state, session_id, SessionTransition::Resume).await
}

/// POST /api/sessions/{session_id}/finish
pub async fn finish_session(
    State(state): State<AppState>,
    Path(session_id): Path<i64>,
) -> (StatusCode, Json<ApiResponse<TransitionResponse>>) {
    run_transition(state, session_id, SessionTransition::Finish).await
}

/// POST /api/sessions/{session_id}/cancel
pub async fn cancel_session(
    State(state): State<AppState>,
    Path(session_id): Path<i64>,
) -> (StatusCode, Json<ApiResponse<TransitionResponse>>) {
    run_transition(state, session_id, SessionTransition::Cancel).await
}
