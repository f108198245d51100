use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use db::models::class_session::{Column as SessionCol, Entity as SessionEntity};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, QueryOrder};
use serde::Deserialize;

use crate::response::ApiResponse;
use crate::state::AppState;

use super::common::SessionResponse;

#[derive(Debug, Default, Deserialize)]
pub struct ListSessionsQuery {
    pub class_id: Option<i64>,
    pub status: Option<String>,
}

/// GET /api/sessions
pub async fn list_sessions(
    State(state): State<AppState>,
    Query(query): Query<ListSessionsQuery>,
) -> (StatusCode, Json<ApiResponse<Vec<SessionResponse>>>) {
    let mut select = SessionEntity::find()
        .filter(SessionCol::DeletedAt.is_null())
        .order_by_desc(SessionCol::SessionDate)
        .order_by_asc(SessionCol::StartTime);

    if let Some(class_id) = query.class_id {
        select = select.filter(SessionCol::ClassId.eq(class_id));
    }
    if let Some(status) = &query.status {
        select = select.filter(SessionCol::Status.eq(status.as_str()));
    }

    match select.all(state.db()).await {
        Ok(sessions) => (
            StatusCode::OK,
            Json(ApiResponse::success(
                sessions.into_iter().map(SessionResponse::from).collect(),
                "Sessions retrieved",
            )),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiResponse::error(format!("Failed to list sessions: {e}"))),
        ),
    }
}

/// GET /api/sessions/{session_id}
pub async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<i64>,
) -> (StatusCode, Json<ApiResponse<SessionResponse>>) {
    match SessionEntity::find_by_id(session_id).one(state.db()).await {
        Ok(Some(session)) if session.deleted_at.is_none() => (
            StatusCode::OK,
            Json(ApiResponse::success(
                SessionResponse::from(session),
                "Session retrieved",
            )),
        ),
        Ok(_) => (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::error("Session not found")),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiResponse::error(format!("Failed to load session: {e}"))),
        ),
    }
}
