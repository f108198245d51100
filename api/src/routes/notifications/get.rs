use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use db::models::notification_log::{Column as LogCol, Entity as LogEntity};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, QueryOrder};
use serde::Deserialize;

use crate::response::ApiResponse;
use crate::state::AppState;

use super::common::NotificationLogResponse;

#[derive(Debug, Default, Deserialize)]
pub struct ListLogsQuery {
    pub session_id: Option<i64>,
    pub student_id: Option<i64>,
    pub status: Option<String>,
}

/// GET /api/notifications/logs
pub async fn list_logs(
    State(state): State<AppState>,
    Query(query): Query<ListLogsQuery>,
) -> (StatusCode, Json<ApiResponse<Vec<NotificationLogResponse>>>) {
    let mut select = LogEntity::find().order_by_desc(LogCol::Id);

    if let Some(session_id) = query.session_id {
        select = select.filter(LogCol::SessionId.eq(session_id));
    }
    if let Some(student_id) = query.student_id {
        select = select.filter(LogCol::StudentId.eq(student_id));
    }
    if let Some(status) = &query.status {
        select = select.filter(LogCol::Status.eq(status.as_str()));
    }

    match select.all(state.db()).await {
        Ok(logs) => (
            StatusCode::OK,
            Json(ApiResponse::success(
                logs.into_iter().map(NotificationLogResponse::from).collect(),
                "Notification logs retrieved",
            )),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiResponse::error(format!("Failed to list logs: {e}"))),
        ),
    }
}
