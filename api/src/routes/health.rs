use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use db::models::connection_status;
use serde_json::{json, Value};

use crate::response::ApiResponse;
use crate::state::AppState;

pub fn health_routes() -> Router<AppState> {
    Router::new().route("/", get(health))
}

/// GET /api/health
///
/// Reports liveness plus the gateway device's last known state.
async fn health(State(state): State<AppState>) -> (StatusCode, Json<ApiResponse<Value>>) {
    let device = connection_status::Model::find_for_device(state.db(), state.device_id())
        .await
        .ok()
        .flatten();

    let payload = json!({
        "status": "ok",
        "device": device.map(|d| json!({
            "device_id": d.device_id,
            "state": d.state,
            "last_connected_at": d.last_connected_at,
            "quota_remaining": d.quota_remaining,
        })),
    });

    (
        StatusCode::OK,
        Json(ApiResponse::success(payload, "Healthy")),
    )
}
