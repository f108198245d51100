use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::Value;
use tracing::warn;

use crate::response::ApiResponse;
use crate::state::AppState;

/// POST /api/webhook/{token}
///
/// Inbound gateway callbacks. A wrong token is the only rejection; once the
/// token matches, the endpoint always acknowledges so the provider never
/// retry-storms on processing hiccups.
pub async fn receive_callback(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Json(payload): Json<Value>,
) -> (StatusCode, Json<ApiResponse<Value>>) {
    if token != state.webhook_token() {
        warn!("Webhook call with unknown token rejected");
        return (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::error("Unknown webhook endpoint")),
        );
    }

    let outcome = state.webhook().ingest(payload).await;

    (
        StatusCode::OK,
        Json(ApiResponse::success(
            serde_json::json!({ "outcome": outcome }),
            "Callback received",
        )),
    )
}
