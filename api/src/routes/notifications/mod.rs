use axum::{
    routing::{get, post},
    Router,
};

use crate::state::AppState;

mod common;
mod get;
mod post;

pub use common::NotificationLogResponse;
pub use get::list_logs;
pub use post::{resend_log, retry_sweep};

pub fn notification_routes(app_state: AppState) -> Router<AppState> {
    Router::new()
        .route("/logs", get(list_logs))
        .route("/logs/{log_id}/resend", post(resend_log))
        .route("/sweep", post(retry_sweep))
        .with_state(app_state)
}
