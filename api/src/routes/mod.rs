//! HTTP route entry point for `/api/...`.
//!
//! Route groups:
//! - `/health` → liveness plus last known gateway device state
//! - `/sessions` → session CRUD-while-scheduled and lifecycle transitions
//! - `/notifications` → delivery log listing, resend, retry sweep
//! - `/webhook/{token}` → inbound gateway callbacks

use axum::Router;

use crate::state::AppState;

pub mod common;
pub mod health;
pub mod notifications;
pub mod sessions;
pub mod webhook;

pub fn routes(app_state: AppState) -> Router<AppState> {
    Router::new()
        .nest("/health", health::health_routes())
        .nest("/sessions", sessions::session_routes(app_state.clone()))
        .nest(
            "/notifications",
            notifications::notification_routes(app_state.clone()),
        )
        .nest("/webhook", webhook::webhook_routes(app_state))
}
