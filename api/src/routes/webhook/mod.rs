use axum::{routing::post, Router};

use crate::state::AppState;

mod post;

pub use post::receive_callback;

pub fn webhook_routes(app_state: AppState) -> Router<AppState> {
    Router::new()
        .route("/{token}", post(receive_callback))
        .with_state(app_state)
}
