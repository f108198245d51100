use axum::{
    routing::{delete, get, post, put},
    Router,
};

use crate::state::AppState;

mod common;
mod delete;
mod get;
mod post;
mod put;

pub use common::{CreateSessionReq, SessionResponse, TransitionResponse, UpdateSessionReq};
pub use delete::delete_session;
pub use get::{get_session, list_sessions};
pub use post::{
    break_session, cancel_session, create_session, finish_session, resume_session, start_session,
};
pub use put::edit_session;

pub fn session_routes(app_state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", post(create_session))
        .route("/", get(list_sessions))
        .route("/{session_id}", get(get_session))
        .route("/{session_id}", put(edit_session))
        .route("/{session_id}", delete(delete_session))
        .route("/{session_id}/start", post(start_session))
        .route("/{session_id}/break", post(break_session))
        .route("/{session_id}/resume", post(resume_session))
        .route("/{session_id}/finish", post(finish_session))
        .route("/{session_id}/cancel", post(cancel_session))
        .with_state(app_state)
}
