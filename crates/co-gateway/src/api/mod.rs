//! Route table (spec.md §6).

pub mod error;
pub mod health;
pub mod sessions;
pub mod task_assignment;
pub mod turn;

use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/sessions", post(sessions::create_session))
        .route("/sessions/:id", get(sessions::get_session))
        .route("/sessions/:id/turn", post(turn::process_turn))
        .route(
            "/sessions/:id/task-assignment",
            post(task_assignment::submit_task_assignment),
        )
        .with_state(state)
}
