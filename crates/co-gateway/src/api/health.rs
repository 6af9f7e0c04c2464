//! `GET /api/health` (spec.md §6).

use axum::extract::State;
use axum::response::{IntoResponse, Json};
use serde_json::json;

use crate::state::AppState;

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "ok": true,
        "uptime": state.started_at.elapsed().as_secs(),
    }))
}
