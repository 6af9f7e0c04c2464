//! `POST /api/sessions/:id/task-assignment` (spec.md §6).

use axum::extract::{Path, State};
use axum::response::{IntoResponse, Json};
use serde::Deserialize;

use co_domain::task::{TaskGroup, TaskMode};
use co_orchestrator::TaskAssignmentInput;

use crate::api::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct TaskAssignmentBody {
    pub mode: TaskMode,
    pub groups: Option<Vec<TaskGroup>>,
    /// Accepted for wire compatibility with spec.md §6's request shape;
    /// the orchestrator always auto-builds groups for `individual` mode
    /// and requires explicit groups otherwise (see `tasks.rs`), so this
    /// flag has no additional effect here.
    #[serde(default)]
    pub autonomous_grouping: bool,
}

pub async fn submit_task_assignment(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(body): Json<TaskAssignmentBody>,
) -> Result<impl IntoResponse, ApiError> {
    state.orchestrator.submit_task_assignment(
        &session_id,
        TaskAssignmentInput {
            mode: body.mode,
            groups: body.groups,
        },
    )?;

    Ok(Json(serde_json::json!({ "ok": true })))
}
