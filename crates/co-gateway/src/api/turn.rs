//! `POST /api/sessions/:id/turn` (spec.md §6).

use axum::extract::{Path, State};
use axum::response::{IntoResponse, Json};
use serde::Deserialize;

use co_domain::event::EventType;

use crate::api::error::ApiError;
use crate::realtime::RealtimeMessage;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ProcessTurnBody {
    pub message: String,
}

pub async fn process_turn(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(body): Json<ProcessTurnBody>,
) -> Result<impl IntoResponse, ApiError> {
    let out = state.orchestrator.process_turn(&session_id, &body.message).await?;

    state.realtime.publish(RealtimeMessage {
        session_id: session_id.clone(),
        event: "simulation.turn_processed".into(),
        payload: serde_json::json!({ "turnId": out.turn_id }),
    });
    state.realtime.publish(RealtimeMessage {
        session_id: session_id.clone(),
        event: "simulation.graph_updated".into(),
        payload: serde_json::to_value(&out.graph).unwrap_or_default(),
    });
    state.realtime.publish(RealtimeMessage {
        session_id: session_id.clone(),
        event: "simulation.student_states_updated".into(),
        payload: serde_json::to_value(&out.metrics).unwrap_or_default(),
    });
    if out.events.iter().any(|e| e.event_type == EventType::TaskAssignmentRequired) {
        state.realtime.publish(RealtimeMessage {
            session_id: session_id.clone(),
            event: "simulation.task_assignment_required".into(),
            payload: serde_json::json!({}),
        });
    }
    if let Some(latest_turn) = out.transcript.last() {
        state.realtime.publish(RealtimeMessage {
            session_id: session_id.clone(),
            event: "simulation.agent_turn_emitted".into(),
            payload: serde_json::to_value(latest_turn).unwrap_or_default(),
        });
    }

    Ok(Json(serde_json::json!({
        "turnId": out.turn_id,
        "transcript": out.transcript,
        "events": out.events,
        "metrics": out.metrics,
        "graph": out.graph,
    })))
}
