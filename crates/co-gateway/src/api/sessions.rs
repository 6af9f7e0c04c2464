//! `POST /api/sessions`, `GET /api/sessions/:id` (spec.md §6).

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use serde::Deserialize;

use co_domain::config::SessionConfig;
use co_domain::session::{Channel, Mode};
use co_orchestrator::{CreateSessionInput, SessionSummary};

use crate::api::error::ApiError;
use crate::realtime::RealtimeMessage;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateSessionBody {
    pub mode: Mode,
    #[serde(default = "default_channel")]
    pub channel: Channel,
    pub topic: String,
    pub classroom_id: Option<String>,
    pub config: Option<SessionConfig>,
}

fn default_channel() -> Channel {
    Channel::Unsupervised
}

pub async fn create_session(
    State(state): State<AppState>,
    Json(body): Json<CreateSessionBody>,
) -> Result<impl IntoResponse, ApiError> {
    let out = state
        .orchestrator
        .create_session(CreateSessionInput {
            mode: body.mode,
            channel: body.channel,
            topic: body.topic,
            classroom_id: body.classroom_id,
            config: body.config,
        })
        .await?;

    state.realtime.publish(RealtimeMessage {
        session_id: out.session_id.clone(),
        event: "simulation.session_created".into(),
        payload: serde_json::json!({
            "sessionId": out.session_id,
            "mode": out.mode,
            "channel": out.channel,
        }),
    });

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "sessionId": out.session_id,
            "mode": out.mode,
            "channel": out.channel,
        })),
    ))
}

pub async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<SessionSummary>, ApiError> {
    let summary = state.orchestrator.get_session_summary(&session_id)?;
    Ok(Json(summary))
}
