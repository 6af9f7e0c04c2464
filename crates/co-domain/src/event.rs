use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Closed enum of session event types, per spec.md §3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    SessionCreated,
    TurnReceived,
    AgentStarted,
    AgentToken,
    AgentDone,
    SafetyNotice,
    GraphEdgeActivated,
    SupervisorHintReceived,
    SupervisorHintApplied,
    TaskAssignmentRequired,
    TaskAssignmentSubmitted,
    TaskReviewCompleted,
    InteractiveBoardModeChanged,
    SessionCompleted,
    ScoreUpdate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionEvent {
    pub id: String,
    pub session_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub turn_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub payload: HashMap<String, Value>,
    pub created_at: DateTime<Utc>,
}

impl SessionEvent {
    pub fn new(session_id: &str, event_type: EventType) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            session_id: session_id.to_string(),
            turn_id: None,
            agent_id: None,
            event_type,
            payload: HashMap::new(),
            created_at: Utc::now(),
        }
    }

    pub fn with_turn(mut self, turn_id: impl Into<String>) -> Self {
        self.turn_id = Some(turn_id.into());
        self
    }

    pub fn with_agent(mut self, agent_id: impl Into<String>) -> Self {
        self.agent_id = Some(agent_id.into());
        self
    }

    pub fn with_payload(mut self, key: &str, value: Value) -> Self {
        self.payload.insert(key.to_string(), value);
        self
    }
}
