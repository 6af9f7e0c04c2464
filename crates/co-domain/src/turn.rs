use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    Teacher,
    User,
    Agent,
    System,
}

/// One immutable entry in a session's append-only transcript.
///
/// The only documented mutation is the tail rollback in
/// `co-orchestrator::pipeline` (spec.md §4.9.1 step 5/8), which removes a
/// turn only when it is still `turns.last()`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub id: String,
    pub session_id: String,
    pub role: TurnRole,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub metadata: HashMap<String, Value>,
}

impl Turn {
    pub fn new(
        session_id: &str,
        role: TurnRole,
        agent_id: Option<String>,
        content: impl Into<String>,
        request_turn_id: &str,
    ) -> Self {
        let mut metadata = HashMap::new();
        metadata.insert(
            "requestTurnId".to_string(),
            Value::String(request_turn_id.to_string()),
        );
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            session_id: session_id.to_string(),
            role,
            agent_id,
            content: content.into(),
            created_at: Utc::now(),
            metadata,
        }
    }

    pub fn with_meta(mut self, key: &str, value: Value) -> Self {
        self.metadata.insert(key.to_string(), value);
        self
    }
}
