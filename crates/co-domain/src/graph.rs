//! Communication-graph data model. Operations over these types live in
//! `co-graph`; this module only defines the shape (spec.md §3, §4.3).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

pub const MIN_EDGE_WEIGHT: f32 = 0.2;
pub const MAX_EDGE_WEIGHT: f32 = 2.0;
pub const DEFAULT_EDGE_WEIGHT: f32 = 0.6;
/// Per-activation weight reinforcement, clamped to stay within bounds.
pub const ACTIVATION_WEIGHT_DELTA: f32 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Relationship {
    Good,
    Neutral,
    Bad,
}

/// Coarse classification of an edge's allowed interaction types, used to
/// key the "exactly one edge per (from,to,interactionType-class)" invariant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionClass {
    TeacherToStudent,
    StudentToTeacher,
    StudentToStudent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    TeacherBroadcast,
    TeacherToStudent,
    TeacherQuestion,
    TeacherPraise,
    TaskFeedback,
    StudentToStudent,
    StudentToTeacher,
}

impl ActionType {
    pub fn interaction_class(self) -> InteractionClass {
        use ActionType::*;
        match self {
            TeacherBroadcast | TeacherToStudent | TeacherQuestion | TeacherPraise
            | TaskFeedback => InteractionClass::TeacherToStudent,
            StudentToTeacher => InteractionClass::StudentToTeacher,
            StudentToStudent => InteractionClass::StudentToStudent,
        }
    }
}

/// A node in the graph — one participant (teacher, student, or the single
/// `user` node in debate mode).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: String,
    pub display_name: String,
}

/// Directed edge `from -> to` for a given interaction class.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphEdge {
    pub from: String,
    pub to: String,
    pub interaction_class: InteractionClass,
    pub relationship: Relationship,
    pub weight: f32,
    pub allowed_interaction_types: Vec<ActionType>,
    pub current_turn_active: bool,
    pub activation_count: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_activated_at: Option<DateTime<Utc>>,
}

impl GraphEdge {
    pub fn key(&self) -> (String, String, InteractionClass) {
        (self.from.clone(), self.to.clone(), self.interaction_class)
    }
}

/// A payload attached to an activation. The six named kinds from spec.md
/// §9 are modeled explicitly; `Free` is the documented escape hatch for
/// anything else.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum ActivationPayload {
    #[serde(rename = "teacher_broadcast")]
    TeacherBroadcast { text: String },
    #[serde(rename = "teacher_to_student")]
    TeacherToStudent { text: String },
    #[serde(rename = "teacher_praise")]
    TeacherPraise { text: String },
    #[serde(rename = "task_feedback")]
    TaskFeedback { text: String, solved: bool },
    #[serde(rename = "student_to_student")]
    StudentToStudent { text: String },
    #[serde(rename = "student_to_teacher")]
    StudentToTeacher { text: String },
    #[serde(rename = "free")]
    Free {
        #[serde(flatten)]
        fields: HashMap<String, Value>,
    },
}

impl ActivationPayload {
    /// Text content used for student "stimulus" assembly (spec.md §4.9.3).
    pub fn text(&self) -> Option<&str> {
        match self {
            ActivationPayload::TeacherBroadcast { text }
            | ActivationPayload::TeacherToStudent { text }
            | ActivationPayload::TeacherPraise { text }
            | ActivationPayload::TaskFeedback { text, .. }
            | ActivationPayload::StudentToStudent { text }
            | ActivationPayload::StudentToTeacher { text } => Some(text),
            ActivationPayload::Free { fields } => fields.get("text").and_then(|v| v.as_str()),
        }
    }

    /// `true` when this activation is a low-confidence "overhear" channel
    /// per spec.md §4.3 ("any payload with confidence:"low" or
    /// phase:"clarification_overhear" is a low-confidence activation").
    pub fn is_low_confidence(&self) -> bool {
        if let ActivationPayload::Free { fields } = self {
            let conf_low = fields
                .get("confidence")
                .and_then(|v| v.as_str())
                .map(|s| s == "low")
                .unwrap_or(false);
            let overhear_phase = fields
                .get("phase")
                .and_then(|v| v.as_str())
                .map(|s| s == "clarification_overhear")
                .unwrap_or(false);
            conf_low || overhear_phase
        } else {
            false
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommunicationActivation {
    pub id: String,
    pub turn_id: String,
    pub from: String,
    pub to: String,
    pub action_type: ActionType,
    pub payload: Option<ActivationPayload>,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommunicationGraph {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
    pub activations: Vec<CommunicationActivation>,
    /// Reset at the start of every request turn by
    /// `reset_current_turn_edge_activity`.
    pub current_turn_activations: Vec<CommunicationActivation>,
}

impl CommunicationGraph {
    pub fn find_edge(
        &self,
        from: &str,
        to: &str,
        class: InteractionClass,
    ) -> Option<&GraphEdge> {
        self.edges
            .iter()
            .find(|e| e.from == from && e.to == to && e.interaction_class == class)
    }

    pub fn find_edge_mut(
        &mut self,
        from: &str,
        to: &str,
        class: InteractionClass,
    ) -> Option<&mut GraphEdge> {
        self.edges
            .iter_mut()
            .find(|e| e.from == from && e.to == to && e.interaction_class == class)
    }
}
