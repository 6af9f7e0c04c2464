use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::agent::AgentProfile;
use crate::config::SessionConfig;
use crate::event::SessionEvent;
use crate::graph::CommunicationGraph;
use crate::runtime::ClassroomRuntime;
use crate::turn::Turn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    Classroom,
    Debate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Supervised,
    Unsupervised,
}

/// Turn-count and classroom-derived aggregate metrics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Metrics {
    pub turn_count: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avg_attentiveness: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avg_behavior: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avg_comprehension: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub engagement_pct: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clarity_pct: Option<f32>,
}

/// Root aggregate, owned exclusively by the Session Memory store for its
/// lifetime (create -> mutate -> discard). See spec.md §3.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub mode: Mode,
    pub channel: Channel,
    pub topic: String,
    pub config: SessionConfig,
    pub agents: Vec<AgentProfile>,
    pub turns: Vec<Turn>,
    pub events: Vec<SessionEvent>,
    pub metrics: Metrics,
    pub communication_graph: CommunicationGraph,
    pub classroom_runtime: Option<ClassroomRuntime>,
    pub supervisor_hint: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    pub fn teacher(&self) -> Option<&AgentProfile> {
        self.agents.iter().find(|a| a.is_teacher())
    }

    pub fn students(&self) -> impl Iterator<Item = &AgentProfile> {
        self.agents.iter().filter(|a| !a.is_teacher())
    }

    pub fn students_mut(&mut self) -> impl Iterator<Item = &mut AgentProfile> {
        self.agents.iter_mut().filter(|a| !a.is_teacher())
    }

    pub fn agent(&self, id: &str) -> Option<&AgentProfile> {
        self.agents.iter().find(|a| a.id == id)
    }

    pub fn agent_mut(&mut self, id: &str) -> Option<&mut AgentProfile> {
        self.agents.iter_mut().find(|a| a.id == id)
    }

    /// Invariant: `metrics.turnCount == turns.len()` after every mutation.
    pub fn sync_turn_count(&mut self) {
        self.metrics.turn_count = self.turns.len() as u64;
    }
}
