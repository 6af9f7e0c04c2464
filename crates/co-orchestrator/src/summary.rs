//! `getSessionSummary` read projection (spec.md §4.9 public operation 2).

use serde::{Deserialize, Serialize};

use co_domain::graph::CommunicationGraph;
use co_domain::runtime::ClassroomRuntime;
use co_domain::session::{Channel, Metrics, Mode, Session};
use co_domain::turn::Turn;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub id: String,
    pub mode: Mode,
    pub channel: Channel,
    pub topic: String,
    pub turns: Vec<Turn>,
    pub metrics: Metrics,
    pub communication_graph: CommunicationGraph,
    pub classroom_runtime: Option<ClassroomRuntime>,
}

/// Projects a `Session` to its summary shape: last 8 turns, current
/// metrics, graph, and runtime.
pub fn project_session_summary(session: &Session) -> SessionSummary {
    let start = session.turns.len().saturating_sub(8);
    SessionSummary {
        id: session.id.clone(),
        mode: session.mode,
        channel: session.channel,
        topic: session.topic.clone(),
        turns: session.turns[start..].to_vec(),
        metrics: session.metrics.clone(),
        communication_graph: session.communication_graph.clone(),
        classroom_runtime: session.classroom_runtime.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use co_domain::agent::AgentProfile;
    use co_domain::config::SessionConfig;
    use co_domain::turn::TurnRole;

    #[test]
    fn keeps_only_last_eight_turns() {
        let now = Utc::now();
        let mut session = Session {
            id: "s1".into(),
            mode: Mode::Classroom,
            channel: Channel::Unsupervised,
            topic: "Fractions".into(),
            config: SessionConfig::default(),
            agents: vec![AgentProfile::teacher(now)],
            turns: vec![],
            events: vec![],
            metrics: Metrics::default(),
            communication_graph: CommunicationGraph {
                nodes: vec![],
                edges: vec![],
                activations: vec![],
                current_turn_activations: vec![],
            },
            classroom_runtime: None,
            supervisor_hint: None,
            created_at: now,
            updated_at: now,
        };
        for i in 0..12 {
            session.turns.push(Turn::new("s1", TurnRole::Teacher, None, format!("turn {i}"), "rt"));
        }
        let summary = project_session_summary(&session);
        assert_eq!(summary.turns.len(), 8);
        assert_eq!(summary.turns[0].content, "turn 4");
    }
}
