//! Communication graph operations (spec.md §4.3).
//!
//! Nodes, directed edges with relationship+weight, and per-turn
//! activations. All mutation funnels through [`activate_communication_edge`]
//! so the "exactly one edge per (from,to,interaction-class)" invariant and
//! the weight-reinforcement bound hold everywhere.

use chrono::Utc;

use co_domain::agent::AgentProfile;
use co_domain::config::RelationshipOverride;
use co_domain::graph::{
    ActionType, ActivationPayload, CommunicationActivation, CommunicationGraph, GraphEdge,
    GraphNode, InteractionClass, Relationship, ACTIVATION_WEIGHT_DELTA, DEFAULT_EDGE_WEIGHT,
    MAX_EDGE_WEIGHT, MIN_EDGE_WEIGHT,
};
use co_domain::session::Mode;

/// Build the initial graph for a newly created session.
///
/// Classroom mode: one node per agent (teacher + students), with edges for
/// every `teacher<->student` pair and every ordered `student<->student`
/// pair (needed by the peer-interaction planning in spec.md §4.9.9).
/// Debate mode: teacher + the single `user` node, teacher<->user edges only.
pub fn create_session_communication_graph(
    mode: Mode,
    agents: &[AgentProfile],
    relationship_overrides: &[RelationshipOverride],
) -> CommunicationGraph {
    let nodes: Vec<GraphNode> = agents
        .iter()
        .map(|a| GraphNode {
            id: a.id.clone(),
            display_name: a.display_name.clone(),
        })
        .collect();

    let mut edges = Vec::new();
    let teacher_id = agents
        .iter()
        .find(|a| a.is_teacher())
        .map(|a| a.id.clone());
    let student_ids: Vec<&str> = agents
        .iter()
        .filter(|a| !a.is_teacher())
        .map(|a| a.id.as_str())
        .collect();

    if let Some(teacher_id) = teacher_id {
        for sid in &student_ids {
            edges.push(make_edge(
                &teacher_id,
                sid,
                InteractionClass::TeacherToStudent,
                relationship_overrides,
            ));
            edges.push(make_edge(
                sid,
                &teacher_id,
                InteractionClass::StudentToTeacher,
                relationship_overrides,
            ));
        }
    }

    if mode == Mode::Classroom {
        for &a in &student_ids {
            for &b in &student_ids {
                if a != b {
                    edges.push(make_edge(
                        a,
                        b,
                        InteractionClass::StudentToStudent,
                        relationship_overrides,
                    ));
                }
            }
        }
    }

    CommunicationGraph {
        nodes,
        edges,
        activations: Vec::new(),
        current_turn_activations: Vec::new(),
    }
}

fn make_edge(
    from: &str,
    to: &str,
    class: InteractionClass,
    overrides: &[RelationshipOverride],
) -> GraphEdge {
    let relationship = overrides
        .iter()
        .find(|o| o.from == from && o.to == to)
        .map(|o| o.relationship)
        .unwrap_or(Relationship::Neutral);

    let allowed = match class {
        InteractionClass::TeacherToStudent => vec![
            ActionType::TeacherBroadcast,
            ActionType::TeacherToStudent,
            ActionType::TeacherQuestion,
            ActionType::TeacherPraise,
            ActionType::TaskFeedback,
        ],
        InteractionClass::StudentToTeacher => vec![ActionType::StudentToTeacher],
        InteractionClass::StudentToStudent => vec![ActionType::StudentToStudent],
    };

    GraphEdge {
        from: from.to_string(),
        to: to.to_string(),
        interaction_class: class,
        relationship,
        weight: DEFAULT_EDGE_WEIGHT,
        allowed_interaction_types: allowed,
        current_turn_active: false,
        activation_count: 0,
        last_activated_at: None,
    }
}

/// Clear `currentTurnActive` on every edge and empty
/// `currentTurnActivations`. Called exactly once at the start of a request
/// turn (spec.md §4.9.1 step 1).
pub fn reset_current_turn_edge_activity(graph: &mut CommunicationGraph) {
    for edge in &mut graph.edges {
        edge.current_turn_active = false;
    }
    graph.current_turn_activations.clear();
}

pub struct ActivateEdgeInput<'a> {
    pub turn_id: &'a str,
    pub from: &'a str,
    pub to: &'a str,
    pub action_type: ActionType,
    pub payload: Option<ActivationPayload>,
}

/// Activate an edge for this turn: create it if absent, append the
/// activation, mark it active, bump its activation count, and reinforce
/// its weight by a small bounded delta (spec.md §4.3).
pub fn activate_communication_edge(
    graph: &mut CommunicationGraph,
    input: ActivateEdgeInput<'_>,
) -> CommunicationActivation {
    let class = input.action_type.interaction_class();

    if graph.find_edge(input.from, input.to, class).is_none() {
        graph
            .edges
            .push(make_edge(input.from, input.to, class, &[]));
    }

    let now = Utc::now();
    let edge = graph
        .find_edge_mut(input.from, input.to, class)
        .expect("edge created above");
    edge.current_turn_active = true;
    edge.activation_count += 1;
    edge.last_activated_at = Some(now);
    edge.weight = (edge.weight + ACTIVATION_WEIGHT_DELTA).clamp(MIN_EDGE_WEIGHT, MAX_EDGE_WEIGHT);

    let activation = CommunicationActivation {
        id: uuid::Uuid::new_v4().to_string(),
        turn_id: input.turn_id.to_string(),
        from: input.from.to_string(),
        to: input.to.to_string(),
        action_type: input.action_type,
        payload: input.payload,
        at: now,
    };

    graph.activations.push(activation.clone());
    graph.current_turn_activations.push(activation.clone());
    activation
}

/// Top `n` edges touching any of `node_ids` (either endpoint), ordered by
/// weight descending. Used to build the teacher's "graph relationship
/// signals" prompt section (spec.md §4.9.2).
pub fn top_edges_by_weight<'g>(
    graph: &'g CommunicationGraph,
    node_ids: &[&str],
    n: usize,
) -> Vec<&'g GraphEdge> {
    let mut matching: Vec<&GraphEdge> = graph
        .edges
        .iter()
        .filter(|e| node_ids.contains(&e.from.as_str()) || node_ids.contains(&e.to.as_str()))
        .collect();
    matching.sort_by(|a, b| b.weight.partial_cmp(&a.weight).unwrap_or(std::cmp::Ordering::Equal));
    matching.truncate(n);
    matching
}

/// All activations directed *to* `to_id` within the current turn.
pub fn activations_to<'g>(
    graph: &'g CommunicationGraph,
    to_id: &str,
) -> Vec<&'g CommunicationActivation> {
    graph
        .current_turn_activations
        .iter()
        .filter(|a| a.to == to_id)
        .collect()
}

/// The averaged edge weight between two nodes across both directions
/// (used by peer-target weighting in spec.md §4.9.9). Falls back to the
/// default weight when neither edge exists yet.
pub fn averaged_edge_weight(graph: &CommunicationGraph, a: &str, b: &str) -> f32 {
    let ab = graph.find_edge(a, b, co_domain::graph::InteractionClass::StudentToStudent);
    let ba = graph.find_edge(b, a, co_domain::graph::InteractionClass::StudentToStudent);
    match (ab, ba) {
        (Some(x), Some(y)) => (x.weight + y.weight) / 2.0,
        (Some(x), None) => x.weight,
        (None, Some(y)) => y.weight,
        (None, None) => DEFAULT_EDGE_WEIGHT,
    }
}

/// The relationship label on the `a -> b` student-to-student edge, if any.
pub fn relationship_between(graph: &CommunicationGraph, a: &str, b: &str) -> Relationship {
    graph
        .find_edge(a, b, co_domain::graph::InteractionClass::StudentToStudent)
        .map(|e| e.relationship)
        .unwrap_or(Relationship::Neutral)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use co_domain::agent::{AgentKind, AgentProfile};

    fn agents() -> Vec<AgentProfile> {
        let now = Utc::now();
        vec![
            AgentProfile::teacher(now),
            AgentProfile::student("1", AgentKind::Typical, "Alice", now),
            AgentProfile::student("2", AgentKind::Adhd, "Bob", now),
        ]
    }

    #[test]
    fn creates_expected_edge_count() {
        let graph = create_session_communication_graph(Mode::Classroom, &agents(), &[]);
        // teacher<->2 students (4 edges) + 2 student<->student directed edges.
        assert_eq!(graph.edges.len(), 6);
    }

    #[test]
    fn reset_clears_activity() {
        let mut graph = create_session_communication_graph(Mode::Classroom, &agents(), &[]);
        activate_communication_edge(
            &mut graph,
            ActivateEdgeInput {
                turn_id: "t1",
                from: "teacher",
                to: "student_agent_1",
                action_type: ActionType::TeacherBroadcast,
                payload: None,
            },
        );
        assert!(graph.edges.iter().any(|e| e.current_turn_active));
        reset_current_turn_edge_activity(&mut graph);
        assert!(graph.edges.iter().all(|e| !e.current_turn_active));
        assert!(graph.current_turn_activations.is_empty());
    }

    #[test]
    fn activation_reinforces_weight_within_bounds() {
        let mut graph = create_session_communication_graph(Mode::Classroom, &agents(), &[]);
        for _ in 0..200 {
            activate_communication_edge(
                &mut graph,
                ActivateEdgeInput {
                    turn_id: "t1",
                    from: "teacher",
                    to: "student_agent_1",
                    action_type: ActionType::TeacherBroadcast,
                    payload: None,
                },
            );
        }
        let edge = graph
            .find_edge(
                "teacher",
                "student_agent_1",
                InteractionClass::TeacherToStudent,
            )
            .unwrap();
        assert!(edge.weight <= MAX_EDGE_WEIGHT);
    }
}
