//! Student interaction planning (spec.md §4.9.9).

use co_domain::agent::AgentState;
use co_domain::graph::Relationship;

use crate::boredom::boredness;
use crate::roll::{roll_seed, stable_roll};

#[derive(Debug, Clone, PartialEq)]
pub enum InteractionPlan {
    Teacher,
    Peer { target_id: String },
    Silent,
}

pub struct InteractionOutcome {
    pub plan: InteractionPlan,
    pub delay_ms: u64,
    /// Only populated for the `Silent` plan: small direct decay applied
    /// immediately since no agent worker runs for this student this cycle.
    pub silent_deltas: Option<(f32, f32)>,
}

/// One candidate peer for peer-targeted interaction.
pub struct PeerCandidate {
    pub student_id: String,
    pub relationship: Relationship,
    pub averaged_edge_weight: f32,
    pub peer_engagement: f32,
}

fn relationship_multiplier(r: Relationship) -> f32 {
    match r {
        Relationship::Good => 1.25,
        Relationship::Neutral => 1.0,
        Relationship::Bad => 0.65,
    }
}

pub fn plan_interaction(
    state: &AgentState,
    off_task: bool,
    received_teacher_broadcast: bool,
    peers: &[PeerCandidate],
    session_id: &str,
    request_turn_id: &str,
    student_id: &str,
) -> InteractionOutcome {
    let bored = boredness(state.attentiveness, state.behavior);
    let fatigue = state.post_praise_fatigue_turns as f32;

    let mut teacher_w = 0.45 + state.attentiveness * 0.035 + state.comprehension * 0.02
        - bored * 0.03
        - fatigue * 0.01;
    if off_task {
        teacher_w *= 0.7;
    }

    let mut peer_w = 0.20 + state.behavior * 0.03 + state.attentiveness * 0.01 + (10.0 - fatigue) * 0.01;
    if off_task {
        peer_w += 0.16;
    }
    if received_teacher_broadcast {
        peer_w *= 0.35;
    }
    if bored <= 4.2 {
        peer_w += 0.12;
    }

    let mut silent_w = 0.12 + fatigue * 0.04 + (bored - 6.0).max(0.0) * 0.05;
    if state.attentiveness < 4.0 || state.behavior < 4.0 {
        silent_w += 0.12;
    }

    let teacher_w = teacher_w.max(0.0);
    let peer_w = peer_w.max(0.0);
    let silent_w = silent_w.max(0.0);
    let total = (teacher_w + peer_w + silent_w).max(1e-6);

    let roll = stable_roll(&roll_seed(session_id, request_turn_id, student_id, "interaction_plan")) as f32;
    let teacher_cut = teacher_w / total;
    let peer_cut = teacher_cut + peer_w / total;

    let plan = if roll < teacher_cut as f64 {
        InteractionPlan::Teacher
    } else if roll < peer_cut as f64 {
        if peers.is_empty() {
            InteractionPlan::Teacher
        } else {
            InteractionPlan::Peer {
                target_id: pick_peer(peers, session_id, request_turn_id, student_id),
            }
        }
    } else {
        InteractionPlan::Silent
    };

    let jitter = stable_roll(&roll_seed(session_id, request_turn_id, student_id, "interaction_delay")) as f32;
    let delay_ms = (120.0 + fatigue * 35.0 + bored * 18.0 + jitter * 180.0).clamp(120.0, 900.0) as u64;

    let silent_deltas = matches!(plan, InteractionPlan::Silent).then_some((-0.1, -0.05));

    InteractionOutcome {
        plan,
        delay_ms,
        silent_deltas,
    }
}

fn pick_peer(peers: &[PeerCandidate], session_id: &str, request_turn_id: &str, student_id: &str) -> String {
    let weights: Vec<f32> = peers
        .iter()
        .map(|p| {
            relationship_multiplier(p.relationship) * p.averaged_edge_weight.clamp(0.2, 2.0)
                * (0.5 + p.peer_engagement)
        })
        .collect();
    let total: f32 = weights.iter().sum::<f32>().max(1e-6);
    let roll = stable_roll(&roll_seed(session_id, request_turn_id, student_id, "peer_target")) as f32;
    let mut acc = 0.0;
    for (peer, w) in peers.iter().zip(weights.iter()) {
        acc += w / total;
        if roll < acc {
            return peer.student_id.clone();
        }
    }
    peers.last().unwrap().student_id.clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use co_domain::agent::AgentKind;

    #[test]
    fn deterministic_plan_for_same_seed() {
        let state = AgentState::new(AgentKind::Typical, Utc::now());
        let peers = vec![PeerCandidate {
            student_id: "student_agent_2".into(),
            relationship: Relationship::Good,
            averaged_edge_weight: 0.8,
            peer_engagement: 0.6,
        }];
        let a = plan_interaction(&state, false, false, &peers, "s1", "rt1", "student_agent_1");
        let b = plan_interaction(&state, false, false, &peers, "s1", "rt1", "student_agent_1");
        assert_eq!(a.plan, b.plan);
        assert_eq!(a.delay_ms, b.delay_ms);
    }

    #[test]
    fn delay_stays_within_bounds() {
        let state = AgentState::new(AgentKind::Typical, Utc::now());
        let outcome = plan_interaction(&state, true, false, &[], "s1", "rt2", "student_agent_3");
        assert!(outcome.delay_ms >= 120 && outcome.delay_ms <= 900);
    }
}
