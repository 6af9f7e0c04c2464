//! Live-action model (spec.md §4.9.7).
//!
//! Run synchronously by the orchestrator thread before the parallel
//! fan-out (pipeline step 10) — there is no concurrent access to student
//! state at this point, so results are applied directly rather than
//! threaded through a `StatePatch`.

use chrono::Utc;

use co_domain::agent::{AgentKind, AgentState, LiveAction, LiveActionKind, Severity};
use co_domain::runtime::Phase;

use crate::roll::{roll_seed, stable_roll};

const ON_TASK_TEMPLATES: &[(&str, &str)] = &[
    ("listening", "listening attentively"),
    ("note_taking", "taking notes"),
    ("task_focus", "focused on the task"),
    ("peer_support", "helping a classmate"),
];

const OFF_TASK_TEMPLATES: &[(&str, &str)] = &[
    ("pen_clicking", "clicking a pen"),
    ("looking_out_window", "looking out the window"),
    ("playing_with_object", "fidgeting with an object"),
    ("desk_doodling", "doodling on the desk"),
    ("side_talking", "chatting with a neighbor"),
];

pub struct LiveActionOutcome {
    pub live_action: LiveAction,
    pub off_task: bool,
    pub behavior_alert: bool,
    pub distraction_streak: u8,
}

fn distraction_score(state: &AgentState) -> f32 {
    ((10.0 - state.attentiveness) * 0.5
        + (10.0 - state.behavior) * 0.35
        + (10.0 - state.comprehension) * 0.15)
        .clamp(0.0, 10.0)
}

fn phase_adjustment(phase: Phase) -> f32 {
    match phase {
        Phase::Lecture => 0.06,
        Phase::Practice => 0.03,
        Phase::Review => -0.01,
    }
}

/// Resolves this turn's live action for one student and returns the state
/// deltas to apply (the caller applies them and clamps).
pub fn resolve_live_action(
    state: &AgentState,
    session_id: &str,
    request_turn_id: &str,
    student_id: &str,
    phase: Phase,
    board_active: bool,
) -> (LiveActionOutcome, f32, f32) {
    let score = distraction_score(state);
    let post_praise_penalty = if state.post_praise_fatigue_turns > 0 { -0.05 } else { 0.0 };
    let board_adj = if board_active { -0.14 } else { 0.0 };
    let p_offtask = (0.1 + score * 0.07 + phase_adjustment(phase) + board_adj + post_praise_penalty)
        .clamp(0.05, 0.9);

    let roll = stable_roll(&roll_seed(session_id, request_turn_id, student_id, "live_action"));
    let off_task = roll < p_offtask as f64;

    let template_roll = stable_roll(&roll_seed(session_id, request_turn_id, student_id, "live_action_template"));
    let templates = if off_task { OFF_TASK_TEMPLATES } else { ON_TASK_TEMPLATES };
    let idx = ((template_roll * templates.len() as f64) as usize).min(templates.len() - 1);
    let (code, label) = templates[idx];

    let profile_adj: i32 = if matches!(state.profile, AgentKind::Adhd) { -1 } else { 0 };
    let score_adj: i32 = if score >= 7.0 { -1 } else { 0 };
    let threshold = (3 + profile_adj + score_adj).clamp(2, 4) as u8;

    let prev = state.distraction_streak as i32;
    let pre_reset = (prev + if off_task { 1 } else { -1 }).clamp(0, 6) as u8;

    let (behavior_alert, distraction_streak) = if off_task && pre_reset >= threshold {
        (true, 0u8)
    } else {
        (false, pre_reset)
    };

    let attentiveness_delta = if off_task {
        -(0.2 + score * 0.05)
    } else if board_active {
        0.12 + 0.08
    } else {
        0.12
    };
    let behavior_delta = attentiveness_delta;

    let severity = if behavior_alert {
        Severity::Danger
    } else if off_task {
        Severity::Warning
    } else {
        Severity::Success
    };

    let live_action = LiveAction {
        code: code.to_string(),
        kind: if off_task { LiveActionKind::OffTask } else { LiveActionKind::OnTask },
        label: label.to_string(),
        severity,
        at: Utc::now(),
    };

    (
        LiveActionOutcome {
            live_action,
            off_task,
            behavior_alert,
            distraction_streak,
        },
        attentiveness_delta,
        behavior_delta,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic_for_same_seed() {
        let state = AgentState::new(AgentKind::Typical, Utc::now());
        let (a, ad1, bd1) = resolve_live_action(&state, "s1", "rt1", "student_agent_1", Phase::Lecture, false);
        let (b, ad2, bd2) = resolve_live_action(&state, "s1", "rt1", "student_agent_1", Phase::Lecture, false);
        assert_eq!(a.off_task, b.off_task);
        assert_eq!(a.live_action.code, b.live_action.code);
        assert_eq!(ad1, ad2);
        assert_eq!(bd1, bd2);
    }

    #[test]
    fn streak_resets_on_alert() {
        let mut state = AgentState::new(AgentKind::Typical, Utc::now());
        state.distraction_streak = 6;
        state.attentiveness = 1.0;
        state.behavior = 1.0;
        state.comprehension = 1.0;
        let (outcome, _, _) = resolve_live_action(&state, "s1", "rt1", "student_agent_9", Phase::Practice, false);
        if outcome.off_task {
            assert!(outcome.behavior_alert);
            assert_eq!(outcome.distraction_streak, 0);
        }
    }
}
