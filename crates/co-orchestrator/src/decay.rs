//! Natural per-turn state decay (spec.md §4.9.5).

use co_domain::agent::AgentState;

use crate::boredom::boredness;
use crate::roll::{roll_seed, stable_roll};

/// `phaseMult ∈ {1.00, 1.10, 1.18}` by phase.
fn phase_multiplier(phase: co_domain::runtime::Phase) -> f32 {
    use co_domain::runtime::Phase::*;
    match phase {
        Lecture => 1.00,
        Practice => 1.10,
        Review => 1.18,
    }
}

pub struct DecayContext<'a> {
    pub session_id: &'a str,
    pub request_turn_id: &'a str,
    pub student_id: &'a str,
    pub lesson_turn: u32,
    pub total_turns: u32,
    pub phase: co_domain::runtime::Phase,
    pub board_active: bool,
}

/// Applies one turn of natural decay to `state` in place, per the three
/// formulas in spec.md §4.9.5, then decrements the post-praise fatigue
/// counters.
pub fn apply_natural_decay(state: &mut AgentState, ctx: &DecayContext<'_>) {
    let progress = ctx.lesson_turn as f32 / ctx.total_turns.max(1) as f32;
    let phase_mult = phase_multiplier(ctx.phase);
    let board_mitigation = if ctx.board_active { 0.08 } else { 0.0 };
    let post_praise_mult = if state.post_praise_fatigue_turns > 0 {
        1.0 + state.post_praise_decay_boost + 0.22
    } else {
        1.0
    };
    let fatigue_norm = state.post_praise_fatigue_turns as f32 / 8.0;
    let bored_norm = boredness(state.attentiveness, state.behavior) / 10.0;

    let r1 = stable_roll(&roll_seed(ctx.session_id, ctx.request_turn_id, ctx.student_id, "attention")) as f32;
    let r2 = stable_roll(&roll_seed(ctx.session_id, ctx.request_turn_id, ctx.student_id, "behavior")) as f32;
    let r3 = stable_roll(&roll_seed(ctx.session_id, ctx.request_turn_id, ctx.student_id, "comprehension")) as f32;

    let attentiveness_decay = ((0.05 + r1 * 0.16 + progress * 0.13 + fatigue_norm * 0.08)
        * phase_mult
        * post_praise_mult
        - board_mitigation)
        .clamp(0.02, 0.48);

    let behavior_decay = ((0.03 + r2 * 0.10 + progress * 0.09 + bored_norm * 0.06)
        * phase_mult
        * post_praise_mult
        - board_mitigation * 0.45)
        .clamp(0.01, 0.35);

    let comprehension_bump = if state.attentiveness < 5.0 { 0.035 } else { 0.0 };
    let comprehension_decay = ((0.02 + r3 * 0.08 + progress * 0.07 + comprehension_bump)
        * phase_mult
        * post_praise_mult
        - board_mitigation * 0.30)
        .clamp(0.01, 0.28);

    state.attentiveness -= attentiveness_decay;
    state.behavior -= behavior_decay;
    state.comprehension -= comprehension_decay;
    state.clamp_all();

    state.post_praise_fatigue_turns = state.post_praise_fatigue_turns.saturating_sub(1);
    state.post_praise_decay_boost *= 0.92;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use co_domain::agent::AgentKind;
    use co_domain::runtime::Phase;

    #[test]
    fn decay_lowers_scores_but_respects_floors() {
        let mut state = AgentState::new(AgentKind::Adhd, Utc::now());
        let ctx = DecayContext {
            session_id: "s1",
            request_turn_id: "rt1",
            student_id: "student_agent_1",
            lesson_turn: 3,
            total_turns: 9,
            phase: Phase::Lecture,
            board_active: false,
        };
        apply_natural_decay(&mut state, &ctx);
        assert!(state.attentiveness <= 10.0);
        assert!(state.attentiveness >= state.floors().0);
    }

    #[test]
    fn same_seed_is_deterministic() {
        let ctx = DecayContext {
            session_id: "s1",
            request_turn_id: "rt1",
            student_id: "student_agent_1",
            lesson_turn: 3,
            total_turns: 9,
            phase: Phase::Practice,
            board_active: true,
        };
        let mut a = AgentState::new(AgentKind::Typical, Utc::now());
        let mut b = a.clone();
        apply_natural_decay(&mut a, &ctx);
        apply_natural_decay(&mut b, &ctx);
        assert_eq!(a.attentiveness, b.attentiveness);
        assert_eq!(a.behavior, b.behavior);
        assert_eq!(a.comprehension, b.comprehension);
    }
}
