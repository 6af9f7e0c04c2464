//! Task review (spec.md §4.9.11).

use co_domain::agent::AgentState;

/// `performanceSignal = att·0.35 + comp·0.45 + beh·0.2`; `solved = signal ≥ 5.5`.
pub fn performance_signal(state: &AgentState) -> f32 {
    state.attentiveness * 0.35 + state.comprehension * 0.45 + state.behavior * 0.2
}

/// Applies the review outcome to `state` (`comp ± 1`, `beh ± 1`, clamped)
/// and returns whether the task was judged solved.
pub fn apply_task_review(state: &mut AgentState) -> bool {
    let solved = performance_signal(state) >= 5.5;
    let delta = if solved { 1.0 } else { -1.0 };
    state.comprehension += delta;
    state.behavior += delta;
    state.clamp_all();
    solved
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use co_domain::agent::AgentKind;

    #[test]
    fn high_scores_are_marked_solved() {
        let mut state = AgentState::new(AgentKind::Typical, Utc::now());
        let before = state.comprehension;
        assert!(apply_task_review(&mut state));
        assert!(state.comprehension >= before);
    }

    #[test]
    fn low_scores_are_unsolved_and_clamped_to_floor() {
        let mut state = AgentState::new(AgentKind::Adhd, Utc::now());
        state.attentiveness = 1.5;
        state.behavior = 1.5;
        state.comprehension = 1.0;
        let solved = apply_task_review(&mut state);
        assert!(!solved);
        assert!(state.comprehension >= state.floors().2);
    }
}
