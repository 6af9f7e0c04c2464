//! Boredom-joke gate (spec.md §4.9.8).

use co_domain::agent::AgentState;
use co_domain::runtime::Phase;

/// `boredness(s) = clamp(10 − (att·0.6 + beh·0.4), 0, 10)`.
pub fn boredness(attentiveness: f32, behavior: f32) -> f32 {
    (10.0 - (attentiveness * 0.6 + behavior * 0.4)).clamp(0.0, 10.0)
}

pub fn average_boredness<'a>(states: impl Iterator<Item = &'a AgentState>) -> f32 {
    let mut sum = 0.0f32;
    let mut count = 0u32;
    for s in states {
        sum += boredness(s.attentiveness, s.behavior);
        count += 1;
    }
    if count == 0 {
        0.0
    } else {
        sum / count as f32
    }
}

pub struct BoredomGateResult {
    pub avg_bored: f32,
    pub delta: f32,
    pub rise_streak: u32,
    pub should_joke: bool,
}

/// Evaluates whether this turn should inject a single engagement joke.
/// `previous_avg` is `None` on the student's/session's first evaluation —
/// in that case `delta` is reported as `0.0` and the rise streak does not
/// move, mirroring the "no prior sample" case implicit in spec.md §4.9.8.
pub fn resolve_boredom_gate(
    avg_bored: f32,
    previous_avg: Option<f32>,
    rise_streak: u32,
    phase: Phase,
    lesson_turn: u32,
    last_joke_turn: Option<u32>,
) -> BoredomGateResult {
    let delta = match previous_avg {
        Some(prev) => avg_bored - prev,
        None => 0.0,
    };

    let rise_streak = if previous_avg.is_none() {
        rise_streak
    } else if delta >= 0.22 {
        rise_streak + 1
    } else {
        rise_streak.saturating_sub(1)
    };

    let eligible_phase = matches!(phase, Phase::Lecture | Phase::Practice);
    let turns_since_joke = last_joke_turn.map(|t| lesson_turn.saturating_sub(t)).unwrap_or(u32::MAX);

    let should_joke = eligible_phase && turns_since_joke >= 3 && avg_bored >= 4.9 && rise_streak >= 2;

    let rise_streak = if should_joke { 0 } else { rise_streak };

    BoredomGateResult {
        avg_bored,
        delta,
        rise_streak,
        should_joke,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joke_requires_both_threshold_and_streak() {
        let r = resolve_boredom_gate(5.5, Some(5.0), 1, Phase::Lecture, 4, Some(1));
        assert!(r.rise_streak >= 2);
        assert!(r.should_joke);
    }

    #[test]
    fn no_joke_too_soon_after_last() {
        let r = resolve_boredom_gate(6.0, Some(5.0), 3, Phase::Lecture, 4, Some(3));
        assert!(!r.should_joke);
    }

    #[test]
    fn first_sample_has_zero_delta() {
        let r = resolve_boredom_gate(5.0, None, 0, Phase::Lecture, 1, None);
        assert_eq!(r.delta, 0.0);
    }
}
