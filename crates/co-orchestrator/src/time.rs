//! Lesson time & phase (spec.md §4.9.6).

use co_domain::runtime::Phase;

/// `lessonTurnFromProgress(p) = clamp(⌊p·N⌋+1, 1, N)`.
pub fn lesson_turn_from_progress(progress: f64, total_turns: u32) -> u32 {
    let raw = (progress * total_turns as f64).floor() as i64 + 1;
    raw.clamp(1, total_turns as i64) as u32
}

/// `phase = lecture if lessonTurn < ⌈N/3⌉+1; practice until ⌈2N/3⌉+1; else review` (spec.md §3).
pub fn phase_for_lesson_turn(lesson_turn: u32, total_turns: u32) -> Phase {
    let lecture_end = div_ceil(total_turns, 3) + 1;
    let practice_end = div_ceil(2 * total_turns, 3) + 1;
    if lesson_turn < lecture_end {
        Phase::Lecture
    } else if lesson_turn < practice_end {
        Phase::Practice
    } else {
        Phase::Review
    }
}

fn div_ceil(n: u32, d: u32) -> u32 {
    (n + d - 1) / d
}

/// Adds `seconds` to `elapsed`, capped at `total`. Returns the new elapsed value.
pub fn advance_simulation_time(elapsed: f64, seconds: f64, total: f64) -> f64 {
    (elapsed + seconds).min(total)
}

/// Completion when `elapsed >= total - 0.01` (spec.md §4.9.6).
pub fn is_time_exhausted(elapsed: f64, total: f64) -> bool {
    elapsed >= total - 0.01
}

/// Near-end window: `total - elapsed <= 120s` arms the `lesson_closure`
/// teacher mode.
pub fn is_near_end(elapsed: f64, total: f64) -> bool {
    (total - elapsed) <= 120.0
}

/// `clamp(round(words/wpm·60 + max(0, sentences−1)·0.45), 2, 45)`.
pub fn estimate_speech_seconds(text: &str, words_per_minute: f64) -> f64 {
    let words = text.split_whitespace().count() as f64;
    let sentences = text
        .matches(|c: char| c == '.' || c == '?' || c == '!')
        .count()
        .max(1) as f64;
    let seconds = (words / words_per_minute * 60.0 + (sentences - 1.0).max(0.0) * 0.45).round();
    seconds.clamp(2.0, 45.0)
}

pub const TEACHER_WPM: f64 = 130.0;
pub const STUDENT_WPM: f64 = 115.0;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lesson_turn_clamps_to_range() {
        assert_eq!(lesson_turn_from_progress(0.0, 9), 1);
        assert_eq!(lesson_turn_from_progress(1.0, 9), 9);
        assert_eq!(lesson_turn_from_progress(1.5, 9), 9);
    }

    #[test]
    fn phase_boundaries_for_nine_turns() {
        // ceil(9/3)+1 = 4, ceil(18/3)+1 = 7
        assert_eq!(phase_for_lesson_turn(1, 9), Phase::Lecture);
        assert_eq!(phase_for_lesson_turn(3, 9), Phase::Lecture);
        assert_eq!(phase_for_lesson_turn(4, 9), Phase::Practice);
        assert_eq!(phase_for_lesson_turn(6, 9), Phase::Practice);
        assert_eq!(phase_for_lesson_turn(7, 9), Phase::Review);
        assert_eq!(phase_for_lesson_turn(9, 9), Phase::Review);
    }

    #[test]
    fn exhaustion_threshold() {
        assert!(is_time_exhausted(299.991, 300.0));
        assert!(!is_time_exhausted(290.0, 300.0));
    }

    #[test]
    fn speech_seconds_is_bounded() {
        assert_eq!(estimate_speech_seconds("hi", TEACHER_WPM), 2.0);
        let long = "word ".repeat(200);
        assert_eq!(estimate_speech_seconds(&long, TEACHER_WPM), 45.0);
    }
}
