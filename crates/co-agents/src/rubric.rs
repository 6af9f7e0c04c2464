//! Debate-mode rubric (spec.md §4.8). Interface-only component: debate
//! mode is kept minimal (spec.md §4.9.12), so this scorer is a simple
//! heuristic, not a correctness judge.

#[derive(Debug, Clone, serde::Serialize)]
pub struct RubricScore {
    pub argument_strength: f32,
    pub evidence_use: f32,
    pub clarity: f32,
    pub rebuttal: f32,
    pub overall: f32,
    pub feedback: String,
}

const REBUTTAL_MARKERS: &[&str] = &["however", "but", "on the other hand", "in contrast"];
const EVIDENCE_MARKERS: &[&str] = &["because", "for example", "studies show", "data"];

fn score_markers(text: &str, markers: &[&str]) -> f32 {
    let lower = text.to_lowercase();
    let hits = markers.iter().filter(|m| lower.contains(*m)).count();
    (hits as f32 * 3.0).min(10.0)
}

fn topic_overlap(topic: &str, text: &str) -> f32 {
    let topic_words: Vec<String> = topic
        .split_whitespace()
        .map(|w| w.to_lowercase())
        .filter(|w| w.len() > 3)
        .collect();
    if topic_words.is_empty() {
        return 5.0;
    }
    let lower = text.to_lowercase();
    let hits = topic_words.iter().filter(|w| lower.contains(w.as_str())).count();
    ((hits as f32 / topic_words.len() as f32) * 10.0).min(10.0)
}

/// Score a single teacher/user exchange in debate mode.
pub fn score_debate_rubric(topic: &str, user_message: &str, teacher_message: &str) -> RubricScore {
    let argument_strength = topic_overlap(topic, user_message).max(3.0);
    let evidence_use = score_markers(user_message, EVIDENCE_MARKERS);
    let word_count = user_message.split_whitespace().count();
    let clarity = if word_count >= 12 { 8.0 } else { (word_count as f32 / 12.0 * 8.0).max(2.0) };
    let rebuttal = score_markers(teacher_message, REBUTTAL_MARKERS).max(
        score_markers(user_message, REBUTTAL_MARKERS),
    );
    let overall = (argument_strength * 0.35
        + evidence_use * 0.25
        + clarity * 0.2
        + rebuttal * 0.2)
        .clamp(0.0, 10.0);

    let feedback = if overall >= 7.0 {
        "Strong, well-supported point — keep engaging with the counterargument.".to_string()
    } else if overall >= 4.0 {
        "Reasonable point; add more evidence and directly address the other side.".to_string()
    } else {
        "Needs more connection to the topic and supporting evidence.".to_string()
    };

    RubricScore {
        argument_strength,
        evidence_use,
        clarity,
        rebuttal,
        overall,
        feedback,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rewards_evidence_and_rebuttal() {
        let s = score_debate_rubric(
            "School uniforms",
            "I think uniforms help because studies show less bullying, however some argue cost is unfair.",
            "That's a fair rebuttal.",
        );
        assert!(s.overall > 4.0);
    }
}
