//! Knowledge-check protocol (spec.md §4.9.10).

use co_domain::runtime::ActiveKnowledgeCheck;

const QUALIFYING_KEYWORDS: &[&str] = &[
    "what", "why", "how", "which", "can", "explain", "compare", "define", "numerator",
    "denominator", "fraction",
];

const STOPWORDS: &[&str] = &[
    "the", "a", "an", "is", "are", "of", "to", "and", "in", "on", "for", "this", "that", "one",
    "now", "as", "your", "you", "be", "it", "with", "what", "how",
];

const DONT_KNOW_PATTERNS: &[&str] = &["i don't know", "i dont know", "not sure", "no idea"];

const REASONING_CUES: &[&str] = &["because", "since", "so that", "therefore", "which means"];

/// Does `teacher_text` qualify as a knowledge-check question (spec.md
/// §4.9.10: `?` plus one of a fixed keyword set)?
pub fn qualifies_as_knowledge_check(teacher_text: &str) -> bool {
    if !teacher_text.contains('?') {
        return false;
    }
    let lower = teacher_text.to_lowercase();
    QUALIFYING_KEYWORDS.iter().any(|k| lower.contains(k))
}

/// The first `?`-terminated sentence in `text`, or the whole text if none.
pub fn first_question_sentence(text: &str) -> String {
    if let Some(idx) = text.find('?') {
        text[..=idx].trim().to_string()
    } else {
        text.trim().to_string()
    }
}

fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .map(|w| w.to_lowercase())
        .filter(|w| w.len() > 2 && !STOPWORDS.contains(&w.as_str()))
        .collect()
}

/// Top 10 non-stopword tokens pulled from `topic + lesson step title + goal`.
pub fn expected_keywords(topic: &str, step_title: &str, step_goal: &str) -> Vec<String> {
    let combined = format!("{topic} {step_title} {step_goal}");
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for tok in tokenize(&combined) {
        if seen.insert(tok.clone()) {
            out.push(tok);
            if out.len() >= 10 {
                break;
            }
        }
    }
    out
}

pub fn build_knowledge_check(
    teacher_text: &str,
    topic: &str,
    step_title: &str,
    step_goal: &str,
    target_student_ids: Vec<String>,
    opened_at_lesson_turn: u32,
) -> ActiveKnowledgeCheck {
    ActiveKnowledgeCheck {
        question: first_question_sentence(teacher_text),
        target_student_ids,
        expected_keywords: expected_keywords(topic, step_title, step_goal),
        opened_at_lesson_turn,
        resolved_student_ids: Vec::new(),
    }
}

fn has_fraction_notation(text: &str) -> bool {
    let bytes = text.as_bytes();
    for (i, b) in bytes.iter().enumerate() {
        if *b == b'/' && i > 0 && i + 1 < bytes.len() {
            if bytes[i - 1].is_ascii_digit() && bytes[i + 1].is_ascii_digit() {
                return true;
            }
        }
    }
    false
}

fn has_reasoning_cue(text: &str) -> bool {
    let lower = text.to_lowercase();
    REASONING_CUES.iter().any(|cue| lower.contains(cue))
}

fn is_dont_know(text: &str) -> bool {
    let lower = text.to_lowercase();
    DONT_KNOW_PATTERNS.iter().any(|p| lower.contains(p))
}

/// `score = 0.45·keywordHits + 0.45·[has X/Y fraction] + 0.40·[has math
/// reasoning cue] + 0.30·[wordCount≥6]`; "I don't know" forces `false`.
/// A reply is "likely correct" iff `score ≥ 0.9`.
pub fn evaluate_reply(expected_keywords: &[String], reply: &str) -> bool {
    if is_dont_know(reply) {
        return false;
    }
    let lower = reply.to_lowercase();
    let hits = if expected_keywords.is_empty() {
        0.0
    } else {
        let matched = expected_keywords.iter().filter(|k| lower.contains(k.as_str())).count();
        matched as f32 / expected_keywords.len() as f32
    };
    let word_count = reply.split_whitespace().count();

    let score = 0.45 * hits
        + 0.45 * (has_fraction_notation(reply) as u8 as f32)
        + 0.40 * (has_reasoning_cue(reply) as u8 as f32)
        + 0.30 * ((word_count >= 6) as u8 as f32);

    score >= 0.9
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn qualifies_question_with_keyword() {
        assert!(qualifies_as_knowledge_check("What is 1/2 of 6?"));
        assert!(!qualifies_as_knowledge_check("Great job everyone."));
    }

    #[test]
    fn correct_answer_with_reasoning_and_fraction() {
        let keywords = expected_keywords("Fractions", "What is a fraction?", "numerator denominator");
        let reply = "1/2 of 6 is 3 because the denominator splits the whole into equal parts.";
        assert!(evaluate_reply(&keywords, reply));
    }

    #[test]
    fn dont_know_is_always_incorrect() {
        let keywords = vec!["numerator".to_string()];
        assert!(!evaluate_reply(&keywords, "I don't know, the numerator thing confuses me because it's hard."));
    }
}
