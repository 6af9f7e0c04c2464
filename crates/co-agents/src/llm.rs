//! LLM text-generation contract (spec.md §4.6).
//!
//! Modeled on the workspace model's `LlmProvider` seam: a narrow trait the
//! orchestrator depends on, with one deterministic mock implementation that
//! stands in for a real provider in tests and the demo binary.

use async_trait::async_trait;
use sha2::{Digest, Sha256};

/// Callback invoked once per emitted token when streaming is requested.
/// Kept as an explicit trait object (spec.md §9: "pass an explicit token
/// sink interface to the agent; do not use implicit mutable closures
/// shared across workers") rather than a bare closure captured by
/// reference, so each concurrent agent task owns its own sink.
pub trait TokenSink: Send + Sync {
    fn emit(&self, token: &str);
}

/// A no-op sink for callers that only want the final text.
pub struct NullSink;
impl TokenSink for NullSink {
    fn emit(&self, _token: &str) {}
}

pub struct GenerateRequest<'a> {
    pub system_prompt: &'a str,
    pub user_prompt: &'a str,
    /// Deterministic seed. Same `(seed, system_prompt, user_prompt)` must
    /// produce the same text (spec.md §4.6, §8 "deterministic rolls").
    pub seed: String,
}

#[async_trait]
pub trait LlmTool: Send + Sync {
    async fn generate(
        &self,
        req: GenerateRequest<'_>,
        emit_token: Option<&(dyn TokenSink)>,
    ) -> String;
}

/// Deterministic mock: hashes `(seed, system_prompt, user_prompt)` into a
/// reproducible pseudo-text response. Honors the teacher's "ask one short
/// check question" directive by emitting a templated question built from
/// keyword tokens pulled out of the prompt (spec.md §4.6).
pub struct DeterministicMockLlm;

const STOPWORDS: &[&str] = &[
    "the", "a", "an", "is", "are", "of", "to", "and", "in", "on", "for", "this", "that", "one",
    "now", "output", "as", "your", "you", "be", "it", "with",
];

fn keyword_tokens(text: &str, limit: usize) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for raw in text.split(|c: char| !c.is_alphanumeric()) {
        let w = raw.to_lowercase();
        if w.len() < 3 || STOPWORDS.contains(&w.as_str()) {
            continue;
        }
        if seen.insert(w.clone()) {
            out.push(w);
            if out.len() >= limit {
                break;
            }
        }
    }
    out
}

fn hash_to_unit(seed: &str, extra: &str) -> f64 {
    let mut hasher = Sha256::new();
    hasher.update(seed.as_bytes());
    hasher.update(b"|");
    hasher.update(extra.as_bytes());
    let digest = hasher.finalize();
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[0..8]);
    let n = u64::from_be_bytes(bytes);
    (n as f64) / (u64::MAX as f64)
}

#[async_trait]
impl LlmTool for DeterministicMockLlm {
    async fn generate(
        &self,
        req: GenerateRequest<'_>,
        emit_token: Option<&(dyn TokenSink)>,
    ) -> String {
        let wants_check_question = req
            .system_prompt
            .to_lowercase()
            .contains("ask one short check question")
            || req
                .user_prompt
                .to_lowercase()
                .contains("ask one short check question");

        let text = if wants_check_question {
            let keywords = keyword_tokens(req.system_prompt, 3);
            let topic_word = keywords.first().cloned().unwrap_or_else(|| "fraction".into());
            format!(
                "Quick check: can you explain how the {topic_word} works here, and which numerator or denominator changes?"
            )
        } else {
            let r = hash_to_unit(&req.seed, req.user_prompt);
            let keywords = keyword_tokens(req.user_prompt, 4);
            let flavor = if keywords.is_empty() {
                "Let's keep going.".to_string()
            } else {
                format!("Thinking about {}.", keywords.join(", "))
            };
            let variant = (r * 3.0) as u32 % 3;
            match variant {
                0 => format!("{flavor} I think this makes sense so far."),
                1 => format!("{flavor} Not fully sure, but I'll give it a try."),
                _ => format!("{flavor} Here is my answer based on what I heard."),
            }
        };

        if let Some(sink) = emit_token {
            for word in text.split(' ') {
                sink.emit(word);
            }
        }

        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn deterministic_given_same_inputs() {
        let llm = DeterministicMockLlm;
        let req = || GenerateRequest {
            system_prompt: "You are a student.",
            user_prompt: "What do you think about fractions?",
            seed: "s1:rt1:student_agent_1".into(),
        };
        let a = llm.generate(req(), None).await;
        let b = llm.generate(req(), None).await;
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn check_question_directive_produces_question() {
        let llm = DeterministicMockLlm;
        let req = GenerateRequest {
            system_prompt: "Directive: ask one short check question now about fractions.",
            user_prompt: "go",
            seed: "s1:rt2:teacher".into(),
        };
        let out = llm.generate(req, None).await;
        assert!(out.contains('?'));
    }
}
