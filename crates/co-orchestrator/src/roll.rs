//! Deterministic pseudo-randomness (spec.md §4.9.5, glossary "Stable roll").
//!
//! Every roll in the orchestrator is a SHA-256 hash of a colon-joined seed
//! string, folded into `[0, 1)`. Same seed, same process or not, same
//! number — the simulation is reproducible given the same sequence of
//! inputs (spec.md §1 Non-goals: "does not guarantee determinism across
//! processes but does guarantee reproducibility ... modulo the LLM").

use sha2::{Digest, Sha256};

/// Deterministic pseudo-random number in `[0, 1)` derived from `seed`.
pub fn stable_roll(seed: &str) -> f64 {
    let digest = Sha256::digest(seed.as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[0..8]);
    let n = u64::from_be_bytes(bytes);
    (n as f64) / ((u64::MAX as f64) + 1.0)
}

/// Builds the canonical `sessionId:requestTurnId:studentId:purpose` seed.
pub fn roll_seed(session_id: &str, request_turn_id: &str, student_id: &str, purpose: &str) -> String {
    format!("{session_id}:{request_turn_id}:{student_id}:{purpose}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic_given_same_seed() {
        let seed = roll_seed("s1", "rt1", "student_agent_1", "attention");
        assert_eq!(stable_roll(&seed), stable_roll(&seed));
    }

    #[test]
    fn different_purposes_diverge() {
        let a = stable_roll(&roll_seed("s1", "rt1", "student_agent_1", "attention"));
        let b = stable_roll(&roll_seed("s1", "rt1", "student_agent_1", "behavior"));
        assert_ne!(a, b);
    }

    #[test]
    fn stays_in_unit_interval() {
        for i in 0..50 {
            let r = stable_roll(&format!("seed-{i}"));
            assert!((0.0..1.0).contains(&r));
        }
    }
}
