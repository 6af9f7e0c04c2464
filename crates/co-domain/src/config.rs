use serde::{Deserialize, Serialize};

use crate::graph::Relationship;

/// One relationship override entry (wire-friendly: a list, not a map keyed
/// by a tuple, since JSON object keys must be strings).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationshipOverride {
    pub from: String,
    pub to: String,
    pub relationship: Relationship,
}

/// Default simulated lesson length (spec.md §3: `simulatedTotalSeconds`
/// default 2700).
pub const DEFAULT_SIMULATED_TOTAL_SECONDS: f64 = 2700.0;

/// Default number of lesson-plan steps (spec.md §4.7).
pub const FRACTIONS_LESSON_TOTAL_TURNS: u32 = 9;

/// Per-session configuration overrides, supplied at `create_session` time
/// and otherwise defaulted. Mirrors the shape of spec.md's `config?` input
/// field on `POST /sessions`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_simulated_total_seconds")]
    pub simulated_total_seconds: f64,
    #[serde(default = "default_min_responders")]
    pub min_responders: usize,
    #[serde(default = "default_max_responders")]
    pub max_responders: usize,
    /// `(from_id, to_id) -> relationship` overrides applied when the graph
    /// is created (spec.md §4.3).
    #[serde(default)]
    pub relationship_overrides: Vec<RelationshipOverride>,
    #[serde(default = "default_lesson_total_turns")]
    pub lesson_total_turns: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            simulated_total_seconds: default_simulated_total_seconds(),
            min_responders: default_min_responders(),
            max_responders: default_max_responders(),
            relationship_overrides: Vec::new(),
            lesson_total_turns: default_lesson_total_turns(),
        }
    }
}

fn default_simulated_total_seconds() -> f64 {
    DEFAULT_SIMULATED_TOTAL_SECONDS
}
fn default_min_responders() -> usize {
    2
}
fn default_max_responders() -> usize {
    4
}
fn default_lesson_total_turns() -> u32 {
    FRACTIONS_LESSON_TOTAL_TURNS
}
