use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Lecture,
    Practice,
    Review,
}

/// An open clarification sub-state (spec.md §4.9.1 step 7).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActiveClarification {
    pub asking_student_id: String,
    pub question_turn_id: String,
    pub required_response_count: u32,
    pub responses_received: u32,
}

/// An open knowledge-check (spec.md §4.9.10).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActiveKnowledgeCheck {
    pub question: String,
    pub target_student_ids: Vec<String>,
    pub expected_keywords: Vec<String>,
    pub opened_at_lesson_turn: u32,
    pub resolved_student_ids: Vec<String>,
}

impl ActiveKnowledgeCheck {
    pub fn is_expired(&self, lesson_turn: u32) -> bool {
        lesson_turn > self.opened_at_lesson_turn + 2
    }

    pub fn unresolved_targets(&self) -> Vec<&String> {
        self.target_student_ids
            .iter()
            .filter(|id| !self.resolved_student_ids.contains(id))
            .collect()
    }
}

/// Reason a session completed, surfaced for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionReason {
    TimeExhausted,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassroomRuntime {
    pub lesson_turn: u32,
    pub phase: Phase,
    pub paused: bool,
    pub completed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completion_reason: Option<CompletionReason>,
    pub pending_task_assignment: bool,
    pub active_task_assignment: Option<crate::task::TaskAssignment>,
    pub interactive_board_active: bool,
    pub simulated_elapsed_seconds: f64,
    pub simulated_total_seconds: f64,
    pub pending_distraction_counts: HashMap<String, i32>,
    pub previous_average_boredness: Option<f32>,
    pub boredom_rise_streak: u32,
    pub last_engagement_joke_turn: Option<u32>,
    pub active_knowledge_check: Option<ActiveKnowledgeCheck>,
    pub active_clarification: Option<ActiveClarification>,
    pub last_clarified_question_turn_id: Option<String>,
    pub last_review_turn: Option<u32>,
}

impl ClassroomRuntime {
    pub fn new(lesson_total_turns: u32, simulated_total_seconds: f64) -> Self {
        let _ = lesson_total_turns;
        Self {
            lesson_turn: 1,
            phase: Phase::Lecture,
            paused: false,
            completed: false,
            completed_at: None,
            completion_reason: None,
            pending_task_assignment: false,
            active_task_assignment: None,
            interactive_board_active: false,
            simulated_elapsed_seconds: 0.0,
            simulated_total_seconds,
            pending_distraction_counts: HashMap::new(),
            previous_average_boredness: None,
            boredom_rise_streak: 0,
            last_engagement_joke_turn: None,
            active_knowledge_check: None,
            active_clarification: None,
            last_clarified_question_turn_id: None,
            last_review_turn: None,
        }
    }
}
