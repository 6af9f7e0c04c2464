//! Teacher/student prompt assembly (spec.md §4.9.2, §4.9.3).
//!
//! Re-architected per spec.md §9's design note: "express as a typed
//! `PromptBuilder` that accepts `Maybe<Line>` and drops absent items; keep
//! the line ordering contract explicit" — this replaces whatever string-array-
//! plus-`undefined`-filtering pattern the source used.

use co_domain::graph::{CommunicationActivation, GraphEdge};

/// Accumulates an ordered list of prompt lines, silently dropping absent
/// (`None`) ones so every call site keeps a flat, readable ordering.
#[derive(Default)]
pub struct PromptBuilder {
    lines: Vec<String>,
}

impl PromptBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Always appended.
    pub fn line(mut self, text: impl Into<String>) -> Self {
        self.lines.push(text.into());
        self
    }

    /// Appended only if `Some`.
    pub fn maybe(mut self, text: Option<impl Into<String>>) -> Self {
        if let Some(t) = text {
            self.lines.push(t.into());
        }
        self
    }

    /// Appended only if `cond` holds.
    pub fn when(self, cond: bool, text: impl Into<String>) -> Self {
        if cond {
            self.line(text)
        } else {
            self
        }
    }

    pub fn build(self) -> String {
        self.lines.join("\n")
    }
}

/// `teacherMode` values (spec.md §4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeacherMode {
    LectureDelivery,
    ClarificationDialogue,
    BehaviorIntervention,
    EngagementJoke,
    KnowledgeCheckPraise,
    LessonClosure,
}

impl TeacherMode {
    pub fn as_str(self) -> &'static str {
        match self {
            TeacherMode::LectureDelivery => "lecture_delivery",
            TeacherMode::ClarificationDialogue => "clarification_dialogue",
            TeacherMode::BehaviorIntervention => "behavior_intervention",
            TeacherMode::EngagementJoke => "engagement_joke",
            TeacherMode::KnowledgeCheckPraise => "knowledge_check_praise",
            TeacherMode::LessonClosure => "lesson_closure",
        }
    }
}

pub struct TeacherPromptInput<'a> {
    pub mode: TeacherMode,
    pub lesson_turn: u32,
    pub total_turns: u32,
    pub step_title: &'a str,
    pub delivery_goal: &'a str,
    pub task_context: Option<String>,
    pub board_active: bool,
    pub incoming_instruction: &'a str,
    pub recent_student_signals: Vec<String>,
    pub per_student_snapshot: Option<Vec<String>>,
    pub live_action_snapshot: Vec<String>,
    pub bored_avg: f32,
    pub bored_delta: f32,
    pub bored_rise_streak: u32,
    pub behavior_alert_student_ids: Vec<String>,
    pub engagement_joke_triggered: bool,
    pub pending_knowledge_check_question: Option<String>,
    pub knowledge_check_due: bool,
    pub graph_signals: Vec<&'a GraphEdge>,
    pub active_channels: Vec<&'a CommunicationActivation>,
    pub clarification_asking_student: Option<&'a str>,
    pub near_end: bool,
    pub supervisor_hint: Option<&'a str>,
}

pub fn build_teacher_prompt(input: TeacherPromptInput<'_>) -> String {
    let mut b = PromptBuilder::new()
        .line(format!("Mode: {}", input.mode.as_str()))
        .line(format!(
            "Lesson turn {}/{}: {}",
            input.lesson_turn, input.total_turns, input.step_title
        ))
        .line(format!("Delivery goal: {}", input.delivery_goal))
        .line(
            input
                .task_context
                .clone()
                .unwrap_or_else(|| "No active task assignment.".to_string()),
        )
        .line(format!(
            "Interactive board: {}",
            if input.board_active { "active" } else { "inactive" }
        ))
        .line(format!("Incoming: {}", input.incoming_instruction));

    if !input.recent_student_signals.is_empty() {
        b = b.line(format!(
            "Recent student signals:\n{}",
            input.recent_student_signals.join("\n")
        ));
    }

    if let Some(snapshot) = &input.per_student_snapshot {
        if !snapshot.is_empty() {
            b = b.line(format!("Per-student state:\n{}", snapshot.join("\n")));
        }
    }

    if !input.live_action_snapshot.is_empty() {
        let lines: Vec<&String> = input.live_action_snapshot.iter().take(10).collect();
        b = b.line(format!(
            "Live actions:\n{}",
            lines.iter().map(|s| s.as_str()).collect::<Vec<_>>().join("\n")
        ));
    }

    b = b.line(format!(
        "Boredness trend: avg={:.2} delta={:.2} riseStreak={}",
        input.bored_avg, input.bored_delta, input.bored_rise_streak
    ));

    if !input.behavior_alert_student_ids.is_empty() {
        b = b
            .line(format!(
                "Behavior alerts: {}",
                input.behavior_alert_student_ids.join(", ")
            ))
            .line("Rule: redirect the flagged student(s) before continuing the lesson.");
    }

    if input.engagement_joke_triggered {
        b = b.line("Rule: the class is getting bored — open with one short, light joke before continuing.");
    }

    if let Some(q) = &input.pending_knowledge_check_question {
        b = b.line(format!("Pending knowledge check: \"{q}\" is still open."));
    }

    if input.knowledge_check_due {
        b = b.line("Rule: ask one short check question now about the current lesson step.");
    }

    if !input.graph_signals.is_empty() {
        let lines: Vec<String> = input
            .graph_signals
            .iter()
            .take(5)
            .map(|e| format!("{} -> {} ({:?}, weight {:.2})", e.from, e.to, e.relationship, e.weight))
            .collect();
        b = b.line(format!("Graph relationship signals:\n{}", lines.join("\n")));
    }

    if !input.active_channels.is_empty() {
        let lines: Vec<String> = input
            .active_channels
            .iter()
            .take(6)
            .map(|a| format!("{} -> {} ({:?})", a.from, a.to, a.action_type))
            .collect();
        b = b.line(format!("Active channels this cycle:\n{}", lines.join("\n")));
    }

    if let Some(student) = input.clarification_asking_student {
        b = b
            .line(format!(
                "Clarification: {student} asked a question you have not fully answered yet."
            ))
            .line("Rule: address only that student's question directly and clearly.");
    }

    if input.near_end {
        b = b.line("Rule: the lesson is nearly over — begin wrapping up and summarizing.");
    }

    if let Some(hint) = input.supervisor_hint {
        b = b.line(format!("Supervisor hint: {hint}"));
    }

    b.line("Output one teacher utterance now.").build()
}

pub struct StudentPromptInput<'a> {
    pub student_id: &'a str,
    pub graph_mode_banner: &'a str,
    pub task_context: Option<String>,
    pub allowed_knowledge: &'a [String],
}

pub fn build_student_prompt(input: StudentPromptInput<'_>) -> String {
    PromptBuilder::new()
        .line(format!("You are {}.", input.student_id))
        .line(input.graph_mode_banner)
        .maybe(input.task_context.clone())
        .line("Rule: answer using only direct messages addressed to you.")
        .line(format!("You have {} memory item(s) available.", input.allowed_knowledge.len()))
        .line("Output one short student utterance now.")
        .build()
}

const DIRECT_PREFIX: &str = "Direct graph message:";
const OVERHEARD_PREFIX: &str = "Overheard graph message (low weight):";

/// `allowedKnowledge[]` per spec.md §4.9.3's fallback chain.
pub fn compute_allowed_knowledge(
    direct_lines: &[String],
    overheard_lines: &[String],
    stimulus_fallback: Option<&str>,
    request_content_fallback: &str,
) -> Vec<String> {
    let direct: Vec<String> = direct_lines
        .iter()
        .rev()
        .take(6)
        .rev()
        .map(|l| format!("{DIRECT_PREFIX} {l}"))
        .collect();
    let overheard_primary: Vec<String> = overheard_lines
        .iter()
        .rev()
        .take(2)
        .rev()
        .map(|l| format!("{OVERHEARD_PREFIX} {l}"))
        .collect();

    if !direct.is_empty() || !overheard_primary.is_empty() {
        let mut combined = direct;
        combined.extend(overheard_primary);
        return combined;
    }

    let overheard_fallback: Vec<String> = overheard_lines
        .iter()
        .rev()
        .take(4)
        .rev()
        .map(|l| format!("{OVERHEARD_PREFIX} {l}"))
        .collect();
    if !overheard_fallback.is_empty() {
        return overheard_fallback;
    }

    let synthesized = stimulus_fallback
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(request_content_fallback);
    vec![format!("{DIRECT_PREFIX} {synthesized}")]
}

/// Stimulus text = concatenation of payload `text` fields of all
/// activations *to* the student in the current turn, or a default sentence.
pub fn compute_stimulus_text(activation_texts: &[&str]) -> String {
    let joined: Vec<&str> = activation_texts.iter().filter(|t| !t.is_empty()).copied().collect();
    if joined.is_empty() {
        "No direct input this turn.".to_string()
    } else {
        joined.join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_builder_drops_absent_lines() {
        let text = PromptBuilder::new()
            .line("always")
            .maybe(Some("present"))
            .maybe(None::<String>)
            .build();
        assert_eq!(text, "always\npresent");
    }

    #[test]
    fn allowed_knowledge_prefers_direct_then_overheard() {
        let direct = vec!["hi".to_string()];
        let overheard = vec!["psst".to_string()];
        let out = compute_allowed_knowledge(&direct, &overheard, None, "fallback");
        assert!(out[0].starts_with(DIRECT_PREFIX));
    }

    #[test]
    fn allowed_knowledge_falls_back_to_synthesis_when_empty() {
        let out = compute_allowed_knowledge(&[], &[], None, "the request content");
        assert_eq!(out.len(), 1);
        assert!(out[0].contains("the request content"));
    }

    #[test]
    fn stimulus_defaults_when_no_activations() {
        assert_eq!(compute_stimulus_text(&[]), "No direct input this turn.");
    }
}
