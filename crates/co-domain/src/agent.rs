//! Agent identity and the mutable affect state the decay/live-action/
//! knowledge-check passes in `co-orchestrator` all read and patch.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The only `AgentKind` taxonomy the orchestrator understands.
///
/// The source material mixes this with a second `teacher/student_fast/...`
/// taxonomy used elsewhere in the wider system; the orchestrator never sees
/// it and it is not modeled here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentKind {
    Teacher,
    Adhd,
    Autistic,
    Typical,
}

impl AgentKind {
    /// Per-kind state floors: `(attentiveness, behavior, comprehension)`.
    pub fn floors(self) -> (f32, f32, f32) {
        match self {
            AgentKind::Teacher => (10.0, 10.0, 10.0),
            AgentKind::Adhd => (1.5, 1.5, 1.0),
            AgentKind::Autistic => (2.0, 1.5, 1.5),
            AgentKind::Typical => (2.5, 1.5, 1.5),
        }
    }

    pub fn is_teacher(self) -> bool {
        matches!(self, AgentKind::Teacher)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LiveActionKind {
    OnTask,
    OffTask,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Success,
    Info,
    Warning,
    Danger,
}

/// A single "what is this student doing right now" snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiveAction {
    pub code: String,
    pub kind: LiveActionKind,
    pub label: String,
    pub severity: Severity,
    pub at: DateTime<Utc>,
}

impl LiveAction {
    pub fn idle(at: DateTime<Utc>) -> Self {
        Self {
            code: "idle".into(),
            kind: LiveActionKind::OnTask,
            label: "waiting".into(),
            severity: Severity::Info,
            at,
        }
    }
}

/// Mutable per-agent state. One decimal of precision is maintained by
/// always rounding after a clamp (see [`round1`]).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentState {
    pub attentiveness: f32,
    pub behavior: f32,
    pub comprehension: f32,
    pub profile: AgentKind,
    pub live_action: LiveAction,
    /// 0..6
    pub distraction_streak: u8,
    /// 0..8
    pub post_praise_fatigue_turns: u8,
    /// 0..0.5
    pub post_praise_decay_boost: f32,
}

/// Round to one decimal place.
pub fn round1(v: f32) -> f32 {
    (v * 10.0).round() / 10.0
}

/// Clamp `v` to `[floor, 10.0]` and round to one decimal.
pub fn clamp_score(v: f32, floor: f32) -> f32 {
    round1(v.clamp(floor, 10.0))
}

impl AgentState {
    pub fn new(kind: AgentKind, at: DateTime<Utc>) -> Self {
        let (af, bf, cf) = kind.floors();
        let start = if kind.is_teacher() { 10.0 } else { 10.0 };
        Self {
            attentiveness: clamp_score(start, af),
            behavior: clamp_score(start, bf),
            comprehension: clamp_score(start, cf),
            profile: kind,
            live_action: LiveAction::idle(at),
            distraction_streak: 0,
            post_praise_fatigue_turns: 0,
            post_praise_decay_boost: 0.0,
        }
    }

    pub fn floors(&self) -> (f32, f32, f32) {
        self.profile.floors()
    }

    /// Clamp all three scores to this kind's floors (idempotent).
    pub fn clamp_all(&mut self) {
        let (af, bf, cf) = self.floors();
        self.attentiveness = clamp_score(self.attentiveness, af);
        self.behavior = clamp_score(self.behavior, bf);
        self.comprehension = clamp_score(self.comprehension, cf);
    }
}

/// Static identity of one participant in a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentProfile {
    pub id: String,
    pub kind: AgentKind,
    pub display_name: String,
    pub state: AgentState,
}

impl AgentProfile {
    pub fn teacher(at: DateTime<Utc>) -> Self {
        Self {
            id: "teacher".into(),
            kind: AgentKind::Teacher,
            display_name: "Teacher".into(),
            state: AgentState::new(AgentKind::Teacher, at),
        }
    }

    pub fn student(db_id: &str, kind: AgentKind, display_name: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            id: format!("student_agent_{db_id}"),
            kind,
            display_name: display_name.into(),
            state: AgentState::new(kind, at),
        }
    }

    pub fn is_teacher(&self) -> bool {
        self.kind.is_teacher()
    }
}

/// A patch produced by an agent worker, applied sequentially after join
/// under the session lock (never applied concurrently).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatePatch {
    pub attentiveness_delta: Option<f32>,
    pub behavior_delta: Option<f32>,
    pub comprehension_delta: Option<f32>,
    pub live_action: Option<LiveAction>,
}

impl AgentState {
    /// Apply a patch, clamping to this agent's floors.
    pub fn apply_patch(&mut self, patch: &StatePatch) {
        if let Some(d) = patch.attentiveness_delta {
            self.attentiveness += d;
        }
        if let Some(d) = patch.behavior_delta {
            self.behavior += d;
        }
        if let Some(d) = patch.comprehension_delta {
            self.comprehension += d;
        }
        if let Some(la) = &patch.live_action {
            self.live_action = la.clone();
        }
        self.clamp_all();
    }
}
