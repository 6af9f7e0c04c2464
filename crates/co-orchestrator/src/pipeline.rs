//! The orchestrator core (spec.md §4.9): the five public operations and the
//! request-turn pipeline (§4.9.1 classroom, §4.9.12 debate).

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use futures_util::future::join_all;
use serde_json::json;
use uuid::Uuid;

use co_agents::llm::LlmTool;
use co_agents::rubric::score_debate_rubric;
use co_agents::safety::SafetyFilter;
use co_agents::student::{AgentOutput, StudentAgent, StudentAgentInput};
use co_agents::teacher::{TeacherAgent, TeacherAgentInput};
use co_agents::lesson_plan::get_fractions_lesson_step;

use co_domain::agent::{AgentKind, AgentProfile};
use co_domain::config::SessionConfig;
use co_domain::error::{Error, Result};
use co_domain::event::{EventType, SessionEvent};
use co_domain::graph::{ActionType, ActivationPayload, GraphEdge};
use co_domain::runtime::{ActiveClarification, ClassroomRuntime, CompletionReason, Phase};
use co_domain::session::{Channel, Metrics, Mode, Session};
use co_domain::task::{AssignedBy, TaskAssignment, TaskGroup, TaskMode};
use co_domain::turn::{Turn, TurnRole};

use co_graph::{
    activate_communication_edge, averaged_edge_weight, create_session_communication_graph,
    relationship_between, reset_current_turn_edge_activity, top_edges_by_weight, ActivateEdgeInput,
};
use co_sessions::{SessionLockMap, SessionStore};

use crate::boredom::{average_boredness, resolve_boredom_gate};
use crate::clarify_stems::looks_like_question;
use crate::decay::{apply_natural_decay, DecayContext};
use crate::interaction::{plan_interaction, InteractionPlan, PeerCandidate};
use crate::knowledge_check::{build_knowledge_check, evaluate_reply, qualifies_as_knowledge_check};
use crate::liveaction::resolve_live_action;
use crate::loader::ClassroomLoader;
use crate::prompt::{
    build_student_prompt, build_teacher_prompt, compute_allowed_knowledge, compute_stimulus_text,
    StudentPromptInput, TeacherMode, TeacherPromptInput,
};
use crate::roll::roll_seed;
use crate::summary::{project_session_summary, SessionSummary};
use crate::task_review::apply_task_review;
use crate::tasks::{auto_build_groups, normalize_submitted_groups};
use crate::time::{
    advance_simulation_time, estimate_speech_seconds, is_near_end, is_time_exhausted,
    lesson_turn_from_progress, phase_for_lesson_turn, STUDENT_WPM, TEACHER_WPM,
};

/// Constructor input for `create_session` (spec.md §4.9 op 1 / §6 `POST /sessions`).
pub struct CreateSessionInput {
    pub mode: Mode,
    pub channel: Channel,
    pub topic: String,
    pub classroom_id: Option<String>,
    pub config: Option<SessionConfig>,
}

pub struct CreateSessionOutput {
    pub session_id: String,
    pub mode: Mode,
    pub channel: Channel,
}

pub struct ProcessTurnOutput {
    pub turn_id: String,
    pub transcript: Vec<Turn>,
    pub events: Vec<SessionEvent>,
    pub metrics: Metrics,
    pub graph: co_domain::graph::CommunicationGraph,
}

pub struct TaskAssignmentInput {
    pub mode: TaskMode,
    pub groups: Option<Vec<TaskGroup>>,
}

/// Bundles every collaborator the orchestrator depends on (spec.md §1's
/// "out of scope, interfaces only" list), following the workspace model's
/// pattern of an `AppState`/context struct grouped by concern.
pub struct Orchestrator {
    sessions: Arc<SessionStore>,
    locks: Arc<SessionLockMap>,
    loader: Arc<dyn ClassroomLoader>,
    safety: Arc<dyn SafetyFilter>,
    student_agent: Arc<dyn StudentAgent>,
    teacher_agent: Arc<dyn TeacherAgent>,
    #[allow(dead_code)]
    llm: Arc<dyn LlmTool>,
}

impl Orchestrator {
    pub fn new(
        sessions: Arc<SessionStore>,
        locks: Arc<SessionLockMap>,
        loader: Arc<dyn ClassroomLoader>,
        safety: Arc<dyn SafetyFilter>,
        student_agent: Arc<dyn StudentAgent>,
        teacher_agent: Arc<dyn TeacherAgent>,
        llm: Arc<dyn LlmTool>,
    ) -> Self {
        Self {
            sessions,
            locks,
            loader,
            safety,
            student_agent,
            teacher_agent,
            llm,
        }
    }

    // ── op 1 ──────────────────────────────────────────────────────────

    pub async fn create_session(&self, input: CreateSessionInput) -> Result<CreateSessionOutput> {
        if input.topic.trim().is_empty() {
            return Err(Error::InvalidArgument("topic must not be empty".into()));
        }

        let now = Utc::now();
        let config = input.config.unwrap_or_default();

        let mut agents = vec![AgentProfile::teacher(now)];
        if input.mode == Mode::Classroom {
            let classroom_id = input
                .classroom_id
                .clone()
                .ok_or_else(|| Error::InvalidArgument("classroomId is required in classroom mode".into()))?;
            let record = self.loader.load(&classroom_id).await?;
            for s in &record.students {
                agents.push(AgentProfile::student(&s.db_id, s.kind, s.display_name.clone(), now));
            }
        }

        let graph = create_session_communication_graph(input.mode, &agents, &config.relationship_overrides);
        let classroom_runtime = (input.mode == Mode::Classroom)
            .then(|| ClassroomRuntime::new(config.lesson_total_turns, config.simulated_total_seconds));

        let session = Session {
            id: Uuid::new_v4().to_string(),
            mode: input.mode,
            channel: input.channel,
            topic: input.topic,
            config,
            agents,
            turns: Vec::new(),
            events: Vec::new(),
            metrics: Metrics::default(),
            communication_graph: graph,
            classroom_runtime,
            supervisor_hint: None,
            created_at: now,
            updated_at: now,
        };

        let created = self.sessions.create_session(session);
        self.sessions
            .append_events(&created.id, vec![SessionEvent::new(&created.id, EventType::SessionCreated)])?;

        Ok(CreateSessionOutput {
            session_id: created.id,
            mode: created.mode,
            channel: created.channel,
        })
    }

    // ── op 2 ──────────────────────────────────────────────────────────

    pub fn get_session_summary(&self, session_id: &str) -> Result<SessionSummary> {
        let session = self
            .sessions
            .get(session_id)
            .ok_or_else(|| Error::NotFound(format!("session {session_id}")))?;
        Ok(project_session_summary(&session))
    }

    // ── op 4 ──────────────────────────────────────────────────────────

    pub fn submit_supervisor_hint(&self, session_id: &str, hint: String) -> Result<()> {
        let session = self
            .sessions
            .get(session_id)
            .ok_or_else(|| Error::NotFound(format!("session {session_id}")))?;
        if session.channel != Channel::Supervised || session.mode != Mode::Classroom {
            return Err(Error::PreconditionFailed(
                "supervisor hints require a supervised classroom session".into(),
            ));
        }
        self.sessions.push_supervisor_hint(session_id, hint)?;
        self.sessions.append_events(
            session_id,
            vec![SessionEvent::new(session_id, EventType::SupervisorHintReceived)],
        )?;
        Ok(())
    }

    // ── op 5 ──────────────────────────────────────────────────────────

    pub fn submit_task_assignment(&self, session_id: &str, input: TaskAssignmentInput) -> Result<()> {
        let session = self
            .sessions
            .get(session_id)
            .ok_or_else(|| Error::NotFound(format!("session {session_id}")))?;
        if session.mode != Mode::Classroom {
            return Err(Error::PreconditionFailed("task assignment requires classroom mode".into()));
        }
        let student_ids: Vec<String> = session.students().map(|a| a.id.clone()).collect();
        let groups = normalize_submitted_groups(input.mode, input.groups, &student_ids)?;
        let lesson_turn = session.classroom_runtime.as_ref().map(|r| r.lesson_turn).unwrap_or(1);

        let assignment = TaskAssignment {
            mode: input.mode,
            groups,
            assigned_by: AssignedBy::SupervisorUser,
            assigned_at: Utc::now(),
            lesson_turn,
        };

        self.sessions.update_classroom_runtime(session_id, move |r| {
            r.active_task_assignment = Some(assignment);
            r.pending_task_assignment = false;
            r.paused = false;
        })?;
        self.sessions.append_events(
            session_id,
            vec![SessionEvent::new(session_id, EventType::TaskAssignmentSubmitted)],
        )?;
        Ok(())
    }

    // ── op 3 ──────────────────────────────────────────────────────────

    pub async fn process_turn(&self, session_id: &str, message: &str) -> Result<ProcessTurnOutput> {
        let _permit = self.locks.acquire(session_id).await;

        let mode = self
            .sessions
            .get(session_id)
            .ok_or_else(|| Error::NotFound(format!("session {session_id}")))?
            .mode;

        if mode == Mode::Debate {
            return self.process_turn_debate(session_id, message).await;
        }

        let safety = self.safety.inspect(message);
        let request_turn_id = Uuid::new_v4().to_string();

        let prepared = self
            .sessions
            .with_session_mut(session_id, |session| {
                prepare_classroom_cycle(session, &request_turn_id, message, &safety)
            })??;

        let prepared = match prepared {
            CyclePlan::Done(output) => return Ok(output),
            CyclePlan::Prepared(p) => p,
        };

        // Parallel fan-out (spec.md §5): one teacher task + K student tasks,
        // all built from the snapshot committed by `prepare_classroom_cycle`.
        let teacher_future = {
            let agent = self.teacher_agent.clone();
            let input = TeacherAgentInput {
                system_prompt: "You are the class teacher.".to_string(),
                user_prompt: prepared.teacher_prompt.clone(),
                seed: prepared.teacher_seed.clone(),
            };
            tokio::spawn(async move { agent.run(input, None).await })
        };

        let mut student_futures = Vec::new();
        for student_id in &prepared.speaking_students {
            let agent = self.student_agent.clone();
            let system_prompt = format!("You are student {student_id}.");
            let user_prompt = prepared.student_prompts.get(student_id).cloned().unwrap_or_default();
            let allowed_knowledge = prepared
                .student_allowed_knowledge
                .get(student_id)
                .cloned()
                .unwrap_or_default();
            let seed = prepared.student_seeds.get(student_id).cloned().unwrap_or_default();
            let student_id = student_id.clone();
            student_futures.push(tokio::spawn(async move {
                let input = StudentAgentInput {
                    student_id: &student_id,
                    system_prompt,
                    user_prompt,
                    allowed_knowledge,
                    seed,
                };
                let output = agent.run(input, None).await;
                (student_id, output)
            }));
        }

        let (teacher_joined, students_joined) = tokio::join!(teacher_future, join_all(student_futures));

        let teacher_output = teacher_joined.map_err(|_| Error::Internal("teacher worker failed".into()))?;
        let mut student_outputs = Vec::with_capacity(students_joined.len());
        for joined in students_joined {
            let (id, output) = joined.map_err(|_| Error::Internal("student worker failed".into()))?;
            student_outputs.push((id, output));
        }

        let request_turn_id_for_commit = prepared.request_turn_id.clone();
        let mut pre_fanout_events = prepared.events.clone();
        let (turn_id, events_emitted) = self.sessions.with_session_mut(session_id, move |session| {
            commit_cycle_outcomes(session, prepared, teacher_output, student_outputs)
        })??;
        pre_fanout_events.extend(events_emitted);

        let session = self
            .sessions
            .get(session_id)
            .ok_or_else(|| Error::NotFound(format!("session {session_id}")))?;
        let transcript_start = session.turns.len().saturating_sub(12);

        Ok(ProcessTurnOutput {
            turn_id: turn_id.unwrap_or(request_turn_id_for_commit),
            transcript: session.turns[transcript_start..].to_vec(),
            events: pre_fanout_events,
            metrics: session.metrics.clone(),
            graph: session.communication_graph.clone(),
        })
    }

    /// §4.9.12: one user turn → one teacher turn → rubric scoring. No
    /// parallelism, no classroom runtime.
    async fn process_turn_debate(&self, session_id: &str, message: &str) -> Result<ProcessTurnOutput> {
        if message.trim().is_empty() {
            return Err(Error::InvalidArgument("message must not be empty".into()));
        }

        let safety = self.safety.inspect(message);
        let request_turn_id = Uuid::new_v4().to_string();
        let mut events = vec![SessionEvent::new(session_id, EventType::TurnReceived).with_turn(request_turn_id.clone())];

        if !safety.flags.is_empty() {
            events.push(SessionEvent::new(session_id, EventType::SafetyNotice));
        }
        self.sessions.append_events(session_id, events.clone())?;

        if safety.blocked {
            let reason = safety.reason.unwrap_or_else(|| "message blocked".to_string());
            let system_turn = Turn::new(session_id, TurnRole::System, None, reason, &request_turn_id);
            self.sessions.append_turn(session_id, system_turn)?;
            let session = self.sessions.get(session_id).unwrap();
            return Ok(ProcessTurnOutput {
                turn_id: request_turn_id,
                transcript: session.turns.clone(),
                events,
                metrics: session.metrics.clone(),
                graph: session.communication_graph.clone(),
            });
        }

        let user_turn = Turn::new(session_id, TurnRole::User, None, safety.cleaned_text, &request_turn_id);
        self.sessions.append_turn(session_id, user_turn.clone())?;

        let topic = self.sessions.get(session_id).unwrap().topic.clone();
        let teacher_input = TeacherAgentInput {
            system_prompt: format!("You are moderating a debate about {topic}."),
            user_prompt: format!("Respond to: {}", user_turn.content),
            seed: roll_seed(session_id, &request_turn_id, "teacher", "debate"),
        };
        let teacher_output = self.teacher_agent.run(teacher_input, None).await;

        let teacher_turn = Turn::new(
            session_id,
            TurnRole::Teacher,
            Some("teacher".to_string()),
            teacher_output.message.clone(),
            &request_turn_id,
        );
        self.sessions.append_turn(session_id, teacher_turn.clone())?;

        let rubric = score_debate_rubric(&topic, &user_turn.content, &teacher_turn.content);
        self.sessions.update_metrics(session_id, |m| {
            m.avg_comprehension = Some(rubric.overall);
        })?;
        events.push(SessionEvent::new(session_id, EventType::ScoreUpdate).with_payload("rubric", json!(rubric)));
        self.sessions.append_events(session_id, vec![events.last().unwrap().clone()])?;

        let session = self.sessions.get(session_id).unwrap();
        Ok(ProcessTurnOutput {
            turn_id: teacher_turn.id,
            transcript: session.turns.clone(),
            events,
            metrics: session.metrics.clone(),
            graph: session.communication_graph.clone(),
        })
    }
}

// ── Pre-fanout pipeline (steps 1–14) ───────────────────────────────────

enum CyclePlan {
    Done(ProcessTurnOutput),
    Prepared(Box<PreparedCycle>),
}

struct PreparedCycle {
    request_turn_id: String,
    teacher_prompt: String,
    teacher_seed: String,
    speaking_students: Vec<String>,
    student_prompts: HashMap<String, String>,
    student_allowed_knowledge: HashMap<String, Vec<String>>,
    student_seeds: HashMap<String, String>,
    interaction_targets: HashMap<String, InteractionPlan>,
    clarification_student: Option<String>,
    lesson_turn: u32,
    topic: String,
    step_title: String,
    step_goal: String,
    events: Vec<SessionEvent>,
}

struct SafetyOutcome {
    cleaned_text: String,
    flags: Vec<String>,
    blocked: bool,
    reason: Option<String>,
}

impl From<&co_agents::safety::SafetyResult> for SafetyOutcome {
    fn from(r: &co_agents::safety::SafetyResult) -> Self {
        Self {
            cleaned_text: r.cleaned_text.clone(),
            flags: r.flags.clone(),
            blocked: r.blocked,
            reason: r.reason.clone(),
        }
    }
}

fn prepare_classroom_cycle(
    session: &mut Session,
    request_turn_id: &str,
    message: &str,
    safety: &co_agents::safety::SafetyResult,
) -> Result<CyclePlan> {
    let safety = SafetyOutcome::from(safety);
    let session_id = session.id.clone();
    let mut events = Vec::new();

    // Step 1.
    reset_current_turn_edge_activity(&mut session.communication_graph);

    // Step 2.
    events.push(SessionEvent::new(&session_id, EventType::TurnReceived).with_turn(request_turn_id));
    if !safety.flags.is_empty() {
        events.push(
            SessionEvent::new(&session_id, EventType::SafetyNotice)
                .with_payload("flags", json!(safety.flags)),
        );
    }
    session.events.extend(events.clone());

    if safety.blocked {
        let reason = safety.reason.clone().unwrap_or_else(|| "message blocked".to_string());
        let system_turn = Turn::new(&session_id, TurnRole::System, None, reason, request_turn_id);
        session.turns.push(system_turn);
        session.sync_turn_count();
        session.updated_at = Utc::now();
        let transcript_start = session.turns.len().saturating_sub(12);
        return Ok(CyclePlan::Done(ProcessTurnOutput {
            turn_id: request_turn_id.to_string(),
            transcript: session.turns[transcript_start..].to_vec(),
            events,
            metrics: session.metrics.clone(),
            graph: session.communication_graph.clone(),
        }));
    }

    // Step 3.
    let request_turn = Turn::new(&session_id, TurnRole::Teacher, None, safety.cleaned_text.clone(), request_turn_id);
    session.turns.push(request_turn);
    session.sync_turn_count();

    let total_turns = session.config.lesson_total_turns;
    let runtime = session
        .classroom_runtime
        .as_mut()
        .ok_or_else(|| Error::Internal("classroom session missing runtime".into()))?;

    // Step 4.
    let progress = runtime.simulated_elapsed_seconds / runtime.simulated_total_seconds.max(1.0);
    runtime.lesson_turn = lesson_turn_from_progress(progress, total_turns).max(runtime.lesson_turn);
    runtime.phase = phase_for_lesson_turn(runtime.lesson_turn, total_turns);
    let lesson_turn = runtime.lesson_turn;
    let phase = runtime.phase;

    // Step 5.
    if is_time_exhausted(runtime.simulated_elapsed_seconds, runtime.simulated_total_seconds) {
        runtime.completed = true;
        runtime.paused = true;
        runtime.completed_at = Some(Utc::now());
        runtime.completion_reason = Some(CompletionReason::TimeExhausted);
        let completed_event = SessionEvent::new(&session_id, EventType::SessionCompleted);
        session.events.push(completed_event.clone());
        events.push(completed_event);
        rollback_tail_turn(session, request_turn_id);
        session.updated_at = Utc::now();
        let transcript_start = session.turns.len().saturating_sub(12);
        return Ok(CyclePlan::Done(ProcessTurnOutput {
            turn_id: request_turn_id.to_string(),
            transcript: session.turns[transcript_start..].to_vec(),
            events,
            metrics: session.metrics.clone(),
            graph: session.communication_graph.clone(),
        }));
    }

    let topic = session.topic.clone();
    let step = get_fractions_lesson_step(lesson_turn);
    let step_title = step.title.to_string();
    let step_goal = step.delivery_goal.to_string();

    // Step 6: natural decay for every student.
    for agent in session.agents.iter_mut().filter(|a| !a.is_teacher()) {
        let ctx = DecayContext {
            session_id: &session_id,
            request_turn_id,
            student_id: &agent.id,
            lesson_turn,
            total_turns,
            phase,
            board_active: session
                .classroom_runtime
                .as_ref()
                .map(|r| r.interactive_board_active)
                .unwrap_or(false),
        };
        apply_natural_decay(&mut agent.state, &ctx);
    }

    // Step 7: clarification detection.
    let runtime = session.classroom_runtime.as_ref().unwrap();
    let mut clarification_student = runtime
        .active_clarification
        .as_ref()
        .map(|c| c.asking_student_id.clone());

    if clarification_student.is_none() {
        let last_clarified = runtime.last_clarified_question_turn_id.clone();
        let found = session
            .turns
            .iter()
            .rev()
            .find(|t| t.role == TurnRole::Agent && Some(&t.id) != last_clarified.as_ref() && looks_like_question(&t.content))
            .map(|t| (t.id.clone(), t.agent_id.clone()));

        if let Some((question_turn_id, Some(student_id))) = found {
            let comprehension = session
                .agent(&student_id)
                .map(|a| a.state.comprehension)
                .unwrap_or(10.0);
            let required = if comprehension < 5.0 { 2 } else { 1 };
            let runtime = session.classroom_runtime.as_mut().unwrap();
            runtime.active_clarification = Some(ActiveClarification {
                asking_student_id: student_id.clone(),
                question_turn_id,
                required_response_count: required,
                responses_received: 0,
            });
            clarification_student = Some(student_id);
        }
    }

    // Step 8: practice-phase task assignment gate.
    let has_assignment = session
        .classroom_runtime
        .as_ref()
        .map(|r| r.active_task_assignment.is_some())
        .unwrap_or(false);
    if phase == Phase::Practice && !has_assignment {
        if session.channel == Channel::Supervised {
            let runtime = session.classroom_runtime.as_mut().unwrap();
            runtime.paused = true;
            runtime.pending_task_assignment = true;
            let gate_event = SessionEvent::new(&session_id, EventType::TaskAssignmentRequired);
            session.events.push(gate_event.clone());
            events.push(gate_event);
            rollback_tail_turn(session, request_turn_id);
            session.updated_at = Utc::now();
            let transcript_start = session.turns.len().saturating_sub(12);
            return Ok(CyclePlan::Done(ProcessTurnOutput {
                turn_id: request_turn_id.to_string(),
                transcript: session.turns[transcript_start..].to_vec(),
                events,
                metrics: session.metrics.clone(),
                graph: session.communication_graph.clone(),
            }));
        } else {
            let student_ids: Vec<String> = session.students().map(|a| a.id.clone()).collect();
            let start = 1u32;
            let review_start = phase_start_turn(total_turns, Phase::Review);
            let mode = if lesson_turn <= start + 2 {
                TaskMode::Individual
            } else if lesson_turn <= review_start.saturating_sub(1) {
                TaskMode::Pair
            } else {
                TaskMode::Group
            };
            let groups = auto_build_groups(mode, &student_ids);
            let assignment = TaskAssignment {
                mode,
                groups,
                assigned_by: AssignedBy::TeacherAgent,
                assigned_at: Utc::now(),
                lesson_turn,
            };
            let runtime = session.classroom_runtime.as_mut().unwrap();
            runtime.active_task_assignment = Some(assignment);
            runtime.pending_task_assignment = false;
            let submitted_event = SessionEvent::new(&session_id, EventType::TaskAssignmentSubmitted);
            session.events.push(submitted_event.clone());
            events.push(submitted_event);
        }
    }

    // Step 9: interactive board.
    let student_count = session.students().count().max(1);
    let low_attentiveness_count = session.students().filter(|a| a.state.attentiveness <= 4.5).count();
    let ratio = low_attentiveness_count as f32 / student_count as f32;
    let avg_attentiveness: f32 =
        session.students().map(|a| a.state.attentiveness).sum::<f32>() / student_count as f32;

    let runtime = session.classroom_runtime.as_mut().unwrap();
    let was_active = runtime.interactive_board_active;
    let mut just_activated = false;
    if !was_active && ratio >= 0.45 {
        runtime.interactive_board_active = true;
        just_activated = true;
    } else if was_active && ratio <= 0.2 && avg_attentiveness >= 6.5 {
        runtime.interactive_board_active = false;
    }
    let board_active = runtime.interactive_board_active;
    if board_active != was_active {
        let event = SessionEvent::new(&session_id, EventType::InteractiveBoardModeChanged)
            .with_payload("active", json!(board_active));
        session.events.push(event.clone());
        events.push(event);
    }
    if board_active {
        let boost = if just_activated { 1.2 } else { 0.35 };
        for agent in session.agents.iter_mut().filter(|a| !a.is_teacher()) {
            agent.state.attentiveness = co_domain::agent::clamp_score(
                agent.state.attentiveness + boost,
                agent.state.floors().0,
            );
        }
    }

    // Step 10: live actions.
    let mut behavior_alert_student_ids = Vec::new();
    let mut live_action_lines = Vec::new();
    let board_active_for_live = board_active;
    let student_ids: Vec<String> = session.students().map(|a| a.id.clone()).collect();
    for student_id in &student_ids {
        let (outcome, att_delta, beh_delta) = {
            let agent = session.agent(student_id).unwrap();
            resolve_live_action(&agent.state, &session_id, request_turn_id, student_id, phase, board_active_for_live)
        };
        if outcome.behavior_alert {
            behavior_alert_student_ids.push(student_id.clone());
        }
        live_action_lines.push(format!("{student_id}: {} ({})", outcome.live_action.label, outcome.live_action.code));
        let agent = session.agent_mut(student_id).unwrap();
        agent.state.distraction_streak = outcome.distraction_streak;
        agent.state.live_action = outcome.live_action;
        agent.state.attentiveness = co_domain::agent::clamp_score(agent.state.attentiveness + att_delta, agent.state.floors().0);
        agent.state.behavior = co_domain::agent::clamp_score(agent.state.behavior + beh_delta, agent.state.floors().1);
    }

    // Step 11: boredom-joke gate.
    let avg_bored = average_boredness(session.students().map(|a| &a.state));
    let runtime = session.classroom_runtime.as_mut().unwrap();
    let gate = resolve_boredom_gate(
        avg_bored,
        runtime.previous_average_boredness,
        runtime.boredom_rise_streak,
        phase,
        lesson_turn,
        runtime.last_engagement_joke_turn,
    );
    runtime.previous_average_boredness = Some(avg_bored);
    runtime.boredom_rise_streak = gate.rise_streak;
    if gate.should_joke {
        runtime.last_engagement_joke_turn = Some(lesson_turn);
    }

    // Step 12: select responders.
    let config_min = session.config.min_responders.max(1);
    let config_max = session.config.max_responders.max(config_min);
    let responders: Vec<String> = if let Some(student_id) = &clarification_student {
        vec![student_id.clone()]
    } else {
        let rotation = (session.turns.len() + session.events.len()) % student_ids.len().max(1);
        let size = config_max.min(student_ids.len()).max(config_min.min(student_ids.len()));
        (0..size)
            .map(|i| student_ids[(rotation + i) % student_ids.len()].clone())
            .collect()
    };

    // Step 13: graph activations for this cycle.
    let teacher_id = "teacher".to_string();
    if clarification_student.is_none() {
        for student_id in &student_ids {
            activate_communication_edge(
                &mut session.communication_graph,
                ActivateEdgeInput {
                    turn_id: request_turn_id,
                    from: &teacher_id,
                    to: student_id,
                    action_type: ActionType::TeacherBroadcast,
                    payload: Some(ActivationPayload::TeacherBroadcast { text: safety.cleaned_text.clone() }),
                },
            );
        }
        for student_id in &responders {
            activate_communication_edge(
                &mut session.communication_graph,
                ActivateEdgeInput {
                    turn_id: request_turn_id,
                    from: &teacher_id,
                    to: student_id,
                    action_type: ActionType::TeacherToStudent,
                    payload: Some(ActivationPayload::TeacherToStudent { text: safety.cleaned_text.clone() }),
                },
            );
        }
    } else {
        let asking = clarification_student.clone().unwrap();
        activate_communication_edge(
            &mut session.communication_graph,
            ActivateEdgeInput {
                turn_id: request_turn_id,
                from: &teacher_id,
                to: &asking,
                action_type: ActionType::TeacherToStudent,
                payload: Some(ActivationPayload::Free {
                    fields: [
                        ("phase".to_string(), json!("clarification_kickoff")),
                        ("text".to_string(), json!(safety.cleaned_text.clone())),
                    ]
                    .into_iter()
                    .collect(),
                }),
            },
        );
    }

    // Step 14: build prompts.
    let task_context = describe_task_assignment(session.classroom_runtime.as_ref().and_then(|r| r.active_task_assignment.as_ref()));
    let per_student_snapshot = (session.channel == Channel::Unsupervised).then(|| {
        session
            .students()
            .map(|a| {
                format!(
                    "{}: att={:.1} beh={:.1} comp={:.1}",
                    a.id, a.state.attentiveness, a.state.behavior, a.state.comprehension
                )
            })
            .collect::<Vec<_>>()
    });

    let pending_kc_question = session
        .classroom_runtime
        .as_ref()
        .and_then(|r| r.active_knowledge_check.as_ref())
        .map(|kc| kc.question.clone());
    let knowledge_check_due = pending_kc_question.is_none() && lesson_turn % 3 == 0;

    let selected_refs: Vec<&str> = responders.iter().map(|s| s.as_str()).collect();
    let graph_signals: Vec<GraphEdge> = top_edges_by_weight(&session.communication_graph, &selected_refs, 5)
        .into_iter()
        .cloned()
        .collect();
    let active_channels: Vec<co_domain::graph::CommunicationActivation> = session
        .communication_graph
        .current_turn_activations
        .iter()
        .rev()
        .take(6)
        .cloned()
        .collect();

    let teacher_mode = if clarification_student.is_some() {
        TeacherMode::ClarificationDialogue
    } else if !behavior_alert_student_ids.is_empty() {
        TeacherMode::BehaviorIntervention
    } else if gate.should_joke {
        TeacherMode::EngagementJoke
    } else if knowledge_check_due {
        TeacherMode::LectureDelivery
    } else {
        TeacherMode::LectureDelivery
    };

    let near_end = is_near_end(
        session.classroom_runtime.as_ref().unwrap().simulated_elapsed_seconds,
        session.classroom_runtime.as_ref().unwrap().simulated_total_seconds,
    );

    let teacher_prompt = build_teacher_prompt(TeacherPromptInput {
        mode: teacher_mode,
        lesson_turn,
        total_turns,
        step_title: &step_title,
        delivery_goal: &step_goal,
        task_context: task_context.clone(),
        board_active,
        incoming_instruction: &safety.cleaned_text,
        recent_student_signals: live_action_lines.clone(),
        per_student_snapshot,
        live_action_snapshot: live_action_lines,
        bored_avg: gate.avg_bored,
        bored_delta: gate.delta,
        bored_rise_streak: gate.rise_streak,
        behavior_alert_student_ids: behavior_alert_student_ids.clone(),
        engagement_joke_triggered: gate.should_joke,
        pending_knowledge_check_question: pending_kc_question,
        knowledge_check_due,
        graph_signals: graph_signals.iter().collect(),
        active_channels: active_channels.iter().collect(),
        clarification_asking_student: clarification_student.as_deref(),
        near_end,
        supervisor_hint: session.supervisor_hint.as_deref(),
    });
    let teacher_seed = roll_seed(&session_id, request_turn_id, &teacher_id, "teacher_agent");

    // Per-student prompts and interaction plans; silent students are
    // resolved immediately (no LLM call) and excluded from the fan-out.
    let mut student_prompts = HashMap::new();
    let mut student_allowed_knowledge = HashMap::new();
    let mut student_seeds = HashMap::new();
    let mut interaction_targets = HashMap::new();
    let mut speaking_students = Vec::new();

    for student_id in &responders {
        let direct_lines: Vec<String> = session
            .communication_graph
            .current_turn_activations
            .iter()
            .filter(|a| &a.to == student_id)
            .filter(|a| a.payload.as_ref().map(|p| !p.is_low_confidence()).unwrap_or(true))
            .filter_map(|a| a.payload.as_ref().and_then(|p| p.text()).map(|t| t.to_string()))
            .collect();
        let overheard_lines: Vec<String> = session
            .communication_graph
            .current_turn_activations
            .iter()
            .filter(|a| &a.to == student_id)
            .filter(|a| a.payload.as_ref().map(|p| p.is_low_confidence()).unwrap_or(false))
            .filter_map(|a| a.payload.as_ref().and_then(|p| p.text()).map(|t| t.to_string()))
            .collect();

        let allowed = compute_allowed_knowledge(&direct_lines, &overheard_lines, None, &safety.cleaned_text);
        let stimulus_texts: Vec<&str> = direct_lines.iter().map(|s| s.as_str()).collect();
        let stimulus = compute_stimulus_text(&stimulus_texts);

        let received_broadcast = clarification_student.is_none();
        let off_task = session
            .agent(student_id)
            .map(|a| matches!(a.state.live_action.kind, co_domain::agent::LiveActionKind::OffTask))
            .unwrap_or(false);

        let peer_candidates: Vec<PeerCandidate> = student_ids
            .iter()
            .filter(|id| *id != student_id)
            .map(|peer_id| {
                let peer_state = session.agent(peer_id).map(|a| &a.state);
                PeerCandidate {
                    student_id: peer_id.clone(),
                    relationship: relationship_between(&session.communication_graph, student_id, peer_id),
                    averaged_edge_weight: averaged_edge_weight(&session.communication_graph, student_id, peer_id),
                    peer_engagement: peer_state
                        .map(|s| (s.behavior * 0.6 + s.attentiveness * 0.4) / 10.0)
                        .unwrap_or(0.5),
                }
            })
            .collect();

        let interaction = if clarification_student.is_some() {
            crate::interaction::InteractionOutcome {
                plan: InteractionPlan::Teacher,
                delay_ms: 120,
                silent_deltas: None,
            }
        } else {
            let state = session.agent(student_id).unwrap().state.clone();
            plan_interaction(&state, off_task, received_broadcast, &peer_candidates, &session_id, request_turn_id, student_id)
        };

        if let InteractionPlan::Silent = &interaction.plan {
            if let Some((att_d, beh_d)) = interaction.silent_deltas {
                let agent = session.agent_mut(student_id).unwrap();
                agent.state.attentiveness = co_domain::agent::clamp_score(agent.state.attentiveness + att_d, agent.state.floors().0);
                agent.state.behavior = co_domain::agent::clamp_score(agent.state.behavior + beh_d, agent.state.floors().1);
            }
            continue;
        }

        interaction_targets.insert(student_id.clone(), interaction.plan.clone());
        speaking_students.push(student_id.clone());

        let graph_mode_banner = format!("Classroom lesson turn {lesson_turn}/{total_turns}, phase {phase:?}. Stimulus: {stimulus}");
        let prompt = build_student_prompt(StudentPromptInput {
            student_id,
            graph_mode_banner: &graph_mode_banner,
            task_context: task_context.clone(),
            allowed_knowledge: &allowed,
        });

        student_prompts.insert(student_id.clone(), prompt);
        student_allowed_knowledge.insert(student_id.clone(), allowed);
        student_seeds.insert(student_id.clone(), roll_seed(&session_id, request_turn_id, student_id, "agent"));
    }

    session.events.extend(events.clone());
    session.updated_at = Utc::now();

    Ok(CyclePlan::Prepared(Box::new(PreparedCycle {
        request_turn_id: request_turn_id.to_string(),
        teacher_prompt,
        teacher_seed,
        speaking_students,
        student_prompts,
        student_allowed_knowledge,
        student_seeds,
        interaction_targets,
        clarification_student,
        lesson_turn,
        topic,
        step_title,
        step_goal,
        events,
    })))
}

fn phase_start_turn(total_turns: u32, phase: Phase) -> u32 {
    match phase {
        Phase::Lecture => 1,
        Phase::Practice => (total_turns + 2) / 3 + 1,
        Phase::Review => (2 * total_turns + 2) / 3 + 1,
    }
}

fn describe_task_assignment(assignment: Option<&TaskAssignment>) -> Option<String> {
    assignment.map(|a| format!("Active task assignment: {:?} across {} group(s).", a.mode, a.groups.len()))
}

fn rollback_tail_turn(session: &mut Session, request_turn_id: &str) {
    if session.turns.last().map(|t| t.id == *request_turn_id || t.metadata.get("requestTurnId").and_then(|v| v.as_str()) == Some(request_turn_id)).unwrap_or(false) {
        session.turns.pop();
    }
    session.sync_turn_count();
}

// ── Post-fanout commit (steps 16–22) ───────────────────────────────────

fn commit_cycle_outcomes(
    session: &mut Session,
    prepared: Box<PreparedCycle>,
    teacher_output: AgentOutput,
    student_outputs: Vec<(String, AgentOutput)>,
) -> Result<(Option<String>, Vec<SessionEvent>)> {
    let session_id = session.id.clone();
    let request_turn_id = prepared.request_turn_id.clone();
    let mut events = Vec::new();
    let teacher_id = "teacher".to_string();

    events.push(SessionEvent::new(&session_id, EventType::AgentStarted).with_agent(teacher_id.clone()));

    let is_knowledge_check = qualifies_as_knowledge_check(&teacher_output.message);
    let teacher_turn = Turn::new(&session_id, TurnRole::Teacher, Some(teacher_id.clone()), teacher_output.message.clone(), &request_turn_id);
    session.turns.push(teacher_turn.clone());
    events.push(SessionEvent::new(&session_id, EventType::AgentDone).with_agent(teacher_id.clone()).with_turn(teacher_turn.id.clone()));

    if is_knowledge_check {
        let kc = build_knowledge_check(
            &teacher_output.message,
            &prepared.topic,
            &prepared.step_title,
            &prepared.step_goal,
            prepared.speaking_students.clone(),
            prepared.lesson_turn,
        );
        if let Some(runtime) = session.classroom_runtime.as_mut() {
            runtime.active_knowledge_check = Some(kc);
        }
        for student_id in &prepared.speaking_students {
            activate_communication_edge(
                &mut session.communication_graph,
                ActivateEdgeInput {
                    turn_id: &teacher_turn.id,
                    from: &teacher_id,
                    to: student_id,
                    action_type: ActionType::TeacherQuestion,
                    payload: Some(ActivationPayload::TeacherToStudent { text: teacher_output.message.clone() }),
                },
            );
        }
    } else {
        for student_id in &prepared.speaking_students {
            activate_communication_edge(
                &mut session.communication_graph,
                ActivateEdgeInput {
                    turn_id: &teacher_turn.id,
                    from: &teacher_id,
                    to: student_id,
                    action_type: ActionType::TeacherToStudent,
                    payload: Some(ActivationPayload::TeacherToStudent { text: teacher_output.message.clone() }),
                },
            );
        }
    }

    if let Some(asking) = &prepared.clarification_student {
        let all_students: Vec<String> = session.students().map(|a| a.id.clone()).collect();
        for student_id in all_students.iter().filter(|id| *id != asking) {
            activate_communication_edge(
                &mut session.communication_graph,
                ActivateEdgeInput {
                    turn_id: &teacher_turn.id,
                    from: &teacher_id,
                    to: student_id,
                    action_type: ActionType::TeacherBroadcast,
                    payload: Some(ActivationPayload::Free {
                        fields: [
                            ("confidence".to_string(), json!("low")),
                            ("text".to_string(), json!(summarize(&teacher_output.message))),
                        ]
                        .into_iter()
                        .collect(),
                    }),
                },
            );
        }
    }

    // Step 17: student turns + edge activations per interaction plan.
    for (student_id, output) in &student_outputs {
        events.push(SessionEvent::new(&session_id, EventType::AgentStarted).with_agent(student_id.clone()));
        let student_turn = Turn::new(&session_id, TurnRole::Agent, Some(student_id.clone()), output.message.clone(), &request_turn_id);
        session.turns.push(student_turn.clone());
        events.push(SessionEvent::new(&session_id, EventType::AgentDone).with_agent(student_id.clone()).with_turn(student_turn.id.clone()));

        if let Some(patch) = &output.state_patch {
            if let Some(agent) = session.agent_mut(student_id) {
                agent.state.apply_patch(patch);
            }
        }

        match prepared.interaction_targets.get(student_id) {
            Some(InteractionPlan::Peer { target_id }) => {
                activate_communication_edge(
                    &mut session.communication_graph,
                    ActivateEdgeInput {
                        turn_id: &student_turn.id,
                        from: student_id,
                        to: target_id,
                        action_type: ActionType::StudentToStudent,
                        payload: Some(ActivationPayload::StudentToStudent { text: output.message.clone() }),
                    },
                );
            }
            _ => {
                activate_communication_edge(
                    &mut session.communication_graph,
                    ActivateEdgeInput {
                        turn_id: &student_turn.id,
                        from: student_id,
                        to: &teacher_id,
                        action_type: ActionType::StudentToTeacher,
                        payload: Some(ActivationPayload::StudentToTeacher { text: output.message.clone() }),
                    },
                );
            }
        }

        if Some(student_id) == prepared.clarification_student.as_ref() {
            if let Some(runtime) = session.classroom_runtime.as_mut() {
                if let Some(active) = runtime.active_clarification.as_mut() {
                    active.responses_received += 1;
                    if active.responses_received >= active.required_response_count {
                        let question_turn_id = active.question_turn_id.clone();
                        runtime.active_clarification = None;
                        runtime.last_clarified_question_turn_id = Some(question_turn_id);
                    }
                }
            }
        }
    }

    // Step 18: attentiveness boosts for direct recipients / passive listeners.
    for student_id in &prepared.speaking_students {
        if let Some(agent) = session.agent_mut(student_id) {
            let boost = if prepared.clarification_student.is_some() { 0.9 } else { 0.7 };
            agent.state.attentiveness = co_domain::agent::clamp_score(agent.state.attentiveness + boost, agent.state.floors().0);
        }
    }
    if prepared.clarification_student.is_some() {
        let speaking: std::collections::HashSet<&String> = prepared.speaking_students.iter().collect();
        let passive: Vec<String> = session
            .students()
            .map(|a| a.id.clone())
            .filter(|id| !speaking.contains(id))
            .collect();
        for student_id in passive {
            if let Some(agent) = session.agent_mut(&student_id) {
                agent.state.attentiveness = co_domain::agent::clamp_score(agent.state.attentiveness + 0.2, agent.state.floors().0);
            }
        }
    }

    // Step 19: knowledge-check reply evaluation.
    let mut praise_turn = None;
    if let Some(runtime) = session.classroom_runtime.as_mut() {
        if let Some(kc) = runtime.active_knowledge_check.clone() {
            let expired = kc.is_expired(prepared.lesson_turn);
            let mut resolved = kc.resolved_student_ids.clone();
            let mut praised: Option<String> = None;

            for (student_id, output) in &student_outputs {
                if !kc.target_student_ids.contains(student_id) || resolved.contains(student_id) {
                    continue;
                }
                if evaluate_reply(&kc.expected_keywords, &output.message) {
                    resolved.push(student_id.clone());
                    praised = Some(student_id.clone());
                }
            }

            if let Some(student_id) = &praised {
                if let Some(agent) = session.agent_mut(student_id) {
                    agent.state.attentiveness = co_domain::agent::clamp_score(agent.state.attentiveness + 0.7, agent.state.floors().0);
                    agent.state.behavior = co_domain::agent::clamp_score(agent.state.behavior + 0.45, agent.state.floors().1);
                    agent.state.comprehension = co_domain::agent::clamp_score(agent.state.comprehension + 1.0, agent.state.floors().2);
                    agent.state.live_action = co_domain::agent::LiveAction {
                        code: "task_focus".into(),
                        kind: co_domain::agent::LiveActionKind::OnTask,
                        label: "focused after praise".into(),
                        severity: co_domain::agent::Severity::Success,
                        at: Utc::now(),
                    };
                    agent.state.distraction_streak = 0;
                    agent.state.post_praise_fatigue_turns = agent.state.post_praise_fatigue_turns.saturating_add(3).min(8);
                    agent.state.post_praise_decay_boost = (agent.state.post_praise_decay_boost + 0.1).min(0.5);
                }
                praise_turn = Some(format!("Great work, {student_id}! {}", kc.question));
            }

            let runtime = session.classroom_runtime.as_mut().unwrap();
            let unresolved_remaining = kc
                .target_student_ids
                .iter()
                .any(|id| !resolved.contains(id));
            if !unresolved_remaining || expired {
                runtime.active_knowledge_check = None;
            } else {
                let mut kc = kc;
                kc.resolved_student_ids = resolved;
                runtime.active_knowledge_check = Some(kc);
            }
        }
    }

    if let Some(praise_text) = praise_turn {
        let turn_id = Uuid::new_v4().to_string();
        let praise_t = Turn::new(&session_id, TurnRole::Teacher, Some(teacher_id.clone()), praise_text.clone(), &turn_id)
            .with_meta("teacherMode", json!(TeacherMode::KnowledgeCheckPraise.as_str()));
        session.turns.push(praise_t.clone());
        if let Some(target) = session
            .classroom_runtime
            .as_ref()
            .and_then(|r| r.active_knowledge_check.as_ref())
            .map(|kc| kc.target_student_ids.clone())
            .and_then(|ids| ids.first().cloned())
        {
            activate_communication_edge(
                &mut session.communication_graph,
                ActivateEdgeInput {
                    turn_id: &praise_t.id,
                    from: &teacher_id,
                    to: &target,
                    action_type: ActionType::TeacherPraise,
                    payload: Some(ActivationPayload::TeacherPraise { text: praise_text }),
                },
            );
        }
    }

    // Step 20: speech-seconds + simulated time advance.
    let spoken_seconds: f64 = session
        .turns
        .iter()
        .filter(|t| t.metadata.get("requestTurnId").and_then(|v| v.as_str()) == Some(request_turn_id.as_str()))
        .map(|t| {
            let wpm = if t.role == TurnRole::Teacher { TEACHER_WPM } else { STUDENT_WPM };
            estimate_speech_seconds(&t.content, wpm)
        })
        .sum();
    let interaction_overhead = prepared.speaking_students.len() as f64 * 1.5;

    if let Some(runtime) = session.classroom_runtime.as_mut() {
        let total = runtime.simulated_total_seconds;
        runtime.simulated_elapsed_seconds = advance_simulation_time(runtime.simulated_elapsed_seconds, spoken_seconds + interaction_overhead, total);
        if is_time_exhausted(runtime.simulated_elapsed_seconds, total) {
            runtime.completed = true;
            runtime.completed_at = Some(Utc::now());
            runtime.completion_reason = Some(CompletionReason::TimeExhausted);
            let completed_event = SessionEvent::new(&session_id, EventType::SessionCompleted);
            session.events.push(completed_event.clone());
            events.push(completed_event);
        }
    }

    // Step 21: task review in review phase.
    let phase = session.classroom_runtime.as_ref().map(|r| r.phase);
    if phase == Some(Phase::Review) {
        let assignment = session
            .classroom_runtime
            .as_ref()
            .and_then(|r| r.active_task_assignment.clone());
        if let Some(assignment) = assignment {
            for group in &assignment.groups {
                for student_id in &group.student_ids {
                    let solved = if let Some(agent) = session.agent_mut(student_id) {
                        Some(apply_task_review(&mut agent.state))
                    } else {
                        None
                    };
                    if let Some(solved) = solved {
                        activate_communication_edge(
                            &mut session.communication_graph,
                            ActivateEdgeInput {
                                turn_id: &request_turn_id,
                                from: &teacher_id,
                                to: student_id,
                                action_type: ActionType::TaskFeedback,
                                payload: Some(ActivationPayload::TaskFeedback {
                                    text: if solved { "Well done on the task.".into() } else { "Let's revisit this task.".into() },
                                    solved,
                                }),
                            },
                        );
                    }
                }
            }
            let review_event = SessionEvent::new(&session_id, EventType::TaskReviewCompleted);
            session.events.push(review_event.clone());
            events.push(review_event);
            if let Some(runtime) = session.classroom_runtime.as_mut() {
                runtime.last_review_turn = Some(prepared.lesson_turn);
            }
        }
    }

    // Step 22: recompute classroom metrics.
    recompute_metrics(session);

    session.events.extend(events.clone());
    session.sync_turn_count();
    session.updated_at = Utc::now();

    Ok((Some(teacher_turn.id), events))
}

fn summarize(text: &str) -> String {
    let words: Vec<&str> = text.split_whitespace().take(12).collect();
    words.join(" ")
}

fn recompute_metrics(session: &mut Session) {
    let students: Vec<&AgentKind> = session.agents.iter().filter(|a| !a.is_teacher()).map(|a| &a.kind).collect();
    let count = students.len().max(1) as f32;
    let avg_att: f32 = session.students().map(|a| a.state.attentiveness).sum::<f32>() / count;
    let avg_beh: f32 = session.students().map(|a| a.state.behavior).sum::<f32>() / count;
    let avg_comp: f32 = session.students().map(|a| a.state.comprehension).sum::<f32>() / count;
    let engaged = session.students().filter(|a| a.state.attentiveness >= 6.0).count() as f32;
    let clear = session.students().filter(|a| a.state.comprehension >= 6.0).count() as f32;

    session.metrics.avg_attentiveness = Some(avg_att);
    session.metrics.avg_behavior = Some(avg_beh);
    session.metrics.avg_comprehension = Some(avg_comp);
    session.metrics.engagement_pct = Some((engaged / count) * 100.0);
    session.metrics.clarity_pct = Some((clear / count) * 100.0);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_start_turn_matches_boundaries_for_nine() {
        assert_eq!(phase_start_turn(9, Phase::Practice), 4);
        assert_eq!(phase_start_turn(9, Phase::Review), 7);
    }

    #[test]
    fn summarize_truncates_to_twelve_words() {
        let long = (0..20).map(|i| i.to_string()).collect::<Vec<_>>().join(" ");
        assert_eq!(summarize(&long).split_whitespace().count(), 12);
    }
}
