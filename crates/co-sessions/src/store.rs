//! Session Memory (spec.md §4.1).
//!
//! Generalizes the workspace model's `SessionStore`: an in-process map
//! guarded by a `RwLock`, with one entry per session. Unlike the workspace
//! model this store holds the full `Session` aggregate rather than a thin
//! token-accounting entry — the classroom simulation has no persistence
//! requirement of its own (SPEC_FULL.md §2), so nothing is written to disk.

use std::collections::HashMap;

use chrono::Utc;
use parking_lot::RwLock;

use co_domain::agent::StatePatch;
use co_domain::error::{Error, Result};
use co_domain::event::SessionEvent;
use co_domain::runtime::ClassroomRuntime;
use co_domain::session::{Metrics, Session};
use co_domain::turn::Turn;

/// In-process store for every live `Session`. Owned exclusively for the
/// session's lifetime (spec.md §3): created once, mutated turn by turn,
/// discarded when the process exits — there is no `deleteSession`
/// operation in spec.md, so none is exposed here either.
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Session>>,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore {
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Insert a fully constructed session (agents, graph, and config are
    /// assembled by `co-orchestrator::create_session` before this is
    /// called — this store only owns storage mechanics).
    pub fn create_session(&self, session: Session) -> Session {
        let id = session.id.clone();
        tracing::info!(session_id = %id, mode = ?session.mode, "session created");
        self.sessions.write().insert(id, session.clone());
        session
    }

    pub fn get(&self, session_id: &str) -> Option<Session> {
        self.sessions.read().get(session_id).cloned()
    }

    pub fn list(&self) -> Vec<Session> {
        self.sessions.read().values().cloned().collect()
    }

    /// General-purpose exclusive mutation, used by `co-orchestrator` for
    /// pipeline steps that touch several fields of a `Session` atomically
    /// (rollback, runtime transitions, graph commits). Every specific
    /// method below is expressed in terms of this one.
    pub fn with_session_mut<F, T>(&self, session_id: &str, f: F) -> Result<T>
    where
        F: FnOnce(&mut Session) -> T,
    {
        let mut sessions = self.sessions.write();
        let session = sessions
            .get_mut(session_id)
            .ok_or_else(|| Error::NotFound(format!("session {session_id}")))?;
        let out = f(session);
        session.sync_turn_count();
        session.updated_at = Utc::now();
        Ok(out)
    }

    pub fn append_turn(&self, session_id: &str, turn: Turn) -> Result<()> {
        self.with_session_mut(session_id, |s| s.turns.push(turn))
    }

    pub fn append_events(&self, session_id: &str, events: Vec<SessionEvent>) -> Result<()> {
        self.with_session_mut(session_id, |s| s.events.extend(events))
    }

    /// Merges numeric fields (additive deltas) and replaces `liveAction`
    /// wholesale, per spec.md §4.1's documented `updateAgentState` merge
    /// semantics.
    pub fn update_agent_state(
        &self,
        session_id: &str,
        agent_id: &str,
        patch: &StatePatch,
    ) -> Result<()> {
        self.with_session_mut(session_id, |s| -> Result<()> {
            let agent = s
                .agent_mut(agent_id)
                .ok_or_else(|| Error::NotFound(format!("agent {agent_id}")))?;
            agent.state.apply_patch(patch);
            Ok(())
        })?
    }

    pub fn update_metrics<F>(&self, session_id: &str, mutator: F) -> Result<()>
    where
        F: FnOnce(&mut Metrics),
    {
        self.with_session_mut(session_id, |s| mutator(&mut s.metrics))
    }

    /// Copy-on-write: the runtime is cloned out, mutated, then written
    /// back as a whole rather than mutated through a held reference.
    pub fn update_classroom_runtime<F>(&self, session_id: &str, mutator: F) -> Result<()>
    where
        F: FnOnce(&mut ClassroomRuntime),
    {
        self.with_session_mut(session_id, |s| -> Result<()> {
            let mut runtime = s
                .classroom_runtime
                .clone()
                .ok_or_else(|| Error::PreconditionFailed("no classroom runtime on session".into()))?;
            mutator(&mut runtime);
            s.classroom_runtime = Some(runtime);
            Ok(())
        })?
    }

    /// Single-slot queue: a new hint overwrites any unconsumed one.
    pub fn push_supervisor_hint(&self, session_id: &str, hint: String) -> Result<()> {
        self.with_session_mut(session_id, |s| s.supervisor_hint = Some(hint))
    }

    /// Takes and clears the pending hint, if any.
    pub fn consume_supervisor_hint(&self, session_id: &str) -> Result<Option<String>> {
        self.with_session_mut(session_id, |s| s.supervisor_hint.take())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use co_domain::agent::AgentProfile;
    use co_domain::config::SessionConfig;
    use co_domain::graph::CommunicationGraph;
    use co_domain::session::{Channel, Mode};

    fn sample_session() -> Session {
        let now = Utc::now();
        Session {
            id: "s1".into(),
            mode: Mode::Classroom,
            channel: Channel::Unsupervised,
            topic: "Fractions".into(),
            config: SessionConfig::default(),
            agents: vec![AgentProfile::teacher(now)],
            turns: vec![],
            events: vec![],
            metrics: Metrics::default(),
            communication_graph: CommunicationGraph {
                nodes: vec![],
                edges: vec![],
                activations: vec![],
                current_turn_activations: vec![],
            },
            classroom_runtime: Some(ClassroomRuntime::new(9, 2700.0)),
            supervisor_hint: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn turn_count_tracks_turns_len() {
        let store = SessionStore::new();
        store.create_session(sample_session());
        store
            .append_turn(
                "s1",
                Turn::new("s1", co_domain::turn::TurnRole::Teacher, None, "hi", "rt1"),
            )
            .unwrap();
        let session = store.get("s1").unwrap();
        assert_eq!(session.metrics.turn_count, 1);
        assert_eq!(session.turns.len(), 1);
    }

    #[test]
    fn supervisor_hint_is_single_slot() {
        let store = SessionStore::new();
        store.create_session(sample_session());
        store.push_supervisor_hint("s1", "be gentle".into()).unwrap();
        store.push_supervisor_hint("s1", "ask more questions".into()).unwrap();
        let consumed = store.consume_supervisor_hint("s1").unwrap();
        assert_eq!(consumed.as_deref(), Some("ask more questions"));
        assert_eq!(store.consume_supervisor_hint("s1").unwrap(), None);
    }

    #[test]
    fn unknown_session_is_not_found() {
        let store = SessionStore::new();
        let err = store.update_metrics("missing", |_| {}).unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }
}
