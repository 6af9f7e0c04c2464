use std::sync::Arc;
use std::time::Instant;

use co_orchestrator::Orchestrator;

use crate::realtime::RealtimeSink;

/// Shared application state passed to every API handler (spec.md §6).
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub realtime: Arc<dyn RealtimeSink>,
    /// Process start time, for `GET /health`'s `uptime` field.
    pub started_at: Instant,
}
