//! Realtime push layer (spec.md §6 "Realtime channel") — interfaces only,
//! per spec.md §1's out-of-scope list. No websocket transport is wired up;
//! `RealtimeSink` is the seam a future transport would implement.

use serde_json::Value;
use tokio::sync::broadcast;

/// One message broadcast to subscribers of a session's realtime namespace.
#[derive(Debug, Clone)]
pub struct RealtimeMessage {
    pub session_id: String,
    /// Event name from spec.md §6's taxonomy, e.g.
    /// `"simulation.turn_processed"`.
    pub event: String,
    pub payload: Value,
}

/// Publishes realtime events for a session. Implementations never block a
/// `processTurn` call on slow subscribers — `publish` is fire-and-forget.
pub trait RealtimeSink: Send + Sync {
    fn publish(&self, message: RealtimeMessage);
}

/// In-process implementation backed by a `tokio::sync::broadcast` channel.
/// Subscribers (e.g. a future websocket handler) call `subscribe()` and
/// filter by `session_id` themselves; there is no per-session fan-out here,
/// matching "implementation-agnostic" / "interfaces only" from spec.md §1.
pub struct BroadcastRealtimeSink {
    sender: broadcast::Sender<RealtimeMessage>,
}

impl BroadcastRealtimeSink {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RealtimeMessage> {
        self.sender.subscribe()
    }
}

impl Default for BroadcastRealtimeSink {
    fn default() -> Self {
        Self::new(256)
    }
}

impl RealtimeSink for BroadcastRealtimeSink {
    fn publish(&self, message: RealtimeMessage) {
        // No subscribers is the common case outside of tests; a send error
        // just means nobody is listening right now.
        let _ = self.sender.send(message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn publish_without_subscribers_does_not_panic() {
        let sink = BroadcastRealtimeSink::default();
        sink.publish(RealtimeMessage {
            session_id: "s1".into(),
            event: "simulation.session_created".into(),
            payload: json!({}),
        });
    }

    #[tokio::test]
    async fn subscriber_receives_published_message() {
        let sink = BroadcastRealtimeSink::default();
        let mut rx = sink.subscribe();
        sink.publish(RealtimeMessage {
            session_id: "s1".into(),
            event: "simulation.turn_processed".into(),
            payload: json!({"turnId": "t1"}),
        });
        let received = rx.recv().await.unwrap();
        assert_eq!(received.session_id, "s1");
        assert_eq!(received.event, "simulation.turn_processed");
    }
}
