//! Event types for the SPZ invalidation bus
//!
//! Events carry identifiers only, never row contents: a subscriber that
//! receives one re-runs the same fetch its polling loop would have run.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Invalidation events broadcast to polling streams
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PlannerEvent {
    /// A message between these two users was inserted, read or deleted
    MessagesChanged {
        sender_id: String,
        receiver_id: String,
    },

    /// A user's identity metadata (admin/approved flags) was patched
    ApprovalChanged {
        user_id: String,
    },
}

impl PlannerEvent {
    /// Whether this event may change data visible to `user_id`
    pub fn concerns(&self, user_id: &str) -> bool {
        match self {
            PlannerEvent::MessagesChanged {
                sender_id,
                receiver_id,
            } => sender_id == user_id || receiver_id == user_id,
            PlannerEvent::ApprovalChanged { user_id: target } => target == user_id,
        }
    }
}

/// Broadcast bus for [`PlannerEvent`]s
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<PlannerEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with the given channel capacity
    ///
    /// Slow subscribers that fall more than `capacity` events behind see a
    /// lag error; polling covers anything they missed.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<PlannerEvent> {
        self.tx.subscribe()
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: PlannerEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_changed_concerns_both_sides() {
        let event = PlannerEvent::MessagesChanged {
            sender_id: "a".into(),
            receiver_id: "b".into(),
        };
        assert!(event.concerns("a"));
        assert!(event.concerns("b"));
        assert!(!event.concerns("c"));
    }

    #[tokio::test]
    async fn test_subscriber_receives_emitted_event() {
        let bus = EventBus::new(8);
        let mut rx = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 1);

        bus.emit_lossy(PlannerEvent::ApprovalChanged {
            user_id: "u1".into(),
        });

        let event = rx.recv().await.unwrap();
        assert_eq!(
            event,
            PlannerEvent::ApprovalChanged {
                user_id: "u1".into()
            }
        );
    }

    #[test]
    fn test_emit_without_subscribers_is_silent() {
        let bus = EventBus::new(4);
        bus.emit_lossy(PlannerEvent::ApprovalChanged {
            user_id: "nobody".into(),
        });
        assert_eq!(bus.capacity(), 4);
    }

    #[test]
    fn test_event_serializes_with_type_tag() {
        let json = serde_json::to_value(PlannerEvent::ApprovalChanged {
            user_id: "u1".into(),
        })
        .unwrap();
        assert_eq!(json["type"], "ApprovalChanged");
    }
}
