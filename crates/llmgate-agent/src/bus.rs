use std::collections::HashMap;

use tokio::sync::{RwLock, mpsc};

use crate::events::AgentEvent;

const CHANNEL_CAPACITY: usize = 256;

/// Per-session pub/sub: one bounded channel per live session.
///
/// Channels are non-retentive: a subscriber that arrives after events were
/// published never sees them, which is why the SSE bridge insists on the
/// `worker_ack` handshake. Publishing to a session nobody subscribed (or
/// whose client went away) silently drops the event; the worker never
/// notices a disconnect.
#[derive(Default)]
pub struct SessionBus {
    channels: RwLock<HashMap<String, mpsc::Sender<AgentEvent>>>,
}

impl SessionBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open the session channel and hand back its receiving end. Must be
    /// called before the task is enqueued, or early events are lost.
    pub async fn subscribe(&self, session_id: &str) -> mpsc::Receiver<AgentEvent> {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        self.channels
            .write()
            .await
            .insert(session_id.to_string(), tx);
        rx
    }

    /// Returns false when the event was dropped (unknown session or
    /// subscriber gone).
    pub async fn publish(&self, session_id: &str, event: AgentEvent) -> bool {
        let sender = {
            let guard = self.channels.read().await;
            guard.get(session_id).cloned()
        };
        let Some(sender) = sender else {
            return false;
        };
        if sender.send(event).await.is_err() {
            // Receiver dropped: the delivery stream is gone for good.
            self.channels.write().await.remove(session_id);
            return false;
        }
        true
    }

    /// Tear the session channel down; the subscriber sees end-of-stream.
    pub async fn close(&self, session_id: &str) {
        self.channels.write().await.remove(session_id);
    }

    pub async fn session_count(&self) -> usize {
        self.channels.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_reaches_subscriber_in_order() {
        let bus = SessionBus::new();
        let mut rx = bus.subscribe("s1").await;

        assert!(
            bus.publish(
                "s1",
                AgentEvent::WorkerAck {
                    session_id: "s1".into()
                }
            )
            .await
        );
        assert!(
            bus.publish("s1", AgentEvent::ThoughtStream { text: "a".into() })
                .await
        );

        assert!(matches!(
            rx.recv().await.unwrap(),
            AgentEvent::WorkerAck { .. }
        ));
        assert!(matches!(
            rx.recv().await.unwrap(),
            AgentEvent::ThoughtStream { .. }
        ));
    }

    #[tokio::test]
    async fn publish_without_subscriber_is_dropped() {
        let bus = SessionBus::new();
        assert!(!bus.publish("ghost", AgentEvent::ThoughtEnd {}).await);
    }

    #[tokio::test]
    async fn dropped_receiver_detaches_session() {
        let bus = SessionBus::new();
        let rx = bus.subscribe("s1").await;
        drop(rx);

        assert!(!bus.publish("s1", AgentEvent::ThoughtEnd {}).await);
        assert_eq!(bus.session_count().await, 0);
    }

    #[tokio::test]
    async fn close_ends_the_stream() {
        let bus = SessionBus::new();
        let mut rx = bus.subscribe("s1").await;
        bus.close("s1").await;
        assert!(rx.recv().await.is_none());
    }
}
