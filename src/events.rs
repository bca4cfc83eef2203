use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// One completed action.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActionEvent {
    pub session_id: Uuid,
    pub description: String,
    pub timestamp: DateTime<Utc>,
    pub duration_ms: u64,
}

/// Broadcasts a description after every successful action. Purely
/// observational: publishing never fails, even with nobody listening.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<ActionEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ActionEvent> {
        self.sender.subscribe()
    }

    pub fn publish(&self, event: ActionEvent) {
        let _ = self.sender.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(description: &str) -> ActionEvent {
        ActionEvent {
            session_id: Uuid::new_v4(),
            description: description.to_string(),
            timestamp: Utc::now(),
            duration_ms: 3,
        }
    }

    #[tokio::test]
    async fn subscribers_receive_published_events() {
        let bus = EventBus::default();
        let mut receiver = bus.subscribe();
        bus.publish(event("Clicked button with label Save 1 times"));
        let received = receiver.recv().await.unwrap();
        assert_eq!(received.description, "Clicked button with label Save 1 times");
    }

    #[test]
    fn publishing_without_listeners_is_fine() {
        EventBus::new(0).publish(event("nobody listens"));
    }
}
