use super::{WorldEvent, WorldListener};
use crate::constants::defaults::EVENT_CHANNEL_CAPACITY;
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::warn;

/// Fan-out of world events to any number of async subscribers
#[derive(Debug, Clone)]
pub struct EventPublisher {
    sender: broadcast::Sender<PublishedEvent>,
}

/// Event that has been published
#[derive(Debug, Clone)]
pub struct PublishedEvent {
    pub name: String,
    pub context: Value,
    pub published_at: chrono::DateTime<chrono::Utc>,
}

impl EventPublisher {
    /// Create a new event publisher with the specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event with the given name and context
    pub fn publish(&self, event_name: impl Into<String>, context: Value) -> Result<(), PublishError> {
        let event = PublishedEvent {
            name: event_name.into(),
            context,
            published_at: chrono::Utc::now(),
        };

        // No subscribers is not an error
        let _ = self.sender.send(event);
        Ok(())
    }

    /// Publish a world event under its event type
    pub fn publish_world_event(&self, event: &WorldEvent) -> Result<(), PublishError> {
        let context = serde_json::to_value(event)?;
        self.publish(event.event_type(), context)
    }

    /// Subscribe to events
    pub fn subscribe(&self) -> broadcast::Receiver<PublishedEvent> {
        self.sender.subscribe()
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl WorldListener for EventPublisher {
    fn on_world_event(&mut self, event: &WorldEvent) {
        if let Err(e) = self.publish_world_event(event) {
            warn!(event = event.event_type(), error = %e, "Failed to publish world event");
        }
    }
}

/// Error types for event publishing
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("Event channel is closed")]
    ChannelClosed,
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Default for EventPublisher {
    fn default() -> Self {
        Self::new(EVENT_CHANNEL_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state_machine::PsState;

    #[tokio::test]
    async fn test_subscriber_receives_world_event() {
        let mut publisher = EventPublisher::default();
        let mut receiver = publisher.subscribe();
        assert_eq!(publisher.subscriber_count(), 1);

        publisher.on_world_event(&WorldEvent::PitStopUpdated {
            ps_id: 7,
            state: PsState::Requested,
        });

        let received = receiver.recv().await.unwrap();
        assert_eq!(received.name, "pit_stop.updated");
        assert_eq!(received.context["ps_id"], 7);
        assert_eq!(received.context["state"], "requested");
    }

    #[test]
    fn test_publish_without_subscribers() {
        let publisher = EventPublisher::new(4);
        assert!(publisher.publish("anything", Value::Null).is_ok());
    }
}
