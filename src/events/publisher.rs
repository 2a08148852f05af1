//! Broadcast publisher for follow-up events.

use crate::constants::events;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Event that has been published.
#[derive(Debug, Clone)]
pub struct DispatchEvent {
    pub name: String,
    pub context: Value,
    pub published_at: DateTime<Utc>,
}

/// High-throughput publisher for scheduling lifecycle events.
#[derive(Debug, Clone)]
pub struct EventPublisher {
    sender: broadcast::Sender<DispatchEvent>,
}

impl EventPublisher {
    /// Create a new event publisher with the specified channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event with the given name and context payload. Having
    /// no subscribers is not an error; events exist for whoever is
    /// listening.
    pub fn publish(&self, event_name: impl Into<String>, context: Value) {
        let event = DispatchEvent {
            name: event_name.into(),
            context,
            published_at: Utc::now(),
        };
        let _ = self.sender.send(event);
    }

    /// Publish a "re-check whether this task can finish" follow-up.
    pub fn publish_check_task_completion(&self, exec_context_id: Uuid, task_id: Uuid) {
        self.publish(
            events::CHECK_TASK_COMPLETION,
            json!({
                "exec_context_id": exec_context_id,
                "task_id": task_id,
            }),
        );
    }

    /// Publish a terminal-state notification for a task.
    pub fn publish_task_finished(&self, exec_context_id: Uuid, task_id: Uuid, state: &str) {
        self.publish(
            events::TASK_FINISHED,
            json!({
                "exec_context_id": exec_context_id,
                "task_id": task_id,
                "state": state,
            }),
        );
    }

    pub fn publish_context_deleted(&self, exec_context_id: Uuid) {
        self.publish(
            events::CONTEXT_DELETED,
            json!({ "exec_context_id": exec_context_id }),
        );
    }

    /// Subscribe to events.
    pub fn subscribe(&self) -> broadcast::Receiver<DispatchEvent> {
        self.sender.subscribe()
    }

    /// Get the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventPublisher {
    fn default() -> Self {
        Self::new(crate::constants::DEFAULT_EVENT_CHANNEL_CAPACITY)
    }
}

/// Error types for event publishing.
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("Event channel is closed")]
    ChannelClosed,
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
