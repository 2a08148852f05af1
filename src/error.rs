//! Error types for the dispatcher core.

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DispatcherError {
    #[error("Storage error: {0}")]
    StorageError(String),
    #[error("State transition error: {0}")]
    StateTransitionError(String),
    #[error("Queue error: {0}")]
    QueueError(String),
    #[error("Cache error: {0}")]
    CacheError(String),
    #[error("Event error: {0}")]
    EventError(String),
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("Configuration error: {0}")]
    ConfigurationError(String),
    #[error("Task {task_id} is in invalid state {current_state}, expected one of {expected_states:?}")]
    InvalidTaskState {
        task_id: Uuid,
        current_state: String,
        expected_states: Vec<String>,
    },
    #[error("Task {task_id} has no function reference")]
    MissingFunction { task_id: Uuid },
    #[error("Processor session rejected: {0}")]
    ProcessorSessionError(String),
}

impl From<serde_json::Error> for DispatcherError {
    fn from(error: serde_json::Error) -> Self {
        DispatcherError::ValidationError(format!("JSON serialization error: {error}"))
    }
}

pub type Result<T> = std::result::Result<T, DispatcherError>;
