use serde::{Deserialize, Serialize};
use std::fmt;

/// Task lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    /// Produced by the pipeline engine but not yet queued
    None,
    /// Waiting in a task group for assignment
    InQueue,
    /// Being checked against the result cache
    CheckCache,
    /// Handed to a processor, not yet confirmed started
    Assigned,
    /// A processor is executing the task
    InProgress,
    /// All outputs ready, task finished successfully
    Completed,
    /// Task failed
    Error,
}

impl TaskState {
    /// Check if this is a terminal state (no further transitions allowed
    /// without an explicit retry).
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed)
    }

    /// Check if the task is currently the responsibility of a processor.
    pub fn is_dispatched(&self) -> bool {
        matches!(self, Self::Assigned | Self::InProgress)
    }

    /// Valid transitions out of this state.
    pub fn can_transition_to(&self, target: TaskState) -> bool {
        use TaskState::*;
        matches!(
            (self, target),
            (None, InQueue)
                | (InQueue, CheckCache)
                | (InQueue, Assigned)
                | (CheckCache, InProgress)
                | (CheckCache, Assigned)
                | (CheckCache, Completed)
                | (Assigned, InProgress)
                | (Assigned, InQueue)
                | (Assigned, Error)
                | (InProgress, Completed)
                | (InProgress, Error)
                | (Error, InQueue)
        )
    }
}

impl Default for TaskState {
    fn default() -> Self {
        Self::None
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::InQueue => write!(f, "in_queue"),
            Self::CheckCache => write!(f, "check_cache"),
            Self::Assigned => write!(f, "assigned"),
            Self::InProgress => write!(f, "in_progress"),
            Self::Completed => write!(f, "completed"),
            Self::Error => write!(f, "error"),
        }
    }
}

impl std::str::FromStr for TaskState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(Self::None),
            "in_queue" => Ok(Self::InQueue),
            "check_cache" => Ok(Self::CheckCache),
            "assigned" => Ok(Self::Assigned),
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            "error" => Ok(Self::Error),
            _ => Err(format!("Invalid task state: {s}")),
        }
    }
}

/// Variable lifecycle: a slot is empty until its first value arrives, and
/// an initialized slot is never reassigned except by an explicit reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariableState {
    /// No value has been produced yet
    NotInitialized,
    /// A value is present
    Initialized,
    /// Explicitly marked empty by the producer
    Nullified,
}

impl VariableState {
    /// A slot counts as ready once a producer has spoken, even to say
    /// "there is no value".
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Initialized | Self::Nullified)
    }
}

impl Default for VariableState {
    fn default() -> Self {
        Self::NotInitialized
    }
}

impl fmt::Display for VariableState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotInitialized => write!(f, "not_initialized"),
            Self::Initialized => write!(f, "initialized"),
            Self::Nullified => write!(f, "nullified"),
        }
    }
}

/// Execution-context lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextState {
    /// Created, tasks still being produced
    Producing,
    /// All currently known tasks produced and schedulable
    Started,
    /// Pipeline finished, awaiting reaping
    Finished,
    /// Deleted by an operator or reaped
    Deleted,
}

impl ContextState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished | Self::Deleted)
    }
}

impl Default for ContextState {
    fn default() -> Self {
        Self::Producing
    }
}

impl fmt::Display for ContextState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Producing => write!(f, "producing"),
            Self::Started => write!(f, "started"),
            Self::Finished => write!(f, "finished"),
            Self::Deleted => write!(f, "deleted"),
        }
    }
}
