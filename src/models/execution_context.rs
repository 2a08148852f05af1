//! Execution context: one running instance of a pipeline.

use crate::state_machine::ContextState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionContext {
    pub id: Uuid,
    pub state: ContextState,
    /// Ids of the tasks this context owns.
    pub task_ids: Vec<Uuid>,
    /// Id of the variable-state snapshot holding this context's readiness
    /// projection.
    pub snapshot_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ExecutionContext {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            state: ContextState::default(),
            task_ids: Vec::new(),
            snapshot_id: Uuid::new_v4(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn register_task(&mut self, task_id: Uuid) {
        if !self.task_ids.contains(&task_id) {
            self.task_ids.push(task_id);
            self.updated_at = Utc::now();
        }
    }

    /// The pipeline engine declares all currently known tasks produced.
    pub fn mark_started(&mut self) {
        self.state = ContextState::Started;
        self.updated_at = Utc::now();
    }

    pub fn mark_finished(&mut self) {
        self.state = ContextState::Finished;
        self.updated_at = Utc::now();
    }

    pub fn mark_deleted(&mut self) {
        self.state = ContextState::Deleted;
        self.updated_at = Utc::now();
    }
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_task_deduplicates() {
        let mut ctx = ExecutionContext::new();
        let task_id = Uuid::new_v4();
        ctx.register_task(task_id);
        ctx.register_task(task_id);
        assert_eq!(ctx.task_ids.len(), 1);
    }

    #[test]
    fn test_lifecycle() {
        let mut ctx = ExecutionContext::new();
        assert_eq!(ctx.state, ContextState::Producing);
        ctx.mark_started();
        assert_eq!(ctx.state, ContextState::Started);
        ctx.mark_deleted();
        assert!(ctx.state.is_terminal());
    }
}
