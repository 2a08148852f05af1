//! Processor record: a remote agent that executes tasks and reports back.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessorStatus {
    /// Reachable and accepting work
    Ready,
    /// Currently executing a task
    Busy,
    /// Announced shutdown, no new assignments
    Draining,
}

impl Default for ProcessorStatus {
    fn default() -> Self {
        Self::Ready
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Processor {
    pub id: Uuid,
    pub session_token: String,
    pub status: ProcessorStatus,
    /// Tasks currently assigned to this processor and not yet retired.
    pub assigned_task_ids: Vec<Uuid>,
    pub last_seen_at: DateTime<Utc>,
}

impl Processor {
    /// Issue a fresh identity with a new session token.
    pub fn issue() -> Self {
        Self {
            id: Uuid::new_v4(),
            session_token: Uuid::new_v4().simple().to_string(),
            status: ProcessorStatus::default(),
            assigned_task_ids: Vec::new(),
            last_seen_at: Utc::now(),
        }
    }

    pub fn touch(&mut self, status: ProcessorStatus) {
        self.status = status;
        self.last_seen_at = Utc::now();
    }

    pub fn record_assignment(&mut self, task_id: Uuid) {
        if !self.assigned_task_ids.contains(&task_id) {
            self.assigned_task_ids.push(task_id);
        }
    }

    pub fn retire_assignment(&mut self, task_id: Uuid) {
        self.assigned_task_ids.retain(|id| *id != task_id);
    }
}
