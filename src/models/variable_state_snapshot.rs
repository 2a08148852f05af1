//! Per-context readiness projection.
//!
//! The snapshot is a fast-path view over the durable task and variable
//! records: which slots each task reads and writes, and which of those
//! slots have been produced. It is rebuilt from the authoritative records
//! if lost, so merging into it never needs to be transactional with them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Readiness of one variable slot as last reported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotState {
    pub variable_id: Uuid,
    pub name: String,
    pub inited: bool,
    pub nullified: bool,
}

impl SlotState {
    pub fn new<S: Into<String>>(variable_id: Uuid, name: S) -> Self {
        Self {
            variable_id,
            name: name.into(),
            inited: false,
            nullified: false,
        }
    }
}

/// Input and output slots of one task, as last produced by the pipeline
/// engine.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TaskReadiness {
    pub inputs: Vec<SlotState>,
    pub outputs: Vec<SlotState>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableStateSnapshot {
    pub id: Uuid,
    pub exec_context_id: Uuid,
    pub tasks: HashMap<Uuid, TaskReadiness>,
    pub updated_at: DateTime<Utc>,
}

impl VariableStateSnapshot {
    pub fn new(id: Uuid, exec_context_id: Uuid) -> Self {
        Self {
            id,
            exec_context_id,
            tasks: HashMap::new(),
            updated_at: Utc::now(),
        }
    }

    /// Record a task's slot lists, replacing any previous entry wholesale
    /// so the projection always reflects the latest known production.
    pub fn upsert_task(&mut self, task_id: Uuid, readiness: TaskReadiness) {
        self.tasks.insert(task_id, readiness);
        self.updated_at = Utc::now();
    }

    /// Mark every slot backed by `variable_id` as produced. Returns the
    /// ids of tasks whose *outputs* were touched, the candidates for a
    /// completion re-check. Applying the same upload twice is a no-op on
    /// the resulting state.
    pub fn apply_upload(&mut self, variable_id: Uuid, nullified: bool) -> Vec<Uuid> {
        let mut touched = Vec::new();
        for (task_id, readiness) in &mut self.tasks {
            for slot in &mut readiness.inputs {
                if slot.variable_id == variable_id {
                    slot.inited = true;
                    slot.nullified = nullified;
                }
            }
            for slot in &mut readiness.outputs {
                if slot.variable_id == variable_id {
                    slot.inited = true;
                    slot.nullified = nullified;
                    touched.push(*task_id);
                }
            }
        }
        if !touched.is_empty() {
            self.updated_at = Utc::now();
        }
        touched
    }

    /// Whether every output slot of the task has been produced. `None`
    /// when the task is not in the projection.
    pub fn outputs_ready(&self, task_id: Uuid) -> Option<bool> {
        self.tasks
            .get(&task_id)
            .map(|r| r.outputs.iter().all(|slot| slot.inited))
    }

    pub fn remove_task(&mut self, task_id: Uuid) {
        self.tasks.remove(&task_id);
        self.updated_at = Utc::now();
    }
}
