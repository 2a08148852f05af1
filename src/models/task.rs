//! Task record: one schedulable unit of work within an execution context.

use crate::state_machine::TaskState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identity of the function a task executes. The code string is what the
/// cache signature hashes, so two tasks with byte-identical code and
/// inputs are considered re-executable-identical work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionRef {
    pub code: String,
}

impl FunctionRef {
    pub fn new<S: Into<String>>(code: S) -> Self {
        Self { code: code.into() }
    }
}

/// Reference to a variable slot used as a task input or output. The
/// content hash is present once the underlying variable is initialized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableRef {
    pub variable_id: Uuid,
    pub name: String,
    pub content_hash: Option<String>,
}

impl VariableRef {
    pub fn new<S: Into<String>>(variable_id: Uuid, name: S) -> Self {
        Self {
            variable_id,
            name: name.into(),
            content_hash: None,
        }
    }

    pub fn with_content_hash<S: Into<String>>(mut self, hash: S) -> Self {
        self.content_hash = Some(hash.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub exec_context_id: Uuid,
    /// Position in the context's possibly-nested parallel/sequential
    /// structure.
    pub context_path_id: Uuid,
    /// Insertion order within the context.
    pub order: i64,
    /// Higher priority is offered to processors first within a context.
    pub priority: i32,
    pub function: Option<FunctionRef>,
    pub inputs: Vec<VariableRef>,
    pub outputs: Vec<VariableRef>,
    pub state: TaskState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    pub fn new(exec_context_id: Uuid, context_path_id: Uuid, order: i64) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            exec_context_id,
            context_path_id,
            order,
            priority: 0,
            function: None,
            inputs: Vec::new(),
            outputs: Vec::new(),
            state: TaskState::default(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_function(mut self, function: FunctionRef) -> Self {
        self.function = Some(function);
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_input(mut self, input: VariableRef) -> Self {
        self.inputs.push(input);
        self
    }

    pub fn with_output(mut self, output: VariableRef) -> Self {
        self.outputs.push(output);
        self
    }

    /// A task is well-formed for scheduling only with a function reference.
    pub fn is_executable(&self) -> bool {
        self.function.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_builder() {
        let ctx = Uuid::new_v4();
        let task = Task::new(ctx, Uuid::new_v4(), 3)
            .with_function(FunctionRef::new("fn main() {}"))
            .with_priority(2)
            .with_input(VariableRef::new(Uuid::new_v4(), "in_a"))
            .with_output(VariableRef::new(Uuid::new_v4(), "out_a"));

        assert_eq!(task.exec_context_id, ctx);
        assert_eq!(task.priority, 2);
        assert_eq!(task.inputs.len(), 1);
        assert_eq!(task.outputs.len(), 1);
        assert_eq!(task.state, TaskState::None);
        assert!(task.is_executable());
    }

    #[test]
    fn test_task_without_function_is_not_executable() {
        let task = Task::new(Uuid::new_v4(), Uuid::new_v4(), 0);
        assert!(!task.is_executable());
    }
}
