//! # Task and Variable State Management
//!
//! Lifecycle states for tasks, variables, and execution contexts, plus the
//! transition rules the scheduling core enforces. All transitions of
//! context-scoped state happen under that context's write lock; the state
//! machine validates the edge, the lock registry guarantees exclusivity.

pub mod states;
pub mod task_state_machine;

pub use states::{ContextState, TaskState, VariableState};
pub use task_state_machine::TaskStateMachine;
