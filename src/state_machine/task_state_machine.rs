//! Transition application for task lifecycle states.

use crate::error::{DispatcherError, Result};
use crate::locking::LockRegistry;
use crate::models::Task;
use crate::state_machine::TaskState;
use chrono::Utc;
use tracing::debug;

/// Applies validated state transitions to task records.
///
/// The state machine checks the edge; callers are responsible for holding
/// the execution context's write lock, which the scheduling core asserts
/// before invoking any transition.
pub struct TaskStateMachine;

impl TaskStateMachine {
    /// Transition `task` to `target`, returning the previous state.
    pub fn transition(task: &mut Task, target: TaskState) -> Result<TaskState> {
        let current = task.state;
        if !current.can_transition_to(target) {
            return Err(DispatcherError::InvalidTaskState {
                task_id: task.id,
                current_state: current.to_string(),
                expected_states: Self::sources_of(target)
                    .iter()
                    .map(ToString::to_string)
                    .collect(),
            });
        }

        task.state = target;
        task.updated_at = Utc::now();
        debug!(
            task_id = %task.id,
            from = %current,
            to = %target,
            "Task state transition"
        );
        Ok(current)
    }

    /// Transition with the lock precondition checked: task state is
    /// context-scoped, so the caller must hold the context's write lock.
    ///
    /// # Panics
    ///
    /// Panics when the calling thread does not hold the write lock for
    /// the task's execution context.
    pub fn transition_guarded(
        locks: &LockRegistry,
        task: &mut Task,
        target: TaskState,
    ) -> Result<TaskState> {
        locks.assert_write_held(task.exec_context_id);
        Self::transition(task, target)
    }

    /// States from which `target` is reachable in one step.
    fn sources_of(target: TaskState) -> Vec<TaskState> {
        use TaskState::*;
        [None, InQueue, CheckCache, Assigned, InProgress, Completed, Error]
            .into_iter()
            .filter(|s| s.can_transition_to(target))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn task() -> Task {
        Task::new(Uuid::new_v4(), Uuid::new_v4(), 0)
    }

    #[test]
    fn test_valid_transition_chain() {
        let mut task = task();
        TaskStateMachine::transition(&mut task, TaskState::InQueue).unwrap();
        TaskStateMachine::transition(&mut task, TaskState::CheckCache).unwrap();
        TaskStateMachine::transition(&mut task, TaskState::Assigned).unwrap();
        TaskStateMachine::transition(&mut task, TaskState::InProgress).unwrap();
        let prev = TaskStateMachine::transition(&mut task, TaskState::Completed).unwrap();
        assert_eq!(prev, TaskState::InProgress);
        assert_eq!(task.state, TaskState::Completed);
    }

    #[test]
    fn test_invalid_transition_is_rejected() {
        let mut task = task();
        let err = TaskStateMachine::transition(&mut task, TaskState::Completed).unwrap_err();
        assert!(matches!(err, DispatcherError::InvalidTaskState { .. }));
        assert_eq!(task.state, TaskState::None);
    }

    #[test]
    #[should_panic(expected = "is not held by the calling thread")]
    fn test_guarded_transition_requires_context_lock() {
        let locks = LockRegistry::default();
        let mut task = task();
        let _ = TaskStateMachine::transition_guarded(&locks, &mut task, TaskState::InQueue);
    }

    #[test]
    fn test_guarded_transition_passes_with_lock() {
        let locks = LockRegistry::default();
        let mut task = task();
        let lock = locks.lock_for(task.exec_context_id);
        let _guard = lock.write();
        TaskStateMachine::transition_guarded(&locks, &mut task, TaskState::InQueue).unwrap();
        assert_eq!(task.state, TaskState::InQueue);
    }

    #[test]
    fn test_error_is_retriable() {
        let mut task = task();
        TaskStateMachine::transition(&mut task, TaskState::InQueue).unwrap();
        TaskStateMachine::transition(&mut task, TaskState::Assigned).unwrap();
        TaskStateMachine::transition(&mut task, TaskState::Error).unwrap();
        TaskStateMachine::transition(&mut task, TaskState::InQueue).unwrap();
        assert_eq!(task.state, TaskState::InQueue);
    }
}
