//! In-memory batch of queued tasks sharing one execution context.

use crate::models::Task;
use uuid::Uuid;

/// A task waiting in a group, paired with whether it has already been
/// handed to a processor. Assignment does not remove a task from its
/// group; removal happens on completion.
#[derive(Debug, Clone, PartialEq)]
pub struct QueuedTask {
    pub task: Task,
    pub assigned: bool,
}

#[derive(Debug)]
pub struct TaskGroup {
    exec_context_id: Uuid,
    capacity: usize,
    tasks: Vec<QueuedTask>,
    locked: bool,
    /// Set by [`Self::lock`], consumed once by [`Self::take_newly_locked`].
    newly_locked: bool,
    /// Order in which the group became locked, assigned by the queue.
    pub(crate) locked_seq: Option<u64>,
}

impl TaskGroup {
    pub fn new(exec_context_id: Uuid, capacity: usize) -> Self {
        Self {
            exec_context_id,
            capacity,
            tasks: Vec::new(),
            locked: false,
            newly_locked: false,
            locked_seq: None,
        }
    }

    pub fn exec_context_id(&self) -> Uuid {
        self.exec_context_id
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.tasks.len() >= self.capacity
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// Whether the group is still accepting new tasks.
    pub fn is_accepting(&self) -> bool {
        !self.locked && !self.is_full()
    }

    /// Add a task to the group.
    ///
    /// # Panics
    ///
    /// Panics when the task belongs to a different execution context, when
    /// the group is locked, or when the group is at capacity. All three
    /// are caller bugs: the queue routes tasks to the open group for their
    /// context before they reach here.
    pub fn add_task(&mut self, task: Task) {
        assert_eq!(
            task.exec_context_id, self.exec_context_id,
            "task {} belongs to execution context {}, not {}",
            task.id, task.exec_context_id, self.exec_context_id
        );
        assert!(
            !self.locked,
            "task group for execution context {} is locked and no longer accepts tasks",
            self.exec_context_id
        );
        assert!(
            self.tasks.len() < self.capacity,
            "task group for execution context {} is at capacity {}",
            self.exec_context_id,
            self.capacity
        );

        self.tasks.push(QueuedTask {
            task,
            assigned: false,
        });
    }

    /// Close the group to new additions and make it eligible for
    /// assignment. Idempotent.
    pub fn lock(&mut self) {
        if !self.locked {
            self.locked = true;
            self.newly_locked = true;
        }
    }

    /// True exactly once after each lock, signalling the consumer side
    /// that this group freshly became assignable.
    pub fn take_newly_locked(&mut self) -> bool {
        std::mem::take(&mut self.newly_locked)
    }

    pub fn already_registered(&self, task_id: Uuid) -> bool {
        self.tasks.iter().any(|queued| queued.task.id == task_id)
    }

    /// Remove a task from the group, returning it when present.
    pub fn deregister_task(&mut self, task_id: Uuid) -> Option<Task> {
        let index = self
            .tasks
            .iter()
            .position(|queued| queued.task.id == task_id)?;
        Some(self.tasks.remove(index).task)
    }

    /// Mark a member task as handed to a processor. Returns false when the
    /// task is not a member.
    pub fn assign_task(&mut self, task_id: Uuid) -> bool {
        match self
            .tasks
            .iter_mut()
            .find(|queued| queued.task.id == task_id)
        {
            Some(queued) => {
                queued.assigned = true;
                true
            }
            None => false,
        }
    }

    /// Clear the assigned mark so the task is offered again. Used when a
    /// processor is found to have discarded an in-flight assignment.
    pub fn unassign_task(&mut self, task_id: Uuid) -> bool {
        match self
            .tasks
            .iter_mut()
            .find(|queued| queued.task.id == task_id)
        {
            Some(queued) => {
                queued.assigned = false;
                true
            }
            None => false,
        }
    }

    /// A locked group that has drained is done and can be dropped by the
    /// queue immediately.
    pub fn is_reclaimable(&self) -> bool {
        self.locked && self.tasks.is_empty()
    }

    /// Member tasks in offer order: higher priority first, insertion order
    /// within equal priority.
    pub fn tasks_in_offer_order(&self) -> Vec<QueuedTask> {
        let mut ordered = self.tasks.clone();
        ordered.sort_by_key(|queued| std::cmp::Reverse(queued.task.priority));
        ordered
    }
}
