//! Queue-level grouping, routing, and iteration.

use crate::logging::log_queue_operation;
use crate::models::Task;
use crate::queue::{QueuedTask, TaskGroup};
use parking_lot::RwLock;
use tracing::debug;
use uuid::Uuid;

struct QueueInner {
    /// Groups in creation order.
    groups: Vec<TaskGroup>,
    next_lock_seq: u64,
}

/// Ordered mapping from execution context to its task groups.
///
/// One read/write lock protects both queue membership and group contents;
/// per-context locks from the registry govern task state, not queue
/// shape.
pub struct TaskQueue {
    inner: RwLock<QueueInner>,
    group_capacity: usize,
    min_resident_groups: usize,
}

impl TaskQueue {
    pub fn new(group_capacity: usize, min_resident_groups: usize) -> Self {
        assert!(group_capacity > 0, "group capacity must be at least 1");
        Self {
            inner: RwLock::new(QueueInner {
                groups: Vec::new(),
                next_lock_seq: 0,
            }),
            group_capacity,
            min_resident_groups,
        }
    }

    /// Route a task to the open group for its context, opening a new group
    /// when none exists or the current one is full or locked.
    ///
    /// # Panics
    ///
    /// Panics when a task with the same id is already queued anywhere.
    /// Duplicate registration is a caller bug, not an at-least-once
    /// delivery artifact; delivery retries are reconciled before the
    /// queue.
    pub fn add_new_task(&self, task: Task) {
        let mut inner = self.inner.write();

        assert!(
            !inner
                .groups
                .iter()
                .any(|group| group.already_registered(task.id)),
            "task {} is already registered in the queue",
            task.id
        );

        let exec_context_id = task.exec_context_id;
        let task_id = task.id;

        let open = inner
            .groups
            .iter_mut()
            .rev()
            .find(|group| group.exec_context_id() == exec_context_id && group.is_accepting());

        match open {
            Some(group) => group.add_task(task),
            None => {
                let mut group = TaskGroup::new(exec_context_id, self.group_capacity);
                group.add_task(task);
                inner.groups.push(group);
            }
        }

        log_queue_operation(
            "add_new_task",
            Some(exec_context_id),
            Some(task_id),
            inner.groups.len(),
            None,
        );
    }

    /// Lock every group of a context, making them eligible for
    /// assignment. Idempotent; called when the pipeline engine declares
    /// the context's tasks produced.
    pub fn lock_context(&self, exec_context_id: Uuid) {
        let mut inner = self.inner.write();
        let mut seq = inner.next_lock_seq;
        for group in &mut inner.groups {
            if group.exec_context_id() == exec_context_id && !group.is_locked() {
                group.lock();
                group.locked_seq = Some(seq);
                seq += 1;
            }
        }
        inner.next_lock_seq = seq;
    }

    /// Whether any group of the context freshly became assignable since
    /// the last call. Used by the consumer side to skip redundant
    /// dispatch scans.
    pub fn take_newly_locked(&self, exec_context_id: Uuid) -> bool {
        let mut inner = self.inner.write();
        let mut fresh = false;
        for group in &mut inner.groups {
            if group.exec_context_id() == exec_context_id && group.take_newly_locked() {
                fresh = true;
            }
        }
        fresh
    }

    /// Snapshot of all tasks across locked groups, context by context in
    /// the order groups became locked, each paired with whether it has
    /// already been assigned. Iterating mutates nothing; assignment is a
    /// separate explicit call.
    pub fn assignable_tasks(&self) -> Vec<QueuedTask> {
        let inner = self.inner.read();
        let mut locked: Vec<&TaskGroup> = inner
            .groups
            .iter()
            .filter(|group| group.is_locked())
            .collect();
        locked.sort_by_key(|group| group.locked_seq);

        locked
            .into_iter()
            .flat_map(|group| group.tasks_in_offer_order())
            .collect()
    }

    /// Mark a queued task as handed to a processor. Returns false when the
    /// task is not queued.
    pub fn assign_task(&self, task_id: Uuid) -> bool {
        let mut inner = self.inner.write();
        inner.groups.iter_mut().any(|group| group.assign_task(task_id))
    }

    /// Clear a task's assigned mark so it is offered again.
    pub fn unassign_task(&self, task_id: Uuid) -> bool {
        let mut inner = self.inner.write();
        inner
            .groups
            .iter_mut()
            .any(|group| group.unassign_task(task_id))
    }

    pub fn already_registered(&self, task_id: Uuid) -> bool {
        let inner = self.inner.read();
        inner
            .groups
            .iter()
            .any(|group| group.already_registered(task_id))
    }

    /// Remove a task from its group. A locked group drained by this call
    /// is dropped immediately.
    pub fn deregister_task(&self, task_id: Uuid) -> bool {
        let mut inner = self.inner.write();
        let mut removed = false;
        for group in &mut inner.groups {
            if group.deregister_task(task_id).is_some() {
                removed = true;
                break;
            }
        }
        if removed {
            inner.groups.retain(|group| !group.is_reclaimable());
        }
        removed
    }

    /// Bulk removal, used when a batch of tasks is retired together.
    pub fn remove_all(&self, task_ids: &[Uuid]) -> usize {
        let mut inner = self.inner.write();
        let mut removed = 0;
        for task_id in task_ids {
            for group in &mut inner.groups {
                if group.deregister_task(*task_id).is_some() {
                    removed += 1;
                    break;
                }
            }
        }
        if removed > 0 {
            inner.groups.retain(|group| !group.is_reclaimable());
        }
        removed
    }

    /// Drop every group belonging to a context, regardless of state.
    /// Idempotent; succeeds when the context has nothing queued.
    pub fn delete_by_context(&self, exec_context_id: Uuid) -> usize {
        let mut inner = self.inner.write();
        let before = inner.groups.len();
        inner
            .groups
            .retain(|group| group.exec_context_id() != exec_context_id);
        let dropped = before - inner.groups.len();
        if dropped > 0 {
            debug!(
                exec_context_id = %exec_context_id,
                dropped_groups = dropped,
                "Dropped queue groups for deleted context"
            );
        }
        dropped
    }

    /// Reclaim groups that are both empty and unlocked, oldest first, down
    /// to the configured floor of resident groups.
    pub fn shrink(&self) -> usize {
        let mut inner = self.inner.write();
        let mut reclaimed = 0;
        while inner.groups.len() > self.min_resident_groups {
            let Some(index) = inner
                .groups
                .iter()
                .position(|group| group.is_empty() && !group.is_locked())
            else {
                break;
            };
            inner.groups.remove(index);
            reclaimed += 1;
        }
        reclaimed
    }

    pub fn group_count(&self) -> usize {
        self.inner.read().groups.len()
    }

    pub fn is_queue_empty(&self) -> bool {
        self.inner.read().groups.iter().all(TaskGroup::is_empty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn queue_task(exec_context_id: Uuid, order: i64) -> Task {
        Task::new(exec_context_id, Uuid::new_v4(), order)
    }

    #[test]
    fn test_routing_opens_second_group_at_capacity() {
        let queue = TaskQueue::new(2, 0);
        let ctx = Uuid::new_v4();

        queue.add_new_task(queue_task(ctx, 0));
        queue.add_new_task(queue_task(ctx, 1));
        assert_eq!(queue.group_count(), 1);

        queue.add_new_task(queue_task(ctx, 2));
        assert_eq!(queue.group_count(), 2);
    }

    #[test]
    fn test_contexts_never_share_a_group() {
        let queue = TaskQueue::new(10, 0);
        let ctx_a = Uuid::new_v4();
        let ctx_b = Uuid::new_v4();

        queue.add_new_task(queue_task(ctx_a, 0));
        queue.add_new_task(queue_task(ctx_b, 0));
        assert_eq!(queue.group_count(), 2);
    }

    #[test]
    #[should_panic(expected = "already registered")]
    fn test_duplicate_task_id_panics() {
        let queue = TaskQueue::new(10, 0);
        let task = queue_task(Uuid::new_v4(), 0);
        queue.add_new_task(task.clone());
        queue.add_new_task(task);
    }

    #[test]
    fn test_unlocked_groups_are_not_assignable() {
        let queue = TaskQueue::new(10, 0);
        let ctx = Uuid::new_v4();
        queue.add_new_task(queue_task(ctx, 0));

        assert!(queue.assignable_tasks().is_empty());
        queue.lock_context(ctx);
        assert_eq!(queue.assignable_tasks().len(), 1);
    }

    #[test]
    fn test_iteration_is_read_only() {
        let queue = TaskQueue::new(10, 0);
        let ctx = Uuid::new_v4();
        queue.add_new_task(queue_task(ctx, 0));
        queue.lock_context(ctx);

        let first: Vec<_> = queue.assignable_tasks();
        let second: Vec<_> = queue.assignable_tasks();
        assert_eq!(first, second);
        assert!(first.iter().all(|queued| !queued.assigned));
    }

    #[test]
    fn test_assignment_is_visible_to_iterator() {
        let queue = TaskQueue::new(10, 0);
        let ctx = Uuid::new_v4();
        let task = queue_task(ctx, 0);
        let task_id = task.id;
        queue.add_new_task(task);
        queue.lock_context(ctx);

        assert!(queue.assign_task(task_id));
        let snapshot = queue.assignable_tasks();
        assert!(snapshot[0].assigned);
        // Assignment does not remove the task
        assert!(queue.already_registered(task_id));
    }

    #[test]
    fn test_deregister_drops_drained_locked_group() {
        let queue = TaskQueue::new(10, 0);
        let ctx = Uuid::new_v4();
        let task = queue_task(ctx, 0);
        let task_id = task.id;
        queue.add_new_task(task);
        queue.lock_context(ctx);

        assert!(queue.deregister_task(task_id));
        assert_eq!(queue.group_count(), 0);
        assert!(!queue.deregister_task(task_id));
    }

    #[test]
    fn test_shrink_respects_floor_and_age() {
        let queue = TaskQueue::new(1, 1);
        let ctx = Uuid::new_v4();

        // Three single-task groups; drain the tasks without locking so the
        // groups stay resident and unlocked.
        let mut ids = Vec::new();
        for order in 0..3 {
            let task = queue_task(ctx, order);
            ids.push(task.id);
            queue.add_new_task(task);
        }
        for id in &ids {
            queue.deregister_task(*id);
        }
        assert_eq!(queue.group_count(), 3);

        let reclaimed = queue.shrink();
        assert_eq!(reclaimed, 2);
        assert_eq!(queue.group_count(), 1);
    }

    #[test]
    fn test_remove_all_retires_a_batch() {
        let queue = TaskQueue::new(10, 0);
        let ctx = Uuid::new_v4();
        let first = queue_task(ctx, 0);
        let second = queue_task(ctx, 1);
        let keep = queue_task(ctx, 2);
        let retired = vec![first.id, second.id, Uuid::new_v4()];
        for task in [first, second, keep.clone()] {
            queue.add_new_task(task);
        }

        assert_eq!(queue.remove_all(&retired), 2);
        assert!(queue.already_registered(keep.id));
    }

    #[test]
    fn test_delete_by_context_is_idempotent() {
        let queue = TaskQueue::new(10, 0);
        let ctx = Uuid::new_v4();
        let other = Uuid::new_v4();
        queue.add_new_task(queue_task(ctx, 0));
        queue.add_new_task(queue_task(other, 0));

        assert_eq!(queue.delete_by_context(ctx), 1);
        assert_eq!(queue.delete_by_context(ctx), 0);
        assert_eq!(queue.group_count(), 1);
    }

    #[test]
    fn test_cross_context_order_follows_lock_order() {
        let queue = TaskQueue::new(10, 0);
        let ctx_a = Uuid::new_v4();
        let ctx_b = Uuid::new_v4();

        // ctx_a queued first but ctx_b locked first
        let task_a = queue_task(ctx_a, 0);
        let task_b = queue_task(ctx_b, 0);
        let (id_a, id_b) = (task_a.id, task_b.id);
        queue.add_new_task(task_a);
        queue.add_new_task(task_b);
        queue.lock_context(ctx_b);
        queue.lock_context(ctx_a);

        let order: Vec<Uuid> = queue
            .assignable_tasks()
            .into_iter()
            .map(|queued| queued.task.id)
            .collect();
        assert_eq!(order, vec![id_b, id_a]);
    }

    #[test]
    fn test_newly_locked_signal() {
        let queue = TaskQueue::new(10, 0);
        let ctx = Uuid::new_v4();
        queue.add_new_task(queue_task(ctx, 0));

        assert!(!queue.take_newly_locked(ctx));
        queue.lock_context(ctx);
        assert!(queue.take_newly_locked(ctx));
        assert!(!queue.take_newly_locked(ctx));
    }
}
