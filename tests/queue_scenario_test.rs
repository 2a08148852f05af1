//! End-to-end queue scenario: grouping, capacity overflow into a second
//! group, locked iteration, assignment, and context deletion.

use dispatcher_core::models::Task;
use dispatcher_core::queue::TaskQueue;
use uuid::Uuid;

fn context_task(exec_context_id: Uuid, order: i64) -> Task {
    Task::new(exec_context_id, Uuid::new_v4(), order)
}

#[test]
fn six_tasks_overflow_into_second_group_and_delete_drains_queue() {
    let queue = TaskQueue::new(5, 0);
    let c1 = Uuid::new_v4();

    let mut task_ids = Vec::new();
    for order in 0..5 {
        let task = context_task(c1, order);
        task_ids.push(task.id);
        queue.add_new_task(task);
    }
    assert_eq!(queue.group_count(), 1);

    // The sixth task exceeds group capacity and opens a second group.
    let sixth = context_task(c1, 5);
    task_ids.push(sixth.id);
    queue.add_new_task(sixth);
    assert_eq!(queue.group_count(), 2);

    // Nothing is assignable until the context is declared produced.
    assert!(queue.assignable_tasks().is_empty());
    queue.lock_context(c1);
    assert!(queue.take_newly_locked(c1));

    let offered: Vec<Uuid> = queue
        .assignable_tasks()
        .into_iter()
        .map(|queued| {
            assert!(!queued.assigned);
            queued.task.id
        })
        .collect();
    assert_eq!(offered, task_ids, "insertion order across both groups");

    for task_id in &task_ids {
        assert!(queue.assign_task(*task_id));
    }
    assert!(
        !queue.take_newly_locked(c1),
        "freshly-locked signal fires only once per lock"
    );
    assert!(queue
        .assignable_tasks()
        .iter()
        .all(|queued| queued.assigned));

    queue.delete_by_context(c1);
    assert_eq!(queue.group_count(), 0);
    assert!(queue.is_queue_empty());
}

#[test]
fn priority_overrides_insertion_order_within_a_context() {
    let queue = TaskQueue::new(10, 0);
    let ctx = Uuid::new_v4();

    let normal = context_task(ctx, 0);
    let urgent = context_task(ctx, 1).with_priority(10);
    let (normal_id, urgent_id) = (normal.id, urgent.id);
    queue.add_new_task(normal);
    queue.add_new_task(urgent);
    queue.lock_context(ctx);

    let offered: Vec<Uuid> = queue
        .assignable_tasks()
        .into_iter()
        .map(|queued| queued.task.id)
        .collect();
    assert_eq!(offered, vec![urgent_id, normal_id]);
}

#[test]
fn group_floor_binds_shrink_but_not_context_deletion() {
    let queue = TaskQueue::new(1, 2);
    let ctx = Uuid::new_v4();

    let mut ids = Vec::new();
    for order in 0..4 {
        let task = context_task(ctx, order);
        ids.push(task.id);
        queue.add_new_task(task);
    }
    assert_eq!(queue.group_count(), 4);

    // Drain the groups without locking them, then shrink to the floor.
    for id in &ids {
        queue.deregister_task(*id);
    }
    assert_eq!(queue.shrink(), 2);
    assert_eq!(queue.group_count(), 2);

    // Deletion ignores the floor entirely.
    queue.delete_by_context(ctx);
    assert_eq!(queue.group_count(), 0);
}
