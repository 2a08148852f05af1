//! Batched application of readiness events to variable-state snapshots.
//!
//! Producers call the `register_*` operations, which only append to an
//! in-memory buffer; nothing touches durable storage on the hot path.
//! Durability is carried by the task and variable records themselves, so
//! losing buffered notifications to a crash costs nothing that cannot be
//! recomputed. A periodic flush drains both buffers in one swap and merges
//! each context's events into its snapshot.

use crate::error::Result;
use crate::events::{EventBuffer, EventPublisher};
use crate::locking::LockRegistry;
use crate::logging::log_flush_cycle;
use crate::models::{SlotState, TaskReadiness, VariableStateSnapshot};
use crate::storage::DispatchStore;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

/// Notification that the pipeline engine produced (or re-produced) a task.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskCreatedEvent {
    pub task_id: Uuid,
    pub exec_context_id: Uuid,
    pub inputs: Vec<SlotState>,
    pub outputs: Vec<SlotState>,
}

/// Notification that a processor uploaded (or nullified) a variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VariableUploadedEvent {
    pub exec_context_id: Uuid,
    pub variable_id: Uuid,
    pub nullified: bool,
}

/// Counters for one flush cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushStats {
    pub contexts_flushed: usize,
    pub tasks_merged: usize,
    pub variables_merged: usize,
    pub followups_published: usize,
}

pub struct VariableStateAggregator {
    created: EventBuffer<TaskCreatedEvent>,
    uploaded: EventBuffer<VariableUploadedEvent>,
    store: Arc<dyn DispatchStore>,
    locks: Arc<LockRegistry>,
    publisher: EventPublisher,
}

impl VariableStateAggregator {
    pub fn new(
        store: Arc<dyn DispatchStore>,
        locks: Arc<LockRegistry>,
        publisher: EventPublisher,
    ) -> Self {
        Self {
            created: EventBuffer::new(),
            uploaded: EventBuffer::new(),
            store,
            locks,
            publisher,
        }
    }

    /// Record a task-created notification. In-memory append only.
    pub fn register_created_task(&self, event: TaskCreatedEvent) {
        self.created.push(event.exec_context_id, event);
    }

    /// Record a variable-uploaded notification. In-memory append only.
    pub fn register_variable_state(&self, event: VariableUploadedEvent) {
        self.uploaded.push(event.exec_context_id, event);
    }

    /// Discard all pending events for a context. Used on context
    /// deletion.
    pub fn drop_context_events(&self, exec_context_id: Uuid) {
        self.created.drop_context(exec_context_id);
        self.uploaded.drop_context(exec_context_id);
    }

    pub fn has_pending_events(&self) -> bool {
        !self.created.is_empty() || !self.uploaded.is_empty()
    }

    /// One flush cycle: swap out both accumulators, then merge each
    /// context's events into its snapshot and publish the follow-up
    /// completion checks. A context whose merge fails on a store error
    /// has its events restored for the next cycle; a failed flush delays
    /// state, never loses it.
    pub async fn process_flushing(&self) -> FlushStats {
        let mut created = self.created.drain();
        let mut uploaded = self.uploaded.drain();

        let contexts: BTreeSet<Uuid> = created.keys().chain(uploaded.keys()).copied().collect();

        let mut stats = FlushStats::default();
        for exec_context_id in contexts {
            let created_events = created.remove(&exec_context_id).unwrap_or_default();
            let uploaded_events = uploaded.remove(&exec_context_id).unwrap_or_default();

            match self
                .flush_context(exec_context_id, &created_events, &uploaded_events)
                .await
            {
                Ok(Some((tasks, followups))) => {
                    stats.contexts_flushed += 1;
                    stats.tasks_merged += tasks;
                    stats.variables_merged += uploaded_events.len();
                    stats.followups_published += followups;
                }
                Ok(None) => {
                    // Context no longer exists; its events are moot.
                    debug!(
                        exec_context_id = %exec_context_id,
                        "Dropping events for absent execution context"
                    );
                }
                Err(error) => {
                    warn!(
                        exec_context_id = %exec_context_id,
                        error = %error,
                        "Flush failed, restoring events for retry"
                    );
                    self.created.restore(exec_context_id, created_events);
                    self.uploaded.restore(exec_context_id, uploaded_events);
                }
            }
        }

        if stats != FlushStats::default() {
            log_flush_cycle(
                stats.contexts_flushed,
                stats.tasks_merged,
                stats.variables_merged,
                stats.followups_published,
            );
        }
        stats
    }

    async fn flush_context(
        &self,
        exec_context_id: Uuid,
        created: &[TaskCreatedEvent],
        uploaded: &[VariableUploadedEvent],
    ) -> Result<Option<(usize, usize)>> {
        let Some(context) = self.store.load_context(exec_context_id).await? else {
            return Ok(None);
        };
        let snapshot_id = context.snapshot_id;

        let mut snapshot = self
            .store
            .load_snapshot(snapshot_id)
            .await?
            .unwrap_or_else(|| VariableStateSnapshot::new(snapshot_id, exec_context_id));

        let check_task_ids;
        {
            let lock = self.locks.lock_for(snapshot_id);
            let _guard = lock.write();
            check_task_ids = self.merge_into_snapshot(&mut snapshot, created, uploaded);
        }

        self.store.save_snapshot(&snapshot).await?;

        // Follow-ups go out only after the merge is durable, so a
        // completion check never races a snapshot that does not yet
        // reflect the upload it was triggered by.
        for task_id in &check_task_ids {
            self.publisher
                .publish_check_task_completion(exec_context_id, *task_id);
        }

        Ok(Some((created.len(), check_task_ids.len())))
    }

    /// Merge one context's events into its snapshot. Created-task entries
    /// are inserted or replaced wholesale; upload events mark the matching
    /// slots produced. Returns the de-duplicated set of task ids whose
    /// outputs were touched.
    ///
    /// # Panics
    ///
    /// Panics when the calling thread does not hold the snapshot's write
    /// lock.
    pub fn merge_into_snapshot(
        &self,
        snapshot: &mut VariableStateSnapshot,
        created: &[TaskCreatedEvent],
        uploaded: &[VariableUploadedEvent],
    ) -> BTreeSet<Uuid> {
        self.locks.assert_write_held(snapshot.id);

        for event in created {
            snapshot.upsert_task(
                event.task_id,
                TaskReadiness {
                    inputs: event.inputs.clone(),
                    outputs: event.outputs.clone(),
                },
            );
        }

        let mut check_task_ids = BTreeSet::new();
        for event in uploaded {
            for task_id in snapshot.apply_upload(event.variable_id, event.nullified) {
                check_task_ids.insert(task_id);
            }
        }
        check_task_ids
    }
}
