//! Report processing pipeline.
//!
//! `process` runs its sub-steps in a fixed order: missing-output
//! reconciliation, resend acknowledgement, task-status reconciliation,
//! result storage, processor status storage, next-task assignment, and
//! identity issuance for first contact. Each sub-step is a no-op when the
//! corresponding report section is absent.

use crate::cache::{CacheDecision, TaskResultCache};
use crate::error::{DispatcherError, Result};
use crate::events::{EventPublisher, VariableStateAggregator, VariableUploadedEvent};
use crate::exchange::types::{
    DispatcherResponse, IssuedIdentity, ProcessorReport, TaskAssignment, TaskResultReport,
};
use crate::locking::LockRegistry;
use crate::logging::log_exchange;
use crate::models::{CacheEntry, CachedOutput, Processor, Task};
use crate::queue::TaskQueue;
use crate::state_machine::{TaskState, TaskStateMachine, VariableState};
use crate::storage::DispatchStore;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

pub struct ProcessorExchange {
    store: Arc<dyn DispatchStore>,
    queue: Arc<TaskQueue>,
    cache: Arc<TaskResultCache>,
    aggregator: Arc<VariableStateAggregator>,
    locks: Arc<LockRegistry>,
    publisher: EventPublisher,
}

impl ProcessorExchange {
    pub fn new(
        store: Arc<dyn DispatchStore>,
        queue: Arc<TaskQueue>,
        cache: Arc<TaskResultCache>,
        aggregator: Arc<VariableStateAggregator>,
        locks: Arc<LockRegistry>,
        publisher: EventPublisher,
    ) -> Self {
        Self {
            store,
            queue,
            cache,
            aggregator,
            locks,
            publisher,
        }
    }

    /// Process one inbound report and build the response.
    pub async fn process(&self, report: ProcessorReport) -> Result<DispatcherResponse> {
        let mut response = DispatcherResponse::default();
        let mut processor = self.resolve_processor(&report).await?;

        if let Some(results) = &report.finished_tasks {
            self.reconcile_missing_outputs(results, &mut response)
                .await?;
        }

        if let Some(statuses) = &report.resend_statuses {
            for status in statuses {
                if status.resent {
                    // Confirm the re-upload actually landed before telling
                    // the processor to stop tracking it.
                    let ready = self
                        .store
                        .load_variable(status.variable_id)
                        .await?
                        .map(|v| v.state.is_ready())
                        .unwrap_or(false);
                    if ready {
                        response.resend_acknowledgements.push(status.variable_id);
                    } else {
                        response.resend_requests.push(status.variable_id);
                    }
                }
            }
        }

        if let Some(known) = &report.known_task_ids {
            self.reconcile_task_statuses(processor.as_mut(), known, &mut response)
                .await?;
        }

        if let Some(results) = &report.finished_tasks {
            for result in results {
                self.store_task_result(processor.as_mut(), result, &mut response)
                    .await?;
            }
        }

        if let (Some(processor), Some(status)) = (processor.as_mut(), report.status) {
            processor.touch(status);
        }

        if report.requests_task {
            if let Some(processor) = processor.as_mut() {
                response.assigned_task = self.assign_next_task(processor).await?;
            }
        }

        if let Some(processor) = &processor {
            self.store.save_processor(processor).await?;
        }

        if report.requests_identity && processor.is_none() {
            let issued = Processor::issue();
            self.store.save_processor(&issued).await?;
            response.issued_identity = Some(IssuedIdentity {
                processor_id: issued.id,
                session_token: issued.session_token,
            });
        }

        log_exchange(
            processor.as_ref().map(|p| p.id),
            response.assigned_task.as_ref().map(|a| a.task_id),
            response.acknowledged_task_ids.len(),
            None,
        );
        Ok(response)
    }

    async fn resolve_processor(&self, report: &ProcessorReport) -> Result<Option<Processor>> {
        let Some(processor_id) = report.processor_id else {
            return Ok(None);
        };
        let Some(processor) = self.store.load_processor(processor_id).await? else {
            warn!(
                processor_id = %processor_id,
                "Report from unknown processor id, treating as first contact"
            );
            return Ok(None);
        };
        if let Some(token) = &report.session_token {
            if *token != processor.session_token {
                return Err(DispatcherError::ProcessorSessionError(format!(
                    "session token mismatch for processor {processor_id}"
                )));
            }
        }
        Ok(Some(processor))
    }

    /// Ask the processor to re-upload any output of a finished task the
    /// dispatcher never received and which is not part of this report.
    async fn reconcile_missing_outputs(
        &self,
        results: &[TaskResultReport],
        response: &mut DispatcherResponse,
    ) -> Result<()> {
        for result in results {
            let Some(task) = self.store.load_task(result.task_id).await? else {
                continue;
            };
            for output in &task.outputs {
                let uploaded_now = result
                    .outputs
                    .iter()
                    .any(|uploaded| uploaded.variable_id == output.variable_id);
                if uploaded_now {
                    continue;
                }
                let ready = self
                    .store
                    .load_variable(output.variable_id)
                    .await?
                    .map(|v| v.state.is_ready())
                    .unwrap_or(false);
                if !ready {
                    response.resend_requests.push(output.variable_id);
                }
            }
        }
        Ok(())
    }

    /// Reconcile the processor's view of its tasks against the durable
    /// record. The dispatcher's record is authoritative: tasks the
    /// dispatcher has retired (or never knew) are discarded on the
    /// processor; assignments the processor no longer knows are re-marked
    /// failed-and-retriable and offered again.
    async fn reconcile_task_statuses(
        &self,
        processor: Option<&mut Processor>,
        known_task_ids: &[Uuid],
        response: &mut DispatcherResponse,
    ) -> Result<()> {
        for task_id in known_task_ids {
            match self.store.load_task(*task_id).await? {
                None => {
                    warn!(
                        task_id = %task_id,
                        "Processor reports a task the dispatcher has no record of"
                    );
                    response.discard_task_ids.push(*task_id);
                }
                Some(task) if task.state.is_terminal() || task.state == TaskState::Error => {
                    response.discard_task_ids.push(*task_id);
                }
                Some(_) => {}
            }
        }

        let Some(processor) = processor else {
            return Ok(());
        };

        let forgotten: Vec<Uuid> = processor
            .assigned_task_ids
            .iter()
            .filter(|assigned| !known_task_ids.contains(assigned))
            .copied()
            .collect();

        for task_id in forgotten {
            let Some(mut task) = self.store.load_task(task_id).await? else {
                processor.retire_assignment(task_id);
                continue;
            };
            if !task.state.is_dispatched() {
                processor.retire_assignment(task_id);
                continue;
            }

            warn!(
                task_id = %task_id,
                processor_id = %processor.id,
                "Processor discarded an in-flight assignment, re-marking task retriable"
            );
            {
                let lock = self.locks.lock_for(task.exec_context_id);
                let _guard = lock.write();
                TaskStateMachine::transition_guarded(&self.locks, &mut task, TaskState::Error)?;
                TaskStateMachine::transition_guarded(&self.locks, &mut task, TaskState::InQueue)?;
            }
            self.queue.unassign_task(task_id);
            processor.retire_assignment(task_id);
            self.store.save_task(&task).await?;
        }
        Ok(())
    }

    /// Accept a reported result: record uploaded outputs, transition the
    /// task, store the result in the cache, and retire the queue entry.
    async fn store_task_result(
        &self,
        processor: Option<&mut Processor>,
        result: &TaskResultReport,
        response: &mut DispatcherResponse,
    ) -> Result<()> {
        let Some(mut task) = self.store.load_task(result.task_id).await? else {
            warn!(
                task_id = %result.task_id,
                "Result reported for a task the dispatcher has no record of"
            );
            response.discard_task_ids.push(result.task_id);
            return Ok(());
        };

        if !task.state.is_dispatched() {
            // Stale delivery of an already-reconciled result.
            debug!(
                task_id = %task.id,
                state = %task.state,
                "Ignoring result for a task that is not in flight"
            );
            response.discard_task_ids.push(result.task_id);
            return Ok(());
        }

        for uploaded in &result.outputs {
            let Some(mut variable) = self.store.load_variable(uploaded.variable_id).await? else {
                warn!(
                    variable_id = %uploaded.variable_id,
                    task_id = %task.id,
                    "Uploaded output references an unknown variable"
                );
                continue;
            };
            if uploaded.nullified {
                variable.nullify();
            } else if variable.state != VariableState::Initialized {
                variable.initialize(
                    uploaded.content_hash.clone().unwrap_or_default(),
                    uploaded.payload_ref.clone().unwrap_or_default(),
                )?;
            }
            self.store.save_variable(&variable).await?;

            if let Some(output) = task
                .outputs
                .iter_mut()
                .find(|o| o.variable_id == uploaded.variable_id)
            {
                output.content_hash = uploaded.content_hash.clone();
            }

            self.aggregator.register_variable_state(VariableUploadedEvent {
                exec_context_id: task.exec_context_id,
                variable_id: uploaded.variable_id,
                nullified: uploaded.nullified,
            });
        }

        let target = if result.success {
            TaskState::Completed
        } else {
            TaskState::Error
        };
        {
            let lock = self.locks.lock_for(task.exec_context_id);
            let _guard = lock.write();
            if task.state == TaskState::Assigned {
                TaskStateMachine::transition_guarded(&self.locks, &mut task, TaskState::InProgress)?;
            }
            TaskStateMachine::transition_guarded(&self.locks, &mut task, target)?;
        }

        if result.success {
            self.store_in_cache(&task, result).await;
        }

        self.queue.deregister_task(task.id);
        if let Some(processor) = processor {
            processor.retire_assignment(task.id);
        }
        self.store.save_task(&task).await?;
        self.publisher
            .publish_task_finished(task.exec_context_id, task.id, &target.to_string());
        response.acknowledged_task_ids.push(task.id);
        Ok(())
    }

    /// Best effort: a cache write failure must not fail result
    /// acceptance.
    async fn store_in_cache(&self, task: &Task, result: &TaskResultReport) {
        let outputs: Vec<CachedOutput> = task
            .outputs
            .iter()
            .filter_map(|output| {
                result
                    .outputs
                    .iter()
                    .find(|uploaded| uploaded.variable_id == output.variable_id)
                    .map(|uploaded| CachedOutput {
                        name: output.name.clone(),
                        content_hash: uploaded.content_hash.clone(),
                        payload_ref: uploaded.payload_ref.clone(),
                        nullified: uploaded.nullified,
                    })
            })
            .collect();

        let signature = match crate::cache::TaskSignature::compute(task) {
            Ok(signature) => signature,
            Err(error) => {
                warn!(task_id = %task.id, error = %error, "Cannot compute cache signature");
                return;
            }
        };
        if let Err(error) = self.cache.store(&signature, outputs).await {
            warn!(
                task_id = %task.id,
                error = %error,
                "Failed to store task result in cache"
            );
        }
    }

    /// Pull the next eligible task for this processor, consulting the
    /// cache before committing to dispatch. Cache hits complete in place
    /// and the scan continues with the next candidate.
    async fn assign_next_task(&self, processor: &mut Processor) -> Result<Option<TaskAssignment>> {
        for queued in self.queue.assignable_tasks() {
            if queued.assigned {
                continue;
            }
            // Re-load: the queue snapshot is only an offer order, the
            // durable record decides.
            let Some(mut task) = self.store.load_task(queued.task.id).await? else {
                self.queue.deregister_task(queued.task.id);
                continue;
            };
            if task.state != TaskState::InQueue {
                continue;
            }
            let Some(function) = task.function.clone() else {
                warn!(task_id = %task.id, "Skipping queued task with no function reference");
                continue;
            };

            {
                let lock = self.locks.lock_for(task.exec_context_id);
                let _guard = lock.write();
                TaskStateMachine::transition_guarded(&self.locks, &mut task, TaskState::CheckCache)?;
            }
            self.store.save_task(&task).await?;

            match self.cache.resolve(&task).await? {
                CacheDecision::Hit(entry) => {
                    self.complete_from_cache(task, entry).await?;
                    // This candidate never reaches a processor; keep
                    // scanning.
                }
                CacheDecision::Miss(_) => {
                    {
                        let lock = self.locks.lock_for(task.exec_context_id);
                        let _guard = lock.write();
                        TaskStateMachine::transition_guarded(
                            &self.locks,
                            &mut task,
                            TaskState::Assigned,
                        )?;
                    }
                    self.queue.assign_task(task.id);
                    processor.record_assignment(task.id);
                    self.store.save_task(&task).await?;

                    return Ok(Some(TaskAssignment {
                        task_id: task.id,
                        exec_context_id: task.exec_context_id,
                        function,
                        inputs: task.inputs.clone(),
                        outputs: task.outputs.clone(),
                    }));
                }
            }
        }
        Ok(None)
    }

    /// Complete a task from a cache entry: copy the cached output
    /// references onto the task's own output variables and publish the
    /// same readiness events a real completion would, so downstream
    /// consumers cannot tell the difference.
    async fn complete_from_cache(&self, mut task: Task, entry: CacheEntry) -> Result<()> {
        for index in 0..task.outputs.len() {
            let output = task.outputs[index].clone();
            let Some(cached) = entry.outputs.iter().find(|c| c.name == output.name) else {
                warn!(
                    task_id = %task.id,
                    output = %output.name,
                    "Cache entry is missing an output slot, completing without it"
                );
                continue;
            };

            if let Some(mut variable) = self.store.load_variable(output.variable_id).await? {
                if cached.nullified {
                    variable.nullify();
                } else if variable.state != VariableState::Initialized {
                    variable.initialize(
                        cached.content_hash.clone().unwrap_or_default(),
                        cached.payload_ref.clone().unwrap_or_default(),
                    )?;
                }
                self.store.save_variable(&variable).await?;
            }

            task.outputs[index].content_hash = cached.content_hash.clone();
            self.aggregator.register_variable_state(VariableUploadedEvent {
                exec_context_id: task.exec_context_id,
                variable_id: output.variable_id,
                nullified: cached.nullified,
            });
        }

        {
            let lock = self.locks.lock_for(task.exec_context_id);
            let _guard = lock.write();
            TaskStateMachine::transition_guarded(&self.locks, &mut task, TaskState::Completed)?;
        }
        self.queue.deregister_task(task.id);
        self.store.save_task(&task).await?;
        self.publisher.publish_task_finished(
            task.exec_context_id,
            task.id,
            &TaskState::Completed.to_string(),
        );
        Ok(())
    }
}
