//! # Dispatcher Core
//!
//! The single long-lived instance owning the queue, cache, aggregator,
//! lock registry, and publisher. Constructed once at startup with an
//! explicit lifecycle; tests can run as many independent instances in
//! parallel as they like, there is no process-global state.

use crate::cache::TaskResultCache;
use crate::config::DispatcherConfig;
use crate::error::{DispatcherError, Result};
use crate::events::{EventPublisher, TaskCreatedEvent, VariableStateAggregator};
use crate::exchange::ProcessorExchange;
use crate::locking::LockRegistry;
use crate::models::{ExecutionContext, SlotState, Task, Variable, VariableStateSnapshot};
use crate::queue::TaskQueue;
use crate::state_machine::{TaskState, TaskStateMachine};
use crate::storage::DispatchStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};
use uuid::Uuid;

pub struct DispatcherCore {
    config: DispatcherConfig,
    store: Arc<dyn DispatchStore>,
    locks: Arc<LockRegistry>,
    queue: Arc<TaskQueue>,
    cache: Arc<TaskResultCache>,
    aggregator: Arc<VariableStateAggregator>,
    publisher: EventPublisher,
    exchange: Arc<ProcessorExchange>,
}

impl DispatcherCore {
    pub fn new(config: DispatcherConfig, store: Arc<dyn DispatchStore>) -> Self {
        let locks = Arc::new(LockRegistry::new(config.lock_registry_watermark));
        let queue = Arc::new(TaskQueue::new(
            config.group_capacity,
            config.min_resident_groups,
        ));
        let cache = Arc::new(TaskResultCache::new(store.clone()));
        let publisher = EventPublisher::new(config.event_channel_capacity);
        let aggregator = Arc::new(VariableStateAggregator::new(
            store.clone(),
            locks.clone(),
            publisher.clone(),
        ));
        let exchange = Arc::new(ProcessorExchange::new(
            store.clone(),
            queue.clone(),
            cache.clone(),
            aggregator.clone(),
            locks.clone(),
            publisher.clone(),
        ));

        Self {
            config,
            store,
            locks,
            queue,
            cache,
            aggregator,
            publisher,
            exchange,
        }
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    pub fn queue(&self) -> &Arc<TaskQueue> {
        &self.queue
    }

    pub fn cache(&self) -> &Arc<TaskResultCache> {
        &self.cache
    }

    pub fn aggregator(&self) -> &Arc<VariableStateAggregator> {
        &self.aggregator
    }

    pub fn locks(&self) -> &Arc<LockRegistry> {
        &self.locks
    }

    pub fn publisher(&self) -> &EventPublisher {
        &self.publisher
    }

    pub fn exchange(&self) -> &Arc<ProcessorExchange> {
        &self.exchange
    }

    pub fn store(&self) -> &Arc<dyn DispatchStore> {
        &self.store
    }

    /// Create and persist a fresh execution context with its empty
    /// readiness snapshot.
    pub async fn create_execution_context(&self) -> Result<ExecutionContext> {
        let context = ExecutionContext::new();
        let snapshot = VariableStateSnapshot::new(context.snapshot_id, context.id);
        self.store.save_snapshot(&snapshot).await?;
        self.store.save_context(&context).await?;
        info!(exec_context_id = %context.id, "Execution context created");
        Ok(context)
    }

    /// Pipeline-engine entry point: a task became producible. Queues it
    /// and registers the matching task-created readiness event.
    pub async fn add_new_task(&self, mut task: Task) -> Result<()> {
        if !task.is_executable() {
            return Err(DispatcherError::MissingFunction { task_id: task.id });
        }

        {
            let lock = self.locks.lock_for(task.exec_context_id);
            let _guard = lock.write();
            TaskStateMachine::transition_guarded(&self.locks, &mut task, TaskState::InQueue)?;
        }
        self.store.save_task(&task).await?;

        if let Some(mut context) = self.store.load_context(task.exec_context_id).await? {
            context.register_task(task.id);
            self.store.save_context(&context).await?;
        }

        self.aggregator.register_created_task(TaskCreatedEvent {
            task_id: task.id,
            exec_context_id: task.exec_context_id,
            inputs: task
                .inputs
                .iter()
                .map(|input| SlotState::new(input.variable_id, input.name.clone()))
                .collect(),
            outputs: task
                .outputs
                .iter()
                .map(|output| SlotState::new(output.variable_id, output.name.clone()))
                .collect(),
        });

        self.queue.add_new_task(task);
        Ok(())
    }

    /// Create and persist a variable slot owned by a context.
    pub async fn create_variable<S: Into<String>>(
        &self,
        exec_context_id: Uuid,
        name: S,
    ) -> Result<Variable> {
        let variable = Variable::new(exec_context_id, name);
        self.store.save_variable(&variable).await?;
        Ok(variable)
    }

    /// Pipeline-engine entry point: all currently known tasks of the
    /// context are produced; its groups become assignable.
    pub async fn declare_tasks_produced(&self, exec_context_id: Uuid) -> Result<()> {
        if let Some(mut context) = self.store.load_context(exec_context_id).await? {
            context.mark_started();
            self.store.save_context(&context).await?;
        }
        self.queue.lock_context(exec_context_id);
        Ok(())
    }

    /// Delete a context and everything scoped to it: queue groups,
    /// pending readiness events, snapshot, task and variable records.
    /// Cache entries outlive contexts by design. In-flight processor
    /// assignments are left to fail naturally on their next report cycle.
    /// Idempotent; succeeds when nothing exists.
    pub async fn delete_execution_context(&self, exec_context_id: Uuid) -> Result<()> {
        let context = self.store.load_context(exec_context_id).await?;

        {
            let lock = self.locks.lock_for(exec_context_id);
            let _guard = lock.write();
            self.queue.delete_by_context(exec_context_id);
            self.aggregator.drop_context_events(exec_context_id);
        }

        let Some(context) = context else {
            return Ok(());
        };

        for task_id in self.store.task_ids_by_context(exec_context_id).await? {
            self.store.delete_task(task_id).await?;
        }
        for variable_id in self.store.variable_ids_by_context(exec_context_id).await? {
            self.store.delete_variable(variable_id).await?;
        }
        self.store.delete_snapshot(context.snapshot_id).await?;
        self.store.delete_context(exec_context_id).await?;

        self.publisher.publish_context_deleted(exec_context_id);
        info!(exec_context_id = %exec_context_id, "Execution context deleted");
        Ok(())
    }

    /// Task-state-service entry point: a completion check decided the
    /// task finished. Transitions the task under its context's write
    /// lock, retires the queue entry, keeps the durable record, and
    /// publishes the terminal event. A task the store no longer knows is
    /// a no-op; its context was deleted underneath the caller.
    pub async fn complete_task(&self, task_id: Uuid) -> Result<()> {
        self.finish_task(task_id, TaskState::Completed).await
    }

    /// Task-state-service entry point: a completion check decided the
    /// task failed. The task stays in durable storage in ERROR state,
    /// from which an explicit retry may re-queue it.
    pub async fn fail_task(&self, task_id: Uuid) -> Result<()> {
        self.finish_task(task_id, TaskState::Error).await
    }

    async fn finish_task(&self, task_id: Uuid, target: TaskState) -> Result<()> {
        let Some(mut task) = self.store.load_task(task_id).await? else {
            debug!(task_id = %task_id, "Finish requested for an unknown task");
            return Ok(());
        };

        {
            let lock = self.locks.lock_for(task.exec_context_id);
            let _guard = lock.write();
            if task.state == TaskState::Assigned {
                TaskStateMachine::transition_guarded(&self.locks, &mut task, TaskState::InProgress)?;
            }
            TaskStateMachine::transition_guarded(&self.locks, &mut task, target)?;
        }

        self.queue.deregister_task(task.id);
        self.store.save_task(&task).await?;
        self.publisher
            .publish_task_finished(task.exec_context_id, task.id, &target.to_string());
        Ok(())
    }

    /// Start the periodic flush loop. Returns the join handle and a
    /// shutdown signal; send `true` to stop the loop after the current
    /// cycle.
    pub fn spawn_flush_loop(&self) -> (JoinHandle<()>, watch::Sender<bool>) {
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let aggregator = self.aggregator.clone();
        let queue = self.queue.clone();
        let interval = Duration::from_millis(self.config.flush_interval_ms);

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            info!(interval_ms = interval.as_millis() as u64, "Flush loop started");
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let stats = aggregator.process_flushing().await;
                        if stats.contexts_flushed > 0 {
                            queue.shrink();
                        }
                    }
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            info!("Flush loop stopping");
                            break;
                        }
                    }
                }
            }
        });

        (handle, shutdown_tx)
    }
}
