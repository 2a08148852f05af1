//! In-memory reference implementation of the durable store boundary.
//!
//! Backs the test suite and embedders that bring no database. All maps are
//! sharded concurrent maps, so the "reads see prior committed writes"
//! contract holds across threads without an outer lock.

use crate::error::Result;
use crate::models::{
    CacheEntry, ExecutionContext, Processor, Task, Variable, VariableStateSnapshot,
};
use crate::storage::DispatchStore;
use async_trait::async_trait;
use dashmap::DashMap;
use uuid::Uuid;

#[derive(Debug, Default)]
pub struct InMemoryStore {
    tasks: DashMap<Uuid, Task>,
    variables: DashMap<Uuid, Variable>,
    contexts: DashMap<Uuid, ExecutionContext>,
    snapshots: DashMap<Uuid, VariableStateSnapshot>,
    cache_entries: DashMap<Uuid, CacheEntry>,
    processors: DashMap<Uuid, Processor>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DispatchStore for InMemoryStore {
    async fn load_task(&self, id: Uuid) -> Result<Option<Task>> {
        Ok(self.tasks.get(&id).map(|t| t.clone()))
    }

    async fn save_task(&self, task: &Task) -> Result<()> {
        self.tasks.insert(task.id, task.clone());
        Ok(())
    }

    async fn delete_task(&self, id: Uuid) -> Result<()> {
        self.tasks.remove(&id);
        Ok(())
    }

    async fn task_ids_by_context(&self, exec_context_id: Uuid) -> Result<Vec<Uuid>> {
        Ok(self
            .tasks
            .iter()
            .filter(|entry| entry.exec_context_id == exec_context_id)
            .map(|entry| entry.id)
            .collect())
    }

    async fn load_variable(&self, id: Uuid) -> Result<Option<Variable>> {
        Ok(self.variables.get(&id).map(|v| v.clone()))
    }

    async fn save_variable(&self, variable: &Variable) -> Result<()> {
        self.variables.insert(variable.id, variable.clone());
        Ok(())
    }

    async fn delete_variable(&self, id: Uuid) -> Result<()> {
        self.variables.remove(&id);
        Ok(())
    }

    async fn variable_ids_by_context(&self, exec_context_id: Uuid) -> Result<Vec<Uuid>> {
        Ok(self
            .variables
            .iter()
            .filter(|entry| entry.exec_context_id == exec_context_id)
            .map(|entry| entry.id)
            .collect())
    }

    async fn load_context(&self, id: Uuid) -> Result<Option<ExecutionContext>> {
        Ok(self.contexts.get(&id).map(|c| c.clone()))
    }

    async fn save_context(&self, context: &ExecutionContext) -> Result<()> {
        self.contexts.insert(context.id, context.clone());
        Ok(())
    }

    async fn delete_context(&self, id: Uuid) -> Result<()> {
        self.contexts.remove(&id);
        Ok(())
    }

    async fn load_snapshot(&self, id: Uuid) -> Result<Option<VariableStateSnapshot>> {
        Ok(self.snapshots.get(&id).map(|s| s.clone()))
    }

    async fn save_snapshot(&self, snapshot: &VariableStateSnapshot) -> Result<()> {
        self.snapshots.insert(snapshot.id, snapshot.clone());
        Ok(())
    }

    async fn delete_snapshot(&self, id: Uuid) -> Result<()> {
        self.snapshots.remove(&id);
        Ok(())
    }

    async fn load_cache_entry(&self, id: Uuid) -> Result<Option<CacheEntry>> {
        Ok(self.cache_entries.get(&id).map(|e| e.clone()))
    }

    async fn find_cache_entry_by_signature(
        &self,
        signature: &str,
    ) -> Result<Option<CacheEntry>> {
        Ok(self
            .cache_entries
            .iter()
            .find(|entry| entry.signature == signature)
            .map(|entry| entry.clone()))
    }

    async fn save_cache_entry(&self, entry: &CacheEntry) -> Result<()> {
        self.cache_entries.insert(entry.id, entry.clone());
        Ok(())
    }

    async fn delete_cache_entry(&self, id: Uuid) -> Result<()> {
        self.cache_entries.remove(&id);
        Ok(())
    }

    async fn load_processor(&self, id: Uuid) -> Result<Option<Processor>> {
        Ok(self.processors.get(&id).map(|p| p.clone()))
    }

    async fn save_processor(&self, processor: &Processor) -> Result<()> {
        self.processors.insert(processor.id, processor.clone());
        Ok(())
    }

    async fn delete_processor(&self, id: Uuid) -> Result<()> {
        self.processors.remove(&id);
        Ok(())
    }
}
