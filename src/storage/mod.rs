//! # Durable Store Boundary
//!
//! The scheduling core reaches persistent task, variable, cache-entry,
//! context, snapshot, and processor records through [`DispatchStore`]. The
//! contract is deliberately small: writes commit before the call returns,
//! reads see prior committed writes, and absence is `Ok(None)`, never an
//! error. Nothing here assumes a particular storage technology; a
//! database-backed implementation lives with the embedding service.

pub mod memory;

use crate::error::Result;
use crate::models::{
    CacheEntry, ExecutionContext, Processor, Task, Variable, VariableStateSnapshot,
};
use async_trait::async_trait;
use uuid::Uuid;

#[async_trait]
pub trait DispatchStore: Send + Sync {
    // Tasks
    async fn load_task(&self, id: Uuid) -> Result<Option<Task>>;
    async fn save_task(&self, task: &Task) -> Result<()>;
    async fn delete_task(&self, id: Uuid) -> Result<()>;
    async fn task_ids_by_context(&self, exec_context_id: Uuid) -> Result<Vec<Uuid>>;

    // Variables
    async fn load_variable(&self, id: Uuid) -> Result<Option<Variable>>;
    async fn save_variable(&self, variable: &Variable) -> Result<()>;
    async fn delete_variable(&self, id: Uuid) -> Result<()>;
    async fn variable_ids_by_context(&self, exec_context_id: Uuid) -> Result<Vec<Uuid>>;

    // Execution contexts
    async fn load_context(&self, id: Uuid) -> Result<Option<ExecutionContext>>;
    async fn save_context(&self, context: &ExecutionContext) -> Result<()>;
    async fn delete_context(&self, id: Uuid) -> Result<()>;

    // Variable-state snapshots
    async fn load_snapshot(&self, id: Uuid) -> Result<Option<VariableStateSnapshot>>;
    async fn save_snapshot(&self, snapshot: &VariableStateSnapshot) -> Result<()>;
    async fn delete_snapshot(&self, id: Uuid) -> Result<()>;

    // Cache entries
    async fn load_cache_entry(&self, id: Uuid) -> Result<Option<CacheEntry>>;
    async fn find_cache_entry_by_signature(&self, signature: &str)
        -> Result<Option<CacheEntry>>;
    async fn save_cache_entry(&self, entry: &CacheEntry) -> Result<()>;
    async fn delete_cache_entry(&self, id: Uuid) -> Result<()>;

    // Processors
    async fn load_processor(&self, id: Uuid) -> Result<Option<Processor>>;
    async fn save_processor(&self, processor: &Processor) -> Result<()>;
    async fn delete_processor(&self, id: Uuid) -> Result<()>;
}

pub use memory::InMemoryStore;
