//! # Data Model
//!
//! Records the scheduling core operates on. Durable persistence of these
//! records lives behind [`crate::storage::DispatchStore`]; everything here
//! is plain data with serde derives so the store boundary stays
//! technology-agnostic.

pub mod cache_entry;
pub mod execution_context;
pub mod processor;
pub mod task;
pub mod variable;
pub mod variable_state_snapshot;

pub use cache_entry::{CacheEntry, CachedOutput};
pub use execution_context::ExecutionContext;
pub use processor::{Processor, ProcessorStatus};
pub use task::{FunctionRef, Task, VariableRef};
pub use variable::Variable;
pub use variable_state_snapshot::{SlotState, TaskReadiness, VariableStateSnapshot};
