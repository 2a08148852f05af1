//! # Task Queue
//!
//! Priority-ordered, execution-context-grouped queue of tasks awaiting
//! assignment. Queue membership and group contents are both protected by
//! one queue-level read/write lock; task *state* transitions stay under
//! the owning context's lock from the registry. Group invariants
//! (context exclusivity, capacity, no additions after lock) are caller
//! contracts and violate loudly.

pub mod task_group;
pub mod task_queue;

pub use task_group::{QueuedTask, TaskGroup};
pub use task_queue::TaskQueue;
