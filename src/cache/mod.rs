//! # Task Result Cache
//!
//! Content-addressable cache of task outputs. A task's execution is keyed
//! by a stable signature of its function code and input contents; a task
//! whose signature already has an entry completes from the cache without
//! ever reaching a processor, and publishes the same readiness events as a
//! genuine execution.

pub mod engine;
pub mod signature;

pub use engine::{CacheDecision, TaskResultCache};
pub use signature::TaskSignature;
