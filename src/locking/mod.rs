//! # Per-Key Locking
//!
//! Every execution context, cache entry, and variable-state snapshot id
//! maps to exactly one reentrant read/write lock for the life of the
//! process. All mutation of state scoped to an id must hold that id's
//! write lock; the precondition is asserted explicitly and fails loudly
//! instead of silently serializing, so a missing lock shows up as a panic
//! in development rather than a data race in production.

pub mod reentrant;
pub mod registry;

pub use reentrant::{ReentrantRwLock, ReentrantReadGuard, ReentrantWriteGuard};
pub use registry::LockRegistry;
