//! System-wide constants and defaults.
//!
//! Tunable values live in [`crate::config::DispatcherConfig`]; the defaults
//! here are the values used when nothing overrides them.

/// Maximum number of tasks one task group accepts before the queue opens a
/// new group for the same execution context.
pub const DEFAULT_GROUP_CAPACITY: usize = 100;

/// Minimum number of resident groups the queue keeps through `shrink()`.
pub const DEFAULT_MIN_RESIDENT_GROUPS: usize = 5;

/// Interval between aggregator flush cycles, in milliseconds.
pub const DEFAULT_FLUSH_INTERVAL_MS: u64 = 500;

/// Capacity of the broadcast channel carrying follow-up events.
pub const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 1000;

/// Lock-registry size past which opportunistic reclaim runs.
pub const DEFAULT_LOCK_REGISTRY_WATERMARK: usize = 10_000;

/// Version of the cache-signature hashing scheme. Participates in every
/// signature, so bumping it orphans all previously stored entries instead
/// of mismatching old and new keys.
pub const SIGNATURE_SCHEME_VERSION: u32 = 1;

/// Event names published on the follow-up channel.
pub mod events {
    /// A task's outputs may now all be ready; re-check its completion.
    pub const CHECK_TASK_COMPLETION: &str = "task.check_completion";
    /// A task reached a terminal state.
    pub const TASK_FINISHED: &str = "task.finished";
    /// An execution context was deleted and its queue state dropped.
    pub const CONTEXT_DELETED: &str = "context.deleted";
}
