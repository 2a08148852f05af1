//! Per-key lock registry.
//!
//! Maps an id (execution context, cache entry, snapshot) to its one lock
//! instance. The invariant the whole scheduling design depends on: two
//! callers asking for the same key must never receive different lock
//! instances. `DashMap`'s entry API serializes insertion per shard, and
//! reclamation runs under the same shard locks, so a lock is never dropped
//! out from under a concurrent lookup.

use crate::locking::ReentrantRwLock;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug)]
pub struct LockRegistry {
    locks: DashMap<Uuid, Arc<ReentrantRwLock>>,
    /// Registry size past which `lock_for` runs an opportunistic reclaim.
    watermark: usize,
}

impl LockRegistry {
    pub fn new(watermark: usize) -> Self {
        Self {
            locks: DashMap::new(),
            watermark,
        }
    }

    /// Resolve the lock for `key`, creating it on first use. Equal keys
    /// always resolve to the same instance.
    pub fn lock_for(&self, key: Uuid) -> Arc<ReentrantRwLock> {
        let lock = self
            .locks
            .entry(key)
            .or_insert_with(|| Arc::new(ReentrantRwLock::new()))
            .clone();

        if self.locks.len() > self.watermark {
            let reclaimed = self.reclaim();
            debug!(
                reclaimed = reclaimed,
                remaining = self.locks.len(),
                "Lock registry passed watermark, reclaimed idle locks"
            );
        }

        lock
    }

    /// Whether the calling thread holds the write lock for `key`.
    pub fn is_write_held_by_current_thread(&self, key: Uuid) -> bool {
        self.locks
            .get(&key)
            .map(|entry| entry.is_write_held_by_current_thread())
            .unwrap_or(false)
    }

    /// Lock-precondition check for mutating operations. A caller that does
    /// not hold the write lock is a bug, not a recoverable condition.
    ///
    /// # Panics
    ///
    /// Panics when the calling thread does not hold the write lock for
    /// `key`.
    pub fn assert_write_held(&self, key: Uuid) {
        assert!(
            self.is_write_held_by_current_thread(key),
            "write lock for key {key} is not held by the calling thread; \
             acquire it before mutating state scoped to this key"
        );
    }

    /// Drop registry entries whose lock is neither held nor referenced
    /// outside the registry. Returns the number of entries removed.
    ///
    /// Runs under the map's shard locks, so a concurrent `lock_for` on the
    /// same key either completes before the check (raising the reference
    /// count, keeping the entry) or after the removal (recreating a fresh
    /// lock nobody else could have been using).
    pub fn reclaim(&self) -> usize {
        let before = self.locks.len();
        self.locks
            .retain(|_, lock| Arc::strong_count(lock) > 1 || lock.is_locked());
        before - self.locks.len()
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

impl Default for LockRegistry {
    fn default() -> Self {
        Self::new(crate::constants::DEFAULT_LOCK_REGISTRY_WATERMARK)
    }
}
