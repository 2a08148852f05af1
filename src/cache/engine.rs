//! Cache lookup, store, and invalidation.

use crate::cache::TaskSignature;
use crate::error::Result;
use crate::logging::log_cache_operation;
use crate::models::{CacheEntry, CachedOutput, Task};
use crate::storage::DispatchStore;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

/// Outcome of checking a task against the cache.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheDecision {
    /// An entry exists; the task can complete with these outputs without
    /// being dispatched.
    Hit(CacheEntry),
    /// No entry; the task must execute. The computed signature is carried
    /// so the result can be stored after execution without rehashing.
    Miss(TaskSignature),
}

/// Content-addressable store of task results.
///
/// Writes and invalidations racing on one signature are serialized under a
/// per-signature commit lock that is held across the durable write, so an
/// invalidation can never be outrun by a store that began earlier. The
/// commit lock is an async mutex rather than a registry lock because the
/// critical section here necessarily spans store I/O.
pub struct TaskResultCache {
    store: Arc<dyn DispatchStore>,
    commit_locks: DashMap<Uuid, Arc<Mutex<()>>>,
}

impl TaskResultCache {
    pub fn new(store: Arc<dyn DispatchStore>) -> Self {
        Self {
            store,
            commit_locks: DashMap::new(),
        }
    }

    fn commit_lock(&self, key: Uuid) -> Arc<Mutex<()>> {
        self.commit_locks
            .entry(key)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Look up the entry for a signature. Absence is a normal result.
    pub async fn lookup(&self, signature: &TaskSignature) -> Result<Option<CacheEntry>> {
        let entry = self
            .store
            .find_cache_entry_by_signature(signature.as_str())
            .await?;
        log_cache_operation(
            "lookup",
            Some(signature.as_str()),
            Some(entry.is_some()),
            None,
        );
        Ok(entry)
    }

    /// Store outputs under a signature. First writer wins: when an entry
    /// already exists the write is a no-op and the existing entry is
    /// returned, so concurrent identical tasks cannot duplicate the cache.
    pub async fn store(
        &self,
        signature: &TaskSignature,
        outputs: Vec<CachedOutput>,
    ) -> Result<CacheEntry> {
        let lock = self.commit_lock(signature.lock_key());
        let _commit = lock.lock().await;

        if let Some(existing) = self
            .store
            .find_cache_entry_by_signature(signature.as_str())
            .await?
        {
            debug!(signature = %signature, "Cache entry already present, store is a no-op");
            return Ok(existing);
        }

        let entry = CacheEntry::new(signature.as_str(), outputs);
        self.store.save_cache_entry(&entry).await?;
        log_cache_operation("store", Some(signature.as_str()), None, None);
        Ok(entry)
    }

    /// Delete an entry by id. Safe to call when the entry is already
    /// absent.
    pub async fn invalidate(&self, entry_id: Uuid) -> Result<()> {
        let Some(entry) = self.store.load_cache_entry(entry_id).await? else {
            return Ok(());
        };

        // Serialize with any in-flight store on the same signature.
        let lock = self.commit_lock(TaskSignature::lock_key_of(&entry.signature));
        let _commit = lock.lock().await;

        self.store.delete_cache_entry(entry_id).await?;
        log_cache_operation("invalidate", Some(&entry.signature), None, None);
        Ok(())
    }

    /// CHECK_CACHE decision for a task: compute the signature and decide
    /// hit or miss. A task with no function reference is rejected before
    /// the cache is consulted.
    pub async fn resolve(&self, task: &Task) -> Result<CacheDecision> {
        let signature = TaskSignature::compute(task)?;
        match self.lookup(&signature).await? {
            Some(entry) => Ok(CacheDecision::Hit(entry)),
            None => Ok(CacheDecision::Miss(signature)),
        }
    }
}
