//! Cached task result, keyed by execution signature.
//!
//! Entries are written once and deleted on invalidation, never mutated in
//! place. Recreation after invalidation produces a fresh entry id.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One cached output payload reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedOutput {
    pub name: String,
    pub content_hash: Option<String>,
    pub payload_ref: Option<String>,
    /// The original execution produced an explicitly empty value.
    pub nullified: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub id: Uuid,
    pub signature: String,
    pub outputs: Vec<CachedOutput>,
    pub created_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn new<S: Into<String>>(signature: S, outputs: Vec<CachedOutput>) -> Self {
        Self {
            id: Uuid::new_v4(),
            signature: signature.into(),
            outputs,
            created_at: Utc::now(),
        }
    }
}
