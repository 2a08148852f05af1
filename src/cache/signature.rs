//! Cache signature computation.
//!
//! The signature is a pure function of {scheme version, function code,
//! sorted (input name, content hash) pairs}. It is stable across process
//! restarts and independent of the order inputs were added to the task.
//! The scheme version participates in the hash itself, so bumping
//! [`crate::constants::SIGNATURE_SCHEME_VERSION`] orphans every previously
//! stored entry instead of mismatching old and new keys.

use crate::constants::SIGNATURE_SCHEME_VERSION;
use crate::error::{DispatcherError, Result};
use crate::models::Task;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskSignature(String);

impl TaskSignature {
    /// Compute the signature for a task. Fails only for a malformed task
    /// with no function reference; inputs without a content hash yet are
    /// hashed as empty, which is stable because an initialized variable is
    /// never silently reassigned.
    pub fn compute(task: &Task) -> Result<Self> {
        let function = task
            .function
            .as_ref()
            .ok_or(DispatcherError::MissingFunction { task_id: task.id })?;

        let mut pairs: Vec<(&str, &str)> = task
            .inputs
            .iter()
            .map(|input| {
                (
                    input.name.as_str(),
                    input.content_hash.as_deref().unwrap_or(""),
                )
            })
            .collect();
        pairs.sort_unstable();

        let mut hasher = Sha256::new();
        hasher.update(SIGNATURE_SCHEME_VERSION.to_be_bytes());
        // Fields are length-prefixed so adjacent values cannot collide.
        hasher.update((function.code.len() as u64).to_be_bytes());
        hasher.update(function.code.as_bytes());
        for (name, content_hash) in pairs {
            hasher.update((name.len() as u64).to_be_bytes());
            hasher.update(name.as_bytes());
            hasher.update((content_hash.len() as u64).to_be_bytes());
            hasher.update(content_hash.as_bytes());
        }

        Ok(Self(hex::encode(hasher.finalize())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Key used to serialize store/invalidate races on this signature:
    /// the first 16 digest bytes, which are unique exactly when the
    /// signature is.
    pub fn lock_key(&self) -> Uuid {
        Self::lock_key_of(&self.0)
    }

    /// Commit-lock key for a signature string loaded back from the store.
    pub(crate) fn lock_key_of(signature: &str) -> Uuid {
        if signature.len() >= 32 {
            if let Ok(bytes) = hex::decode(&signature[..32]) {
                if let Ok(uuid) = Uuid::from_slice(&bytes) {
                    return uuid;
                }
            }
        }
        Uuid::nil()
    }
}

impl fmt::Display for TaskSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FunctionRef, VariableRef};

    fn base_task() -> Task {
        Task::new(Uuid::new_v4(), Uuid::new_v4(), 0)
            .with_function(FunctionRef::new("def transform(x): return x"))
    }

    #[test]
    fn test_signature_ignores_input_order() {
        let var_a = VariableRef::new(Uuid::new_v4(), "a").with_content_hash("hash_a");
        let var_b = VariableRef::new(Uuid::new_v4(), "b").with_content_hash("hash_b");

        let forward = base_task()
            .with_input(var_a.clone())
            .with_input(var_b.clone());
        let reversed = base_task().with_input(var_b).with_input(var_a);

        assert_eq!(
            TaskSignature::compute(&forward).unwrap(),
            TaskSignature::compute(&reversed).unwrap()
        );
    }

    #[test]
    fn test_signature_depends_on_content() {
        let var_id = Uuid::new_v4();
        let one = base_task()
            .with_input(VariableRef::new(var_id, "a").with_content_hash("hash_1"));
        let other = base_task()
            .with_input(VariableRef::new(var_id, "a").with_content_hash("hash_2"));

        assert_ne!(
            TaskSignature::compute(&one).unwrap(),
            TaskSignature::compute(&other).unwrap()
        );
    }

    #[test]
    fn test_signature_depends_on_function_code() {
        let input = VariableRef::new(Uuid::new_v4(), "a").with_content_hash("h");
        let one = Task::new(Uuid::new_v4(), Uuid::new_v4(), 0)
            .with_function(FunctionRef::new("f1"))
            .with_input(input.clone());
        let other = Task::new(Uuid::new_v4(), Uuid::new_v4(), 0)
            .with_function(FunctionRef::new("f2"))
            .with_input(input);

        assert_ne!(
            TaskSignature::compute(&one).unwrap(),
            TaskSignature::compute(&other).unwrap()
        );
    }

    #[test]
    fn test_signature_independent_of_task_identity() {
        // Two tasks constructed independently with equal code and inputs
        // must collide, or the cache never hits.
        let var_id = Uuid::new_v4();
        let make = || {
            Task::new(Uuid::new_v4(), Uuid::new_v4(), 7)
                .with_function(FunctionRef::new("code"))
                .with_input(VariableRef::new(var_id, "x").with_content_hash("h"))
        };
        assert_eq!(
            TaskSignature::compute(&make()).unwrap(),
            TaskSignature::compute(&make()).unwrap()
        );
    }

    #[test]
    fn test_missing_function_rejected() {
        let task = Task::new(Uuid::new_v4(), Uuid::new_v4(), 0);
        let err = TaskSignature::compute(&task).unwrap_err();
        assert!(matches!(err, DispatcherError::MissingFunction { .. }));
    }

    #[test]
    fn test_lock_key_is_stable() {
        let task = base_task();
        let sig = TaskSignature::compute(&task).unwrap();
        assert_eq!(sig.lock_key(), sig.lock_key());
    }
}
