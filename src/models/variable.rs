//! Variable record: a named data slot attached to an execution context.
//!
//! The payload itself lives in external artifact storage; the record holds
//! only the reference and readiness flags.

use crate::error::{DispatcherError, Result};
use crate::state_machine::VariableState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    pub id: Uuid,
    pub exec_context_id: Uuid,
    pub name: String,
    pub state: VariableState,
    /// Content hash of the stored payload, set on initialization.
    pub content_hash: Option<String>,
    /// Opaque pointer into artifact storage.
    pub payload_ref: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl Variable {
    pub fn new<S: Into<String>>(exec_context_id: Uuid, name: S) -> Self {
        Self {
            id: Uuid::new_v4(),
            exec_context_id,
            name: name.into(),
            state: VariableState::default(),
            content_hash: None,
            payload_ref: None,
            updated_at: Utc::now(),
        }
    }

    /// Record an uploaded value. An initialized variable cannot be
    /// reassigned; callers wanting recomputation must [`Self::reset`]
    /// first.
    pub fn initialize<S: Into<String>>(&mut self, content_hash: S, payload_ref: S) -> Result<()> {
        if self.state == VariableState::Initialized {
            return Err(DispatcherError::ValidationError(format!(
                "variable {} ({}) is already initialized",
                self.name, self.id
            )));
        }
        self.state = VariableState::Initialized;
        self.content_hash = Some(content_hash.into());
        self.payload_ref = Some(payload_ref.into());
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Mark the slot explicitly empty. Idempotent.
    pub fn nullify(&mut self) {
        self.state = VariableState::Nullified;
        self.content_hash = None;
        self.payload_ref = None;
        self.updated_at = Utc::now();
    }

    /// Explicit reset back to not-initialized, used before recomputation.
    pub fn reset(&mut self) {
        self.state = VariableState::NotInitialized;
        self.content_hash = None;
        self.payload_ref = None;
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initialize_once() {
        let mut var = Variable::new(Uuid::new_v4(), "result");
        var.initialize("abc123", "blob://1").unwrap();
        assert_eq!(var.state, VariableState::Initialized);
        assert_eq!(var.content_hash.as_deref(), Some("abc123"));

        let err = var.initialize("def456", "blob://2").unwrap_err();
        assert!(matches!(err, DispatcherError::ValidationError(_)));
        assert_eq!(var.content_hash.as_deref(), Some("abc123"));
    }

    #[test]
    fn test_reset_allows_reassignment() {
        let mut var = Variable::new(Uuid::new_v4(), "result");
        var.initialize("abc123", "blob://1").unwrap();
        var.reset();
        assert_eq!(var.state, VariableState::NotInitialized);
        var.initialize("def456", "blob://2").unwrap();
        assert_eq!(var.content_hash.as_deref(), Some("def456"));
    }

    #[test]
    fn test_nullify_is_idempotent() {
        let mut var = Variable::new(Uuid::new_v4(), "maybe");
        var.nullify();
        var.nullify();
        assert_eq!(var.state, VariableState::Nullified);
        assert!(var.content_hash.is_none());
    }
}
