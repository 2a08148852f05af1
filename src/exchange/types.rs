//! Report and response payloads exchanged with processors.
//!
//! Processors populate only the sections relevant to their current state;
//! every absent section is a no-op for the dispatcher, not an error.

use crate::models::{FunctionRef, ProcessorStatus, VariableRef};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One output variable uploaded with a task result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedOutput {
    pub variable_id: Uuid,
    pub content_hash: Option<String>,
    pub payload_ref: Option<String>,
    /// The processor produced an explicitly empty value.
    pub nullified: bool,
}

/// A task the processor finished locally, with its outcome and outputs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskResultReport {
    pub task_id: Uuid,
    pub success: bool,
    pub outputs: Vec<UploadedOutput>,
}

/// Status of a re-upload the dispatcher previously requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResendStatus {
    pub variable_id: Uuid,
    pub resent: bool,
}

/// Inbound processor heartbeat/report.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessorReport {
    pub processor_id: Option<Uuid>,
    pub session_token: Option<String>,
    pub status: Option<ProcessorStatus>,
    /// Tasks finished since the last report.
    pub finished_tasks: Option<Vec<TaskResultReport>>,
    /// Statuses for re-uploads the dispatcher asked for earlier.
    pub resend_statuses: Option<Vec<ResendStatus>>,
    /// Every task the processor currently believes it owns or finished.
    pub known_task_ids: Option<Vec<Uuid>>,
    pub requests_task: bool,
    pub requests_identity: bool,
}

/// A task handed to a processor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskAssignment {
    pub task_id: Uuid,
    pub exec_context_id: Uuid,
    pub function: FunctionRef,
    pub inputs: Vec<VariableRef>,
    pub outputs: Vec<VariableRef>,
}

/// Freshly issued processor identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuedIdentity {
    pub processor_id: Uuid,
    pub session_token: String,
}

/// Outbound dispatcher response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DispatcherResponse {
    pub assigned_task: Option<TaskAssignment>,
    pub issued_identity: Option<IssuedIdentity>,
    /// Variables the processor should upload again.
    pub resend_requests: Vec<Uuid>,
    /// Re-uploads confirmed received; the processor can stop tracking
    /// them.
    pub resend_acknowledgements: Vec<Uuid>,
    /// Task results accepted and recorded durably.
    pub acknowledged_task_ids: Vec<Uuid>,
    /// Tasks whose local state the processor should discard.
    pub discard_task_ids: Vec<Uuid>,
}
