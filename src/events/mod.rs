//! # Event System
//!
//! Readiness notifications flow in from the pipeline engine and the
//! processor exchange, accumulate in per-context buffers, and are applied
//! to the variable-state snapshots in periodic batches. Follow-up events
//! ("re-check whether task X can finish") fan out over a broadcast
//! channel after each flush.

pub mod aggregator;
pub mod buffer;
pub mod publisher;

pub use aggregator::{
    FlushStats, TaskCreatedEvent, VariableStateAggregator, VariableUploadedEvent,
};
pub use buffer::EventBuffer;
pub use publisher::{DispatchEvent, EventPublisher, PublishError};
