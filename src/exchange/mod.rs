//! # Dispatcher-Processor Exchange
//!
//! Translates an inbound processor report into the internal operations it
//! implies and produces the outbound response. Transport framing is the
//! embedding service's concern; this module sees reports as already
//! deserialized values.

pub mod processor_exchange;
pub mod types;

pub use processor_exchange::ProcessorExchange;
pub use types::{
    DispatcherResponse, IssuedIdentity, ProcessorReport, ResendStatus, TaskAssignment,
    TaskResultReport, UploadedOutput,
};
