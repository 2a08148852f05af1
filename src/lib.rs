#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Dispatcher Core
//!
//! Task-scheduling and result-caching core for dispatching long-running,
//! multi-step pipelines across a pool of remote processors.
//!
//! ## Overview
//!
//! A pipeline engine decomposes each running pipeline ("execution
//! context") into tasks and pushes producible ones into the task queue.
//! Processors poll the dispatcher; the exchange pulls the next eligible
//! task from the queue, consults the result cache first, and assigns the
//! task only when no cached result exists. As processors report uploads
//! and outcomes, readiness events accumulate in the aggregator and are
//! flushed in periodic batches to each context's variable-state snapshot,
//! triggering the completion checks that unblock downstream tasks.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐    ┌─────────────────┐    ┌──────────────────┐
//! │ Pipeline Engine │───▶│ TaskQueue       │◀───│ ProcessorExchange│◀──▶ processors
//! │ (external)      │    │ (groups/order)  │    │ (report/response)│
//! └─────────────────┘    └─────────────────┘    └──────────────────┘
//!          │                      ▲                      │
//!          ▼                      │ cache hit = complete ▼
//! ┌─────────────────────┐   ┌─────┴──────────┐    ┌──────────────┐
//! │ VariableState       │   │ TaskResultCache│    │ DispatchStore│
//! │ Aggregator (flush)  │   │ (signatures)   │    │ (external)   │
//! └─────────────────────┘   └────────────────┘    └──────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`models`] - Task, variable, context, cache-entry, processor records
//! - [`state_machine`] - Lifecycle states and transition rules
//! - [`locking`] - Per-key reentrant read/write locks with loud preconditions
//! - [`cache`] - Signature computation and the result cache engine
//! - [`queue`] - Context-grouped task queue
//! - [`events`] - Readiness event buffering, flushing, and publishing
//! - [`exchange`] - Dispatcher-processor report processing
//! - [`storage`] - Durable store boundary and in-memory reference store
//! - [`core`] - The long-lived scheduler instance and its lifecycle
//! - [`config`] - Configuration management
//! - [`error`] - Structured error handling
//!
//! ## Concurrency Model
//!
//! Multiple worker threads operate concurrently; state scoped to one
//! execution context is serialized by that context's write lock from the
//! [`locking::LockRegistry`], while different contexts proceed fully in
//! parallel. Critical sections hold locks across in-memory mutation only,
//! never across store I/O.

pub mod cache;
pub mod config;
pub mod constants;
pub mod core;
pub mod error;
pub mod events;
pub mod exchange;
pub mod locking;
pub mod logging;
pub mod models;
pub mod queue;
pub mod state_machine;
pub mod storage;

pub use cache::{CacheDecision, TaskResultCache, TaskSignature};
pub use config::DispatcherConfig;
pub use core::DispatcherCore;
pub use error::{DispatcherError, Result};
pub use events::{EventPublisher, VariableStateAggregator};
pub use exchange::{DispatcherResponse, ProcessorExchange, ProcessorReport};
pub use locking::LockRegistry;
pub use queue::{TaskGroup, TaskQueue};
pub use state_machine::{ContextState, TaskState, VariableState};
pub use storage::{DispatchStore, InMemoryStore};
