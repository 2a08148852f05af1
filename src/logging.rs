//! # Structured Logging Module
//!
//! Environment-aware structured logging for debugging concurrent scheduling
//! and flush cycles without attaching a debugger.

use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};
use uuid::Uuid;

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize structured logging with environment-specific configuration.
///
/// Production environments get JSON output for log shipping; everything
/// else gets a human-readable console layer. Safe to call more than once.
pub fn init_structured_logging() {
    LOGGER_INITIALIZED.get_or_init(|| {
        let environment = get_environment();
        let log_level = get_log_level(&environment);

        let result = if environment == "production" {
            tracing_subscriber::registry()
                .with(
                    fmt::layer()
                        .with_target(true)
                        .with_thread_ids(true)
                        .with_ansi(false)
                        .json()
                        .with_filter(EnvFilter::new(log_level)),
                )
                .try_init()
        } else {
            tracing_subscriber::registry()
                .with(
                    fmt::layer()
                        .with_target(true)
                        .with_thread_ids(true)
                        .with_ansi(true)
                        .with_filter(EnvFilter::new(log_level)),
                )
                .try_init()
        };

        // A global subscriber may already be set by the embedding process;
        // that is not an error.
        if result.is_err() {
            tracing::debug!("Global tracing subscriber already initialized");
        }

        tracing::info!(
            environment = %environment,
            "Structured logging initialized"
        );
    });
}

/// Get current environment from environment variables.
fn get_environment() -> String {
    std::env::var("DISPATCHER_ENV")
        .or_else(|_| std::env::var("APP_ENV"))
        .unwrap_or_else(|_| "development".to_string())
}

/// Get log level based on environment.
fn get_log_level(environment: &str) -> String {
    match environment {
        "production" => "info".to_string(),
        _ => "debug".to_string(),
    }
}

/// Log a queue operation with structured fields.
pub fn log_queue_operation(
    operation: &str,
    exec_context_id: Option<Uuid>,
    task_id: Option<Uuid>,
    group_count: usize,
    details: Option<&str>,
) {
    tracing::info!(
        operation = %operation,
        exec_context_id = ?exec_context_id,
        task_id = ?task_id,
        group_count = group_count,
        details = details,
        "QUEUE_OPERATION"
    );
}

/// Log a cache operation with structured fields.
pub fn log_cache_operation(
    operation: &str,
    signature: Option<&str>,
    hit: Option<bool>,
    details: Option<&str>,
) {
    tracing::info!(
        operation = %operation,
        signature = signature,
        hit = hit,
        details = details,
        "CACHE_OPERATION"
    );
}

/// Log one aggregator flush cycle.
pub fn log_flush_cycle(
    contexts_flushed: usize,
    tasks_merged: usize,
    variables_merged: usize,
    followups_published: usize,
) {
    tracing::info!(
        contexts_flushed = contexts_flushed,
        tasks_merged = tasks_merged,
        variables_merged = variables_merged,
        followups_published = followups_published,
        "FLUSH_CYCLE"
    );
}

/// Log one dispatcher-processor exchange.
pub fn log_exchange(
    processor_id: Option<Uuid>,
    assigned_task_id: Option<Uuid>,
    results_stored: usize,
    details: Option<&str>,
) {
    tracing::info!(
        processor_id = ?processor_id,
        assigned_task_id = ?assigned_task_id,
        results_stored = results_stored,
        details = details,
        "PROCESSOR_EXCHANGE"
    );
}
