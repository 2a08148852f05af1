//! Configuration for the dispatcher core.
//!
//! Values come from three layers: compiled defaults, an optional TOML file,
//! and `DISPATCHER_*` environment variables, later layers overriding
//! earlier ones.

use crate::constants;
use crate::error::{DispatcherError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
    /// Maximum tasks per task group before a new group opens.
    pub group_capacity: usize,
    /// Floor of resident groups kept through queue shrinking.
    pub min_resident_groups: usize,
    /// Interval between aggregator flush cycles, in milliseconds.
    pub flush_interval_ms: u64,
    /// Capacity of the follow-up event broadcast channel.
    pub event_channel_capacity: usize,
    /// Lock-registry size past which opportunistic reclaim runs.
    pub lock_registry_watermark: usize,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            group_capacity: constants::DEFAULT_GROUP_CAPACITY,
            min_resident_groups: constants::DEFAULT_MIN_RESIDENT_GROUPS,
            flush_interval_ms: constants::DEFAULT_FLUSH_INTERVAL_MS,
            event_channel_capacity: constants::DEFAULT_EVENT_CHANNEL_CAPACITY,
            lock_registry_watermark: constants::DEFAULT_LOCK_REGISTRY_WATERMARK,
        }
    }
}

impl DispatcherConfig {
    /// Build configuration from compiled defaults plus `DISPATCHER_*`
    /// environment variables.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(capacity) = std::env::var("DISPATCHER_GROUP_CAPACITY") {
            config.group_capacity = capacity.parse().map_err(|e| {
                DispatcherError::ConfigurationError(format!("Invalid group_capacity: {e}"))
            })?;
        }

        if let Ok(floor) = std::env::var("DISPATCHER_MIN_RESIDENT_GROUPS") {
            config.min_resident_groups = floor.parse().map_err(|e| {
                DispatcherError::ConfigurationError(format!("Invalid min_resident_groups: {e}"))
            })?;
        }

        if let Ok(interval) = std::env::var("DISPATCHER_FLUSH_INTERVAL_MS") {
            config.flush_interval_ms = interval.parse().map_err(|e| {
                DispatcherError::ConfigurationError(format!("Invalid flush_interval_ms: {e}"))
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file, overlaid with `DISPATCHER_*`
    /// environment variables.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(config::Environment::with_prefix("DISPATCHER").try_parsing(true))
            .build()
            .map_err(|e| DispatcherError::ConfigurationError(e.to_string()))?;

        let config: Self = settings
            .try_deserialize()
            .map_err(|e| DispatcherError::ConfigurationError(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.group_capacity == 0 {
            return Err(DispatcherError::ConfigurationError(
                "group_capacity must be at least 1".to_string(),
            ));
        }
        if self.flush_interval_ms == 0 {
            return Err(DispatcherError::ConfigurationError(
                "flush_interval_ms must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
