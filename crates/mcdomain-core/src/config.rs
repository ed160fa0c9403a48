//! Configuration types for mcdomain
//!
//! This module defines all configuration structures used throughout the crate.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::reconcile::DEFAULT_SUFFIX;

/// Main mcdomain configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct McdomainConfig {
    /// Reconciler settings
    #[serde(default)]
    pub reconciler: ReconcilerConfig,

    /// Object store configuration
    #[serde(default)]
    pub store: StoreConfig,

    /// Engine settings
    #[serde(default)]
    pub engine: EngineConfig,
}

impl McdomainConfig {
    /// Create a new configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        self.reconciler.validate()?;
        self.store.validate()?;
        self.engine.validate()?;
        Ok(())
    }
}

/// Settings the reconciler itself reads
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcilerConfig {
    /// Suffix used when deriving gateway addresses
    #[serde(default = "default_gateway_suffix")]
    pub gateway_suffix: String,
}

impl ReconcilerConfig {
    /// Validate the reconciler configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.gateway_suffix.is_empty() {
            return Err(crate::Error::config("Gateway suffix cannot be empty"));
        }
        if self.gateway_suffix.starts_with('.') || self.gateway_suffix.ends_with('.') {
            return Err(crate::Error::config(format!(
                "Gateway suffix must not start or end with '.': {}",
                self.gateway_suffix
            )));
        }
        if self.gateway_suffix.split('.').any(str::is_empty) {
            return Err(crate::Error::config(format!(
                "Gateway suffix has an empty label: {}",
                self.gateway_suffix
            )));
        }
        Ok(())
    }
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            gateway_suffix: default_gateway_suffix(),
        }
    }
}

fn default_gateway_suffix() -> String {
    DEFAULT_SUFFIX.to_string()
}

/// Object store configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StoreConfig {
    /// File-backed snapshot store
    File {
        /// Path to the snapshot file
        path: String,
    },

    /// In-memory store (not persistent)
    #[default]
    Memory,

    /// Custom store
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl StoreConfig {
    /// Validate the store configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            StoreConfig::File { path } => {
                if path.is_empty() {
                    return Err(crate::Error::config("File store path cannot be empty"));
                }
                Ok(())
            }
            StoreConfig::Custom { factory, config } => {
                if factory.is_empty() {
                    return Err(crate::Error::config("Custom store factory cannot be empty"));
                }
                if config.is_null() {
                    return Err(crate::Error::config("Custom store config cannot be null"));
                }
                Ok(())
            }
            StoreConfig::Memory => Ok(()),
        }
    }

    /// Get the store type name
    pub fn type_name(&self) -> &str {
        match self {
            StoreConfig::File { .. } => "file",
            StoreConfig::Memory => "memory",
            StoreConfig::Custom { factory, .. } => factory,
        }
    }
}

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Retry policy for failed reconciliations
    #[serde(default)]
    pub retry: RetryPolicy,

    /// Capacity of the engine event channel
    ///
    /// When full, new engine events are dropped (with a warning log).
    ///
    /// Default: 1000 events
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl EngineConfig {
    /// Validate the engine configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.event_channel_capacity == 0 {
            return Err(crate::Error::config("Event channel capacity must be > 0"));
        }
        self.retry.validate()
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

fn default_event_channel_capacity() -> usize {
    1000
}

/// How the engine retries a failed reconciliation
///
/// Attempt `n` (0-based) that fails waits
/// `min(initial_backoff_ms * multiplier^n, max_backoff_ms)` before the next
/// one. `max_retries = 0` disables retries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,

    /// Delay before the first retry (in milliseconds)
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    /// Upper bound on any delay (in milliseconds)
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    /// Growth factor between consecutive delays
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
}

impl RetryPolicy {
    /// A policy that never retries
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Delay after failed attempt `attempt` (0-based)
    pub fn backoff(&self, attempt: usize) -> Duration {
        if self.initial_backoff_ms == 0 {
            return Duration::ZERO;
        }
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let delay_ms = self.initial_backoff_ms as f64 * self.multiplier.powi(exponent);
        let capped = delay_ms.min(self.max_backoff_ms as f64);
        Duration::from_millis(capped as u64)
    }

    /// Validate the retry policy
    pub fn validate(&self) -> Result<(), crate::Error> {
        if !self.multiplier.is_finite() || self.multiplier < 1.0 {
            return Err(crate::Error::config(format!(
                "Retry multiplier must be >= 1.0, got {}",
                self.multiplier
            )));
        }
        if self.max_backoff_ms < self.initial_backoff_ms {
            return Err(crate::Error::config(format!(
                "Max backoff ({}ms) must be >= initial backoff ({}ms)",
                self.max_backoff_ms, self.initial_backoff_ms
            )));
        }
        Ok(())
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            multiplier: default_multiplier(),
        }
    }
}

fn default_max_retries() -> usize {
    3
}

fn default_initial_backoff_ms() -> u64 {
    500
}

fn default_max_backoff_ms() -> u64 {
    30_000
}

fn default_multiplier() -> f64 {
    2.0
}
