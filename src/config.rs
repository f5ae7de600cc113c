//! Runner configuration
//!
//! Loaded from JSON or assembled with [`RunnerConfig::builder`]. Every
//! wait is bounded: polling stops after `max_attempts` status checks.

use crate::evaluation::METRIC_MAE;
use crate::training::ModelKind;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Bounded polling of a training job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollPolicy {
    /// Status checks before giving up
    pub max_attempts: u32,
    /// Pause between checks
    pub interval_ms: u64,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 60,
            interval_ms: 1_000,
        }
    }
}

impl PollPolicy {
    /// Create a policy
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn new(max_attempts: u32, interval: Duration) -> Self {
        Self {
            max_attempts,
            interval_ms: interval.as_millis() as u64,
        }
    }

    /// Pause between checks
    #[must_use]
    pub const fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

/// Configuration of an [`ExperimentRunner`](crate::ExperimentRunner)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Training job polling
    pub poll: PollPolicy,
    /// Metric used to rank experiments (lower is better)
    pub metric_name: String,
    /// Model kind submitted for every experiment
    pub model_kind: ModelKind,
    /// Prefix prepended to transform set names to form model names
    pub model_name_prefix: String,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            poll: PollPolicy::default(),
            metric_name: METRIC_MAE.to_string(),
            model_kind: ModelKind::LinearReg,
            model_name_prefix: String::new(),
        }
    }
}

impl RunnerConfig {
    /// Start from defaults
    #[must_use]
    pub fn builder() -> RunnerConfigBuilder {
        RunnerConfigBuilder::default()
    }

    /// Parse a JSON document; missing keys take their defaults
    ///
    /// # Errors
    ///
    /// Returns `Json` for malformed input, `Config` if validation fails
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read a JSON config file
    ///
    /// # Errors
    ///
    /// Returns `Io` if the file cannot be read, otherwise as
    /// [`from_json_str`](Self::from_json_str)
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Check invariants
    ///
    /// # Errors
    ///
    /// Returns `Config` if `poll.max_attempts` is zero or the metric name is empty
    pub fn validate(&self) -> Result<()> {
        if self.poll.max_attempts == 0 {
            return Err(Error::Config("poll.max_attempts must be at least 1".to_string()));
        }
        if self.metric_name.trim().is_empty() {
            return Err(Error::Config("metric_name must not be empty".to_string()));
        }
        Ok(())
    }

    /// Model name for a transform set name
    #[must_use]
    pub fn model_name(&self, set_name: &str) -> String {
        format!("{}{set_name}", self.model_name_prefix)
    }
}

/// Builder for [`RunnerConfig`]
#[derive(Debug, Default)]
pub struct RunnerConfigBuilder {
    config: RunnerConfig,
}

impl RunnerConfigBuilder {
    /// Set polling policy
    #[must_use]
    pub const fn poll(mut self, poll: PollPolicy) -> Self {
        self.config.poll = poll;
        self
    }

    /// Set ranking metric
    #[must_use]
    pub fn metric_name(mut self, metric_name: impl Into<String>) -> Self {
        self.config.metric_name = metric_name.into();
        self
    }

    /// Set model kind
    #[must_use]
    pub fn model_kind(mut self, model_kind: ModelKind) -> Self {
        self.config.model_kind = model_kind;
        self
    }

    /// Set model name prefix (e.g. `bike_model_`)
    #[must_use]
    pub fn model_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.model_name_prefix = prefix.into();
        self
    }

    /// Build and validate
    ///
    /// # Errors
    ///
    /// Same as [`RunnerConfig::validate`]
    pub fn build(self) -> Result<RunnerConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
