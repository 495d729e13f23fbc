//! Orchestrator configuration
//!
//! Every field has a default, so an empty TOML document is a valid
//! configuration:
//!
//! ```toml
//! compliance_policy = "enforce"
//! educational_messages = true
//! pin_versions = false
//! annotate_missing_files = true
//! event_channel_capacity = 64
//! max_input_chars = 1000
//! phase_timeout_secs = 0
//! max_concurrent_runs = 5
//! ```

use crate::error::ConfigError;
use codeflow_deps::AnalyzerOptions;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// What to do with a delivery that is not hermetic
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompliancePolicy {
    /// End the run with an `error` event
    Enforce,
    /// Deliver and attach the verdict to the `completion` event
    #[default]
    Warn,
}

/// Orchestrator configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CodeflowConfig {
    /// Handling of non-compliant deliveries
    pub compliance_policy: CompliancePolicy,
    /// Emit an `educational_message` after each `phase_start`
    pub educational_messages: bool,
    /// Write recommended lower bounds into the manifest
    pub pin_versions: bool,
    /// Append the missing-local-files footer to the manifest
    pub annotate_missing_files: bool,
    /// Bound of the event channel
    pub event_channel_capacity: usize,
    /// Maximum user input length in characters
    pub max_input_chars: usize,
    /// Per-phase time budget in seconds; 0 disables it
    pub phase_timeout_secs: u64,
    /// Runs admitted at once; further starts are rejected until one ends
    pub max_concurrent_runs: usize,
}

impl Default for CodeflowConfig {
    fn default() -> Self {
        Self {
            compliance_policy: CompliancePolicy::Warn,
            educational_messages: true,
            pin_versions: false,
            annotate_missing_files: true,
            event_channel_capacity: 64,
            max_input_chars: 1000,
            phase_timeout_secs: 0,
            max_concurrent_runs: 5,
        }
    }
}

impl CodeflowConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With compliance policy
    #[inline]
    #[must_use]
    pub fn with_compliance_policy(mut self, policy: CompliancePolicy) -> Self {
        self.compliance_policy = policy;
        self
    }

    /// With educational messages on or off
    #[inline]
    #[must_use]
    pub fn with_educational_messages(mut self, enabled: bool) -> Self {
        self.educational_messages = enabled;
        self
    }

    /// With version pins on or off
    #[inline]
    #[must_use]
    pub fn with_pin_versions(mut self, enabled: bool) -> Self {
        self.pin_versions = enabled;
        self
    }

    /// With event channel capacity
    #[inline]
    #[must_use]
    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.event_channel_capacity = capacity;
        self
    }

    /// With per-phase timeout
    #[inline]
    #[must_use]
    pub fn with_phase_timeout_secs(mut self, secs: u64) -> Self {
        self.phase_timeout_secs = secs;
        self
    }

    /// With concurrent run limit
    #[inline]
    #[must_use]
    pub fn with_max_concurrent_runs(mut self, limit: usize) -> Self {
        self.max_concurrent_runs = limit;
        self
    }

    /// Parse and validate TOML
    ///
    /// # Errors
    /// Returns error on syntax errors, unknown keys or out-of-range values
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file
    ///
    /// # Errors
    /// Returns error if the file cannot be read or is invalid
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Check value ranges
    ///
    /// # Errors
    /// Returns [`ConfigError::Invalid`] for a zero capacity or limit
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.event_channel_capacity == 0 {
            return Err(ConfigError::invalid("event_channel_capacity", "must be at least 1"));
        }
        if self.max_input_chars == 0 {
            return Err(ConfigError::invalid("max_input_chars", "must be at least 1"));
        }
        if self.max_concurrent_runs == 0 {
            return Err(ConfigError::invalid("max_concurrent_runs", "must be at least 1"));
        }
        if self.max_concurrent_runs > tokio::sync::Semaphore::MAX_PERMITS {
            return Err(ConfigError::invalid("max_concurrent_runs", "too large"));
        }
        Ok(())
    }

    /// Per-phase timeout, if enabled
    #[must_use]
    pub fn phase_timeout(&self) -> Option<Duration> {
        (self.phase_timeout_secs > 0).then(|| Duration::from_secs(self.phase_timeout_secs))
    }

    /// Manifest rendering options derived from this configuration
    #[must_use]
    pub fn analyzer_options(&self) -> AnalyzerOptions {
        AnalyzerOptions {
            pin_versions: self.pin_versions,
            annotate_missing: self.annotate_missing_files,
        }
    }
}
