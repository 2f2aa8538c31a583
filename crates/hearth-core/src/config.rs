//! Configuration for the reconciler.
//!
//! Configuration is loaded from environment variables with sensible defaults.

use crate::validate::Limits;
use hearth_multipass::DEFAULT_BINARY;
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for a [`Reconciler`](crate::Reconciler).
#[derive(Debug, Clone)]
pub struct ReconcilerConfig {
    /// Path to the multipass binary.
    pub binary_path: PathBuf,

    /// Bounds enforced on every spec before the tool is invoked.
    pub limits: Limits,

    /// Extra local wait on top of a create's own timeout (default: 30s).
    pub launch_grace: Duration,
}

/// Configuration validation error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("multipass binary not found: {0}")]
    MissingBinary(PathBuf),

    #[error("max_cpus must be greater than 0")]
    ZeroCpus,

    #[error("minimum {field} {min} exceeds maximum {max}")]
    InvertedRange {
        field: &'static str,
        min: String,
        max: String,
    },

    #[error("max_timeout must be greater than 0")]
    ZeroTimeout,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            binary_path: PathBuf::from(DEFAULT_BINARY),
            limits: Limits::default(),
            launch_grace: Duration::from_secs(30),
        }
    }
}

impl ReconcilerConfig {
    /// Load configuration from environment variables.
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `HEARTH_MULTIPASS_BIN` | `multipass` (resolved via `PATH`) |
    /// | `HEARTH_MAX_CPUS` | `64` |
    /// | `HEARTH_MAX_TIMEOUT` | `24h` |
    /// | `HEARTH_CHECK_CLOUD_INIT` | `false` |
    pub fn from_env() -> Self {
        let default = Self::default();

        let limits = Limits {
            max_cpus: std::env::var("HEARTH_MAX_CPUS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.limits.max_cpus),
            max_timeout: std::env::var("HEARTH_MAX_TIMEOUT")
                .ok()
                .and_then(|v| humantime::parse_duration(&v).ok())
                .unwrap_or(default.limits.max_timeout),
            check_cloud_init_exists: std::env::var("HEARTH_CHECK_CLOUD_INIT")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(default.limits.check_cloud_init_exists),
            ..default.limits
        };

        Self {
            binary_path: std::env::var("HEARTH_MULTIPASS_BIN")
                .ok()
                .filter(|v| !v.is_empty())
                .map(PathBuf::from)
                .unwrap_or(default.binary_path),
            limits,
            launch_grace: default.launch_grace,
        }
    }

    /// Set the multipass binary path.
    pub fn binary_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.binary_path = path.into();
        self
    }

    /// Set the validation limits.
    pub fn limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Set the launch grace period.
    pub fn launch_grace(mut self, grace: Duration) -> Self {
        self.launch_grace = grace;
        self
    }

    /// Validate the configuration.
    ///
    /// A bare binary name is looked up on `PATH` at spawn time, so only
    /// explicit paths are checked for existence here.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.binary_path.components().count() > 1 && !self.binary_path.exists() {
            return Err(ConfigError::MissingBinary(self.binary_path.clone()));
        }

        let limits = &self.limits;
        if limits.max_cpus == 0 {
            return Err(ConfigError::ZeroCpus);
        }
        if limits.min_memory.bytes() > limits.max_memory.bytes() {
            return Err(ConfigError::InvertedRange {
                field: "memory",
                min: limits.min_memory.to_string(),
                max: limits.max_memory.to_string(),
            });
        }
        if limits.min_disk.bytes() > limits.max_disk.bytes() {
            return Err(ConfigError::InvertedRange {
                field: "disk",
                min: limits.min_disk.to_string(),
                max: limits.max_disk.to_string(),
            });
        }
        if limits.max_timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout);
        }

        Ok(())
    }
}
