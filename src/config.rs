//! Bridge configuration
//!
//! Loaded from JSON, either passed in directly by the host or read from the
//! file named by `CAPTURE_BRIDGE_CONFIG`. Every field is optional.

use crate::capability::PlatformRevision;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Environment variable naming a configuration file
pub const CONFIG_ENV: &str = "CAPTURE_BRIDGE_CONFIG";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct BridgeConfig {
    /// Overrides the revision reported by the backend, e.g. `"14.2"`
    pub platform_revision: Option<String>,
    pub worker_threads: usize,
    /// Label of the queue outputs are delivered on when none is given
    pub default_queue_label: String,
    pub shutdown_timeout_ms: u64,
    /// `tracing` filter directive; `RUST_LOG` takes precedence
    pub log_filter: Option<String>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            platform_revision: None,
            worker_threads: 2,
            default_queue_label: "capture-bridge.output".to_string(),
            shutdown_timeout_ms: 1000,
            log_filter: None,
        }
    }
}

impl BridgeConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        tracing::debug!("Loading bridge configuration from {}", path.as_ref().display());
        Self::from_json(&contents)
    }

    /// Load from `CAPTURE_BRIDGE_CONFIG`, or defaults when it is unset
    pub fn from_env() -> Result<Self, ConfigError> {
        match std::env::var_os(CONFIG_ENV) {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.worker_threads == 0 {
            return Err(ConfigError::Invalid("workerThreads must be at least 1".into()));
        }
        if self.default_queue_label.trim().is_empty() {
            return Err(ConfigError::Invalid("defaultQueueLabel must not be empty".into()));
        }
        self.platform_revision()?;
        Ok(())
    }

    pub fn platform_revision(&self) -> Result<Option<PlatformRevision>, ConfigError> {
        self.platform_revision
            .as_deref()
            .map(|s| {
                s.parse::<PlatformRevision>()
                    .map_err(|e| ConfigError::Invalid(e.to_string()))
            })
            .transpose()
    }
}
