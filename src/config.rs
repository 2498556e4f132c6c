//! Diff subsystem configuration
//!
//! Settings are persisted with `confy`, which picks the OS-specific config directory.
//! Every field carries a serde default so partially written files still load.

use crate::constant::{
    APP_NAME, CONTEXT_SIZE, DEFAULT_CACHE_CAPACITY, DEFAULT_ERROR_RESET_TIME_MS,
    DEFAULT_MAX_CONSECUTIVE_ERRORS, DEFAULT_WORKER_QUEUE_CAPACITY,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration error: {0}")]
    Confy(#[from] confy::ConfyError),
}

pub struct Config {
    pub settings: Settings,
}

impl Config {
    /// Load configuration from the platform config directory, creating defaults if missing
    pub fn load() -> Result<Self, ConfigError> {
        let settings: Settings = confy::load(APP_NAME, None)?;
        info!("Load config from {:?}", Self::config_path()?);
        Ok(Self { settings })
    }

    /// Load configuration from an explicit file
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let settings: Settings = confy::load_path(path)?;
        info!("Load config from {:?}", path);
        Ok(Self { settings })
    }

    /// Save current configuration to the platform config directory
    pub fn save(&self) -> Result<(), ConfigError> {
        confy::store(APP_NAME, None, &self.settings)?;
        info!("Save config to {:?}", Self::config_path()?);
        Ok(())
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        confy::store_path(path, &self.settings)?;
        info!("Save config to {:?}", path);
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf, ConfigError> {
        Ok(confy::get_configuration_file_path(APP_NAME, None)?)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::load().unwrap_or_else(|e| {
            tracing::warn!("Falling back to default settings: {}", e);
            Self {
                settings: Settings::default(),
            }
        })
    }
}

/// What the orchestrator does with a worker whose health monitor reports unhealthy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DegradedPolicy {
    /// Keep sending work to the degraded worker
    #[default]
    KeepUsing,
    /// Refuse new computations with `WORKER_DEGRADED`
    FailFast,
    /// Tear the worker down and start a fresh one
    Recycle,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Maximum number of cached diff results
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,

    /// Consecutive worker errors tolerated before the worker counts as degraded
    #[serde(default = "default_max_consecutive_errors")]
    pub max_consecutive_errors: u32,

    /// Window in milliseconds after which the consecutive-error count resets
    #[serde(default = "default_error_reset_time_ms")]
    pub error_reset_time_ms: u64,

    /// Lines of context kept around a collapsed unchanged block
    #[serde(default = "default_context_size")]
    pub context_size: usize,

    /// Pending requests the worker channel holds before senders block
    #[serde(default = "default_worker_queue_capacity")]
    pub worker_queue_capacity: usize,

    #[serde(default)]
    pub degraded_policy: DegradedPolicy,
}

impl Settings {
    pub fn error_reset_time(&self) -> Duration {
        Duration::from_millis(self.error_reset_time_ms)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            max_consecutive_errors: DEFAULT_MAX_CONSECUTIVE_ERRORS,
            error_reset_time_ms: DEFAULT_ERROR_RESET_TIME_MS,
            context_size: CONTEXT_SIZE,
            worker_queue_capacity: DEFAULT_WORKER_QUEUE_CAPACITY,
            degraded_policy: DegradedPolicy::default(),
        }
    }
}

fn default_cache_capacity() -> usize {
    DEFAULT_CACHE_CAPACITY
}

fn default_max_consecutive_errors() -> u32 {
    DEFAULT_MAX_CONSECUTIVE_ERRORS
}

fn default_error_reset_time_ms() -> u64 {
    DEFAULT_ERROR_RESET_TIME_MS
}

fn default_context_size() -> usize {
    CONTEXT_SIZE
}

fn default_worker_queue_capacity() -> usize {
    DEFAULT_WORKER_QUEUE_CAPACITY
}
