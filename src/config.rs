//! Engine and transfer configuration
//!
//! Loaded from an optional YAML file named by `ASYNCURL_CONFIG`, then
//! adjusted by individual environment overrides.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::engine::queue::{QueueOrder, DEFAULT_CAPACITY};

pub const CONFIG_ENV: &str = "ASYNCURL_CONFIG";
pub const QUEUE_CAPACITY_ENV: &str = "ASYNCURL_QUEUE_CAPACITY";
pub const IO_WAIT_ENV: &str = "ASYNCURL_IO_WAIT_MS";
pub const TICK_ENV: &str = "ASYNCURL_TICK_MS";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid value {value:?} for {key}")]
    InvalidEnv { key: String, value: String },
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub engine: EngineConfig,
    pub transfer: TransferDefaults,
}

/// Tuning of the multiplexing core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Readiness events held before new ones are dropped
    pub queue_capacity: usize,
    pub queue_order: QueueOrder,
    /// Upper bound of a single socket readiness wait
    pub io_wait_ms: u64,
    /// Interval of the timeout/completion task
    pub tick_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_CAPACITY,
            queue_order: QueueOrder::Fifo,
            io_wait_ms: 50,
            tick_ms: 10,
        }
    }
}

impl EngineConfig {
    pub fn io_wait(&self) -> Duration {
        Duration::from_millis(self.io_wait_ms)
    }

    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.queue_capacity == 0 {
            return Err(ConfigError::Invalid("queue_capacity must be at least 1".into()));
        }
        if self.io_wait_ms == 0 {
            return Err(ConfigError::Invalid("io_wait_ms must be positive".into()));
        }
        if self.tick_ms == 0 {
            return Err(ConfigError::Invalid("tick_ms must be positive".into()));
        }
        Ok(())
    }
}

/// Defaults applied to every request built from this configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferDefaults {
    /// Bytes per second below which a transfer counts as stalled
    pub low_speed_limit: u32,
    /// Seconds a transfer may stay below `low_speed_limit`
    pub low_speed_time_secs: u64,
    pub connect_timeout_secs: u64,
    pub verbose: bool,
    /// Body bytes kept per response; the rest is counted and discarded
    pub max_body_bytes: usize,
    pub user_agent: Option<String>,
}

impl Default for TransferDefaults {
    fn default() -> Self {
        Self {
            low_speed_limit: 10,
            low_speed_time_secs: 3,
            connect_timeout_secs: 10,
            verbose: false,
            max_body_bytes: 1024 * 1024,
            user_agent: None,
        }
    }
}

impl Config {
    /// Load from `ASYNCURL_CONFIG` (if set) and apply environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let mut cfg = match std::env::var(CONFIG_ENV) {
            Ok(path) => Self::from_file(path)?,
            Err(_) => Self::default(),
        };
        cfg.apply_overrides(|key| std::env::var(key).ok())?;
        cfg.engine.validate()?;
        Ok(cfg)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&raw)
    }

    pub fn from_yaml_str(raw: &str) -> Result<Self, ConfigError> {
        let cfg: Config = serde_yaml::from_str(raw)?;
        cfg.engine.validate()?;
        Ok(cfg)
    }

    /// Apply overrides, looking each key up through `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup(QUEUE_CAPACITY_ENV) {
            self.engine.queue_capacity = parse_override(QUEUE_CAPACITY_ENV, &v)?;
        }
        if let Some(v) = lookup(IO_WAIT_ENV) {
            self.engine.io_wait_ms = parse_override(IO_WAIT_ENV, &v)?;
        }
        if let Some(v) = lookup(TICK_ENV) {
            self.engine.tick_ms = parse_override(TICK_ENV, &v)?;
        }
        Ok(())
    }
}

fn parse_override<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidEnv {
        key: key.to_string(),
        value: value.to_string(),
    })
}
