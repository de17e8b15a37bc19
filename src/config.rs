//! Engine-wide tunables.
//!
//! Narrower than `tools::configuration`'s general-purpose `ConfigManager`
//! (which also handles deployment/persistence concerns out of scope here):
//! this is just the handful of knobs the engine itself reads, loaded from
//! environment variables and, optionally, a TOML file layered underneath
//! them.

use std::env;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default chain depth limit, per spec.md's stated 10-64 band.
pub const DEFAULT_MAX_CHAIN_DEPTH: usize = 32;

/// Default upper bound on a `ContextPool`'s free list.
pub const DEFAULT_POOL_MAX_SIZE: usize = 256;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[cfg(feature = "config-toml")]
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[cfg(feature = "config-toml")]
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

/// Engine-wide tunables independent of any single pipeline instance.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct EngineConfig {
    pub default_max_chain_depth: usize,
    pub default_pool_max_size: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_max_chain_depth: DEFAULT_MAX_CHAIN_DEPTH,
            default_pool_max_size: DEFAULT_POOL_MAX_SIZE,
        }
    }
}

impl EngineConfig {
    /// Start from the built-in defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Overlay values found in `PIPELINEKIT_MAX_CHAIN_DEPTH` /
    /// `PIPELINEKIT_POOL_MAX_SIZE`, if set and parseable.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env()?;
        Ok(config)
    }

    fn apply_env(&mut self) -> Result<(), ConfigError> {
        if let Ok(raw) = env::var("PIPELINEKIT_MAX_CHAIN_DEPTH") {
            self.default_max_chain_depth =
                raw.parse()
                    .map_err(|_| ConfigError::InvalidValue {
                        key: "PIPELINEKIT_MAX_CHAIN_DEPTH".to_string(),
                        value: raw,
                    })?;
        }
        if let Ok(raw) = env::var("PIPELINEKIT_POOL_MAX_SIZE") {
            self.default_pool_max_size =
                raw.parse()
                    .map_err(|_| ConfigError::InvalidValue {
                        key: "PIPELINEKIT_POOL_MAX_SIZE".to_string(),
                        value: raw,
                    })?;
        }
        Ok(())
    }

    /// Load from a TOML file, then overlay any set environment variables
    /// on top of the file's values.
    #[cfg(feature = "config-toml")]
    pub fn from_toml_file(path: impl AsRef<std::path::Path>) -> Result<Self, ConfigError> {
        let path_ref = path.as_ref();
        let text = std::fs::read_to_string(path_ref).map_err(|source| ConfigError::Io {
            path: path_ref.display().to_string(),
            source,
        })?;
        let mut config: Self = toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path_ref.display().to_string(),
            source,
        })?;
        config.apply_env()?;
        Ok(config)
    }
}
