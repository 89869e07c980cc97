//! Engine configuration

use serde::{Deserialize, Serialize};
use std::path::Path;
use tessera_primitives::Gas;
use thiserror::Error;

/// Free allowance granted to application-level invocations (10 GAS)
pub const FREE_GAS_ALLOWANCE: Gas = 1_000_000_000;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Reading the file failed
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The JSON did not parse
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// A value is out of range
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Result type for configuration loading
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Hard resource ceilings enforced by the step executor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionLimits {
    /// Combined size of both stacks across the whole chain
    #[serde(default = "default_max_stack_size")]
    pub max_stack_size: usize,
    /// Maximum call depth
    #[serde(default = "default_max_invocation_depth")]
    pub max_invocation_depth: usize,
    /// Maximum element count of a compound item
    #[serde(default = "default_max_array_size")]
    pub max_array_size: usize,
    /// Maximum byte size of a byte item
    #[serde(default = "default_max_item_size")]
    pub max_item_size: usize,
    /// Maximum byte width of an integer
    #[serde(default = "default_max_integer_size")]
    pub max_integer_size: usize,
    /// Maximum byte size of a map key
    #[serde(default = "default_max_map_key_size")]
    pub max_map_key_size: usize,
}

fn default_max_stack_size() -> usize {
    2048
}

fn default_max_invocation_depth() -> usize {
    1024
}

fn default_max_array_size() -> usize {
    1024
}

fn default_max_item_size() -> usize {
    1024 * 1024
}

fn default_max_integer_size() -> usize {
    32
}

fn default_max_map_key_size() -> usize {
    64
}

impl Default for ExecutionLimits {
    fn default() -> Self {
        Self {
            max_stack_size: default_max_stack_size(),
            max_invocation_depth: default_max_invocation_depth(),
            max_array_size: default_max_array_size(),
            max_item_size: default_max_item_size(),
            max_integer_size: default_max_integer_size(),
            max_map_key_size: default_max_map_key_size(),
        }
    }
}

/// Engine configuration, fixed for the lifetime of an [`Engine`](crate::Engine)
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Resource ceilings
    #[serde(default)]
    pub limits: ExecutionLimits,
    /// Gas added before metering and subtracted from the reported cost
    #[serde(default)]
    pub free_gas: Gas,
}

impl EngineConfig {
    /// Default limits with the standard free allowance
    pub fn with_free_allowance() -> Self {
        Self {
            free_gas: FREE_GAS_ALLOWANCE,
            ..Self::default()
        }
    }

    /// Parse and validate a JSON document
    pub fn from_json_str(json: &str) -> ConfigResult<Self> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    /// Reject zero limits and a negative allowance
    pub fn validate(&self) -> ConfigResult<()> {
        let limits = &self.limits;
        let checks = [
            ("max_stack_size", limits.max_stack_size),
            ("max_invocation_depth", limits.max_invocation_depth),
            ("max_array_size", limits.max_array_size),
            ("max_item_size", limits.max_item_size),
            ("max_integer_size", limits.max_integer_size),
            ("max_map_key_size", limits.max_map_key_size),
        ];
        for (name, value) in checks {
            if value == 0 {
                return Err(ConfigError::Invalid(format!("{} must be positive", name)));
            }
        }
        if self.free_gas < 0 {
            return Err(ConfigError::Invalid(format!(
                "free_gas must not be negative, got {}",
                self.free_gas
            )));
        }
        Ok(())
    }
}
