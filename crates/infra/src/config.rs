//! Engine configuration.
//!
//! Read from environment variables with fallback to defaults. Loading goes
//! through a lookup function; the API layer passes `std::env::var` and tests
//! pass a map, so tests never touch the process environment.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

pub const ALLOW_FORCE_CLOSE_VAR: &str = "CELLARBOOK_ALLOW_FORCE_CLOSE";

/// Configuration error types.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?}")]
    InvalidValue { key: String, value: String },
}

/// Parse `key` from `lookup`, falling back to `default` when unset or blank.
pub fn parse_var<T, F>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => {
            raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
                key: key.to_string(),
                value: raw,
            })
        }
        _ => Ok(default),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Whether `close_period(force = true)` is honoured.
    pub allow_force_close: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            allow_force_close: true,
        }
    }
}

impl EngineConfig {
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Ok(Self {
            allow_force_close: parse_var(&lookup, ALLOW_FORCE_CLOSE_VAR, defaults.allow_force_close)?,
        })
    }
}
