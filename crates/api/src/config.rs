//! Server configuration.
//!
//! Loaded from environment variables with fallback to defaults. The engine's
//! own settings are nested so one lookup configures the whole process.

use std::env;
use std::net::SocketAddr;
use std::time::Duration;

use cellarbook_infra::config::{ConfigError, EngineConfig, parse_var};

pub const BIND_ADDR_VAR: &str = "CELLARBOOK_BIND_ADDR";
pub const SSE_HEARTBEAT_VAR: &str = "CELLARBOOK_SSE_HEARTBEAT_SECS";

const DEFAULT_HEARTBEAT_SECS: u64 = 15;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    pub bind_addr: SocketAddr,
    /// Idle interval after which a viewer stream sends a heartbeat.
    pub sse_heartbeat: Duration,
    pub engine: EngineConfig,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            sse_heartbeat: Duration::from_secs(DEFAULT_HEARTBEAT_SECS),
            engine: EngineConfig::default(),
        }
    }
}

impl ApiConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let bind_addr: SocketAddr = parse_var(&lookup, BIND_ADDR_VAR, defaults.bind_addr)?;

        let heartbeat_secs: u64 = parse_var(&lookup, SSE_HEARTBEAT_VAR, DEFAULT_HEARTBEAT_SECS)?;
        if heartbeat_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: SSE_HEARTBEAT_VAR.to_string(),
                value: "0".to_string(),
            });
        }

        Ok(Self {
            bind_addr,
            sse_heartbeat: Duration::from_secs(heartbeat_secs),
            engine: EngineConfig::from_lookup(&lookup)?,
        })
    }
}
