//! Hub configuration.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigError;

/// Placeholder content of a fresh buffer.
pub const DEFAULT_BUFFER: &str = "// Start coding here...";

/// Server configuration.
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Interface to bind to
    pub host: String,
    /// Preferred listening port
    pub port: u16,
    /// Consecutive ports tried before giving up
    pub max_port_attempts: u16,
    /// Events buffered per participant before the oldest are dropped
    pub outbound_capacity: usize,
    /// Pending hub commands before senders wait
    pub command_capacity: usize,
    /// Buffer content at startup
    pub initial_buffer: String,
    /// Static client assets (None = banner only)
    pub asset_dir: Option<PathBuf>,
    /// How long a new connection may take to send its request head
    pub header_read_timeout: Duration,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3001,
            max_port_attempts: 10,
            outbound_capacity: 256,
            command_capacity: 1024,
            initial_buffer: DEFAULT_BUFFER.to_string(),
            asset_dir: None,
            header_read_timeout: Duration::from_secs(10),
        }
    }
}

impl HubConfig {
    /// Defaults overridden by `PORT` and `CODESHARE_ASSET_DIR`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an explicit variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(value) = lookup("PORT") {
            config.port = value.trim().parse().map_err(|e: std::num::ParseIntError| {
                ConfigError::InvalidVar {
                    var: "PORT",
                    value: value.clone(),
                    reason: e.to_string(),
                }
            })?;
        }

        if let Some(dir) = lookup("CODESHARE_ASSET_DIR").filter(|d| !d.is_empty()) {
            config.asset_dir = Some(PathBuf::from(dir));
        }

        Ok(config)
    }
}
