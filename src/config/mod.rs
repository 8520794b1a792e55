//! Configuration module for FleetDeck
//!
//! Provides layered configuration loading from files, environment variables, and defaults.
//!
//! # Configuration Precedence
//!
//! 1. CLI arguments (highest priority)
//! 2. Environment variables (`FLEETDECK_*`)
//! 3. Configuration file (TOML)
//! 4. Default values (lowest priority)
//!
//! # Example
//!
//! ```rust
//! use fleetdeck::config::FleetDeckConfig;
//!
//! let toml = r#"
//! [control_plane]
//! url = "http://cp.internal:9000"
//! "#;
//! let config: FleetDeckConfig = toml::from_str(toml).unwrap();
//! assert_eq!(config.control_plane.url, "http://cp.internal:9000");
//! assert_eq!(config.stream.reconnect_delay_ms, 5000);
//! ```

pub mod control_plane;
pub mod error;
pub mod logging;
pub mod retention;
pub mod stream;

pub use control_plane::ControlPlaneConfig;
pub use error::ConfigError;
pub use logging::{LogFormat, LoggingConfig};
pub use retention::RetentionConfig;
pub use stream::StreamConfig;

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Unified configuration for the FleetDeck console.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct FleetDeckConfig {
    /// Control-plane location and REST timeout
    pub control_plane: ControlPlaneConfig,
    /// Event feed keepalive and reconnect timing
    pub stream: StreamConfig,
    /// Slice capacities and removal delays
    pub retention: RetentionConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

impl FleetDeckConfig {
    /// Load configuration from a TOML file
    ///
    /// If path is None, returns default configuration.
    /// If path doesn't exist, returns NotFound error.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(p) => {
                if !p.exists() {
                    return Err(ConfigError::NotFound(p.to_path_buf()));
                }
                let content = std::fs::read_to_string(p).map_err(|source| ConfigError::Read {
                    path: p.to_path_buf(),
                    source,
                })?;
                toml::from_str(&content).map_err(|e| ConfigError::Parse {
                    path: p.to_path_buf(),
                    message: e.to_string().trim_end().to_string(),
                })
            }
            None => Ok(Self::default()),
        }
    }

    /// Apply environment variable overrides
    ///
    /// Invalid values are silently ignored (defaults are kept).
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(url) = std::env::var("FLEETDECK_URL") {
            self.control_plane.url = url;
        }

        if let Ok(ms) = std::env::var("FLEETDECK_KEEPALIVE_MS") {
            if let Ok(v) = ms.parse() {
                self.stream.keepalive_interval_ms = v;
            }
        }
        if let Ok(ms) = std::env::var("FLEETDECK_RECONNECT_MS") {
            if let Ok(v) = ms.parse() {
                self.stream.reconnect_delay_ms = v;
            }
        }

        if let Ok(level) = std::env::var("FLEETDECK_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("FLEETDECK_LOG_FORMAT") {
            if let Ok(f) = format.parse() {
                self.logging.format = f;
            }
        }

        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.control_plane.http_base()?;
        self.control_plane.feed_url(&self.stream)?;

        if self.control_plane.timeout_seconds == 0 {
            return Err(ConfigError::invalid(
                "control_plane.timeout_seconds",
                "timeout must be non-zero",
            ));
        }
        if self.stream.keepalive_interval_ms == 0 {
            return Err(ConfigError::invalid(
                "stream.keepalive_interval_ms",
                "keepalive interval must be non-zero",
            ));
        }

        let capacities = [
            ("retention.log_lines", self.retention.log_lines),
            ("retention.gateway_requests", self.retention.gateway_requests),
            ("retention.audit_events", self.retention.audit_events),
        ];
        for (field, value) in capacities {
            if value == 0 {
                return Err(ConfigError::invalid(field, "capacity must be non-zero"));
            }
        }

        self.logging.validate()
    }
}
