//! Diagnostic output settings
//!
//! Diagnostics always go to stderr. `level` is the default for every target;
//! `component_levels` raises or lowers single FleetDeck modules, keyed by the
//! module name (`stream = "debug"` becomes `fleetdeck::stream=debug`).

use super::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;
use tracing::level_filters::LevelFilter;

/// FleetDeck modules that accept their own log level.
pub const COMPONENTS: &[&str] = &[
    "cli",
    "control_plane",
    "events",
    "filter",
    "reconcile",
    "scheduler",
    "state",
    "stream",
];

/// Diagnostic line format on stderr
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Pretty,
    /// One JSON object per line, for piping `watch` into a collector
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            _ => Err(format!("Invalid log format: {}", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub component_levels: BTreeMap<String, String>,
}

impl Default for LoggingConfig {
    /// Quiet by default: the console's own output is on stdout.
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            format: LogFormat::Pretty,
            component_levels: BTreeMap::new(),
        }
    }
}

impl LoggingConfig {
    /// Reject levels tracing cannot parse and components FleetDeck does not have.
    pub fn validate(&self) -> Result<(), ConfigError> {
        parse_level("logging.level", &self.level)?;
        for (component, level) in &self.component_levels {
            let field = format!("logging.component_levels.{}", component);
            if !COMPONENTS.contains(&component.as_str()) {
                return Err(ConfigError::invalid(
                    field,
                    format!("unknown component, expected one of: {}", COMPONENTS.join(", ")),
                ));
            }
            parse_level(&field, level)?;
        }
        Ok(())
    }
}

fn parse_level(field: &str, level: &str) -> Result<LevelFilter, ConfigError> {
    LevelFilter::from_str(level.trim())
        .map_err(|_| ConfigError::invalid(field, format!("'{}' is not a log level", level)))
}
