//! Tracing subscriber setup
//!
//! Console output (tables, followed logs) goes to stdout, so diagnostics are
//! written to stderr.

use crate::config::{LogFormat, LoggingConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// `EnvFilter` directives for `config`: the base level, then one
/// `fleetdeck::<component>=<level>` entry per component, by name.
///
/// ```
/// use fleetdeck::config::LoggingConfig;
/// use fleetdeck::logging::build_filter_directives;
///
/// let mut config = LoggingConfig::default();
/// config.component_levels.insert("stream".to_string(), "debug".to_string());
/// assert_eq!(build_filter_directives(&config), "warn,fleetdeck::stream=debug");
/// ```
pub fn build_filter_directives(config: &LoggingConfig) -> String {
    let mut filter_str = config.level.trim().to_string();
    for (component, level) in &config.component_levels {
        filter_str.push_str(&format!(",fleetdeck::{}={}", component, level.trim()));
    }
    filter_str
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over the configured directives.
pub fn init_tracing(config: &LoggingConfig) -> Result<(), Box<dyn std::error::Error>> {
    let filter_str = build_filter_directives(config);
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&filter_str));

    match config.format {
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_writer(std::io::stderr)
                        .pretty(),
                )
                .try_init()?;
        }
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_writer(std::io::stderr)
                        .json(),
                )
                .try_init()?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_base_level_only() {
        let config = LoggingConfig::default();
        assert_eq!(build_filter_directives(&config), "warn");
    }

    #[test]
    fn test_component_levels_sorted() {
        let config = LoggingConfig {
            level: "info".to_string(),
            format: LogFormat::Json,
            component_levels: BTreeMap::from([
                ("stream".to_string(), "trace".to_string()),
                ("reconcile".to_string(), "debug".to_string()),
            ]),
        };
        assert_eq!(
            build_filter_directives(&config),
            "info,fleetdeck::reconcile=debug,fleetdeck::stream=trace"
        );
    }
}
