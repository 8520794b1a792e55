//! `fleetdeck config init`

use crate::cli::ConfigInitArgs;
use crate::config::{ConfigError, ControlPlaneConfig};

const EXAMPLE_CONFIG: &str = include_str!("../../fleetdeck.example.toml");

/// The starter config, pointed at `url` when one is given.
///
/// Only the `url` line under `[control_plane]` changes, so the template's
/// comments survive.
fn render_config(url: Option<&str>) -> Result<String, ConfigError> {
    let Some(url) = url else {
        return Ok(EXAMPLE_CONFIG.to_string());
    };
    let control_plane = ControlPlaneConfig {
        url: url.to_string(),
        ..Default::default()
    };
    control_plane.http_base()?;

    let mut section = "";
    let mut rendered = String::with_capacity(EXAMPLE_CONFIG.len() + url.len());
    for line in EXAMPLE_CONFIG.lines() {
        let trimmed = line.trim_start();
        if trimmed.starts_with('[') {
            section = trimmed;
        }
        if section == "[control_plane]" && trimmed.starts_with("url =") {
            rendered.push_str(&format!("url = {:?}", url));
        } else {
            rendered.push_str(line);
        }
        rendered.push('\n');
    }
    Ok(rendered)
}

/// Handle `fleetdeck config init`
pub fn handle_config_init(args: &ConfigInitArgs) -> Result<(), ConfigError> {
    if args.output.exists() && !args.force {
        return Err(ConfigError::AlreadyExists(args.output.clone()));
    }

    let content = render_config(args.url.as_deref())?;
    std::fs::write(&args.output, content).map_err(|source| ConfigError::Write {
        path: args.output.clone(),
        source,
    })?;

    println!("✓ Configuration file created: {}", args.output.display());
    match &args.url {
        Some(url) => println!("  Control plane: {}. Run `fleetdeck watch` to connect.", url),
        None => println!("  Point control_plane.url at your control plane, then run `fleetdeck watch`."),
    }

    Ok(())
}
