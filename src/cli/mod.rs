//! CLI module for FleetDeck
//!
//! Command-line interface definitions and handlers for the FleetDeck console.
//!
//! # Commands
//!
//! - `watch` - Live view of hosts, in-flight requests and routing errors
//! - `logs` - Print (and optionally follow) one instance's log
//! - `gateway` - Gateway statistics and recent requests for a filter
//! - `config` - Configuration utilities (init)
//! - `completions` - Generate shell completions
//!
//! # Example
//!
//! ```bash
//! # Watch the fleet behind a remote control plane
//! fleetdeck watch --url https://cp.internal:8080
//!
//! # Follow an instance log
//! fleetdeck logs gpu-host-1 llama-7b-0 --follow
//!
//! # Generate shell completions
//! fleetdeck completions bash > ~/.bash_completion.d/fleetdeck
//! ```

pub mod completions;
pub mod config;
pub mod gateway;
pub mod logs;
pub mod output;
pub mod session;
pub mod watch;

pub use completions::handle_completions;
pub use config::handle_config_init;

use crate::config::{ConfigError, FleetDeckConfig};
use crate::filter::{RequestKind, StatusClass};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// FleetDeck - live operations console for inference fleets
#[derive(Parser, Debug)]
#[command(
    name = "fleetdeck",
    version,
    about = "Live operations console for a fleet of LLM inference hosts"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Watch hosts, requests and routing errors live
    Watch(WatchArgs),
    /// Show an instance's log
    Logs(LogsArgs),
    /// Show gateway statistics and recent requests
    Gateway(GatewayArgs),
    /// Configuration utilities
    #[command(subcommand)]
    Config(ConfigCommands),
    /// Generate shell completions
    Completions(CompletionsArgs),
}

/// Options shared by every command that talks to the control plane
#[derive(Args, Debug, Clone)]
pub struct ConnectArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "fleetdeck.toml")]
    pub config: PathBuf,

    /// Override control-plane URL
    #[arg(short, long, env = "FLEETDECK_URL")]
    pub url: Option<String>,

    /// Set log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "FLEETDECK_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct WatchArgs {
    #[command(flatten)]
    pub connect: ConnectArgs,

    /// Seconds between screen refreshes
    #[arg(short, long, default_value = "2")]
    pub interval: u64,

    /// Stop after this many refreshes
    #[arg(long)]
    pub count: Option<u64>,

    /// Poll the REST API at the refresh interval instead of using the event feed
    #[arg(long)]
    pub poll: bool,
}

#[derive(Args, Debug)]
pub struct LogsArgs {
    /// Host identifier
    pub host: String,

    /// Instance identifier
    pub instance: String,

    #[command(flatten)]
    pub connect: ConnectArgs,

    /// Keep printing new lines from the event feed
    #[arg(short, long)]
    pub follow: bool,

    /// Only print the last N lines of history
    #[arg(short = 'n', long)]
    pub tail: Option<usize>,
}

#[derive(Args, Debug)]
pub struct GatewayArgs {
    #[command(flatten)]
    pub connect: ConnectArgs,

    /// Status class (all, success, error, missed)
    #[arg(short, long, default_value = "all")]
    pub status: StatusClass,

    /// Request type (all, chat, completion, embedding, classification, rerank)
    #[arg(short = 't', long = "type", default_value = "all")]
    pub request_type: RequestKind,

    /// Restrict to one model
    #[arg(short, long)]
    pub model: Option<String>,

    /// Restrict to one host
    #[arg(short = 'H', long)]
    pub host: Option<String>,

    /// Number of requests to show
    #[arg(long, default_value = "50")]
    pub limit: u32,

    /// History window in minutes
    #[arg(long, default_value = "60")]
    pub since: u64,

    /// Keep printing new requests from the event feed
    #[arg(short, long)]
    pub follow: bool,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Initialize a new configuration file
    Init(ConfigInitArgs),
}

#[derive(Args, Debug)]
pub struct ConfigInitArgs {
    /// Output file path
    #[arg(short, long, default_value = "fleetdeck.toml")]
    pub output: PathBuf,

    /// Overwrite existing file
    #[arg(short, long)]
    pub force: bool,

    /// Control-plane URL to write instead of the default
    #[arg(long)]
    pub url: Option<String>,
}

#[derive(Args, Debug)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: clap_complete::Shell,
}

/// Load the configuration file, environment and CLI overrides, in that order.
///
/// A missing configuration file falls back to defaults; an unreadable or
/// invalid one is an error.
pub fn load_config(args: &ConnectArgs) -> Result<FleetDeckConfig, ConfigError> {
    let mut config = match FleetDeckConfig::load(Some(&args.config)) {
        Ok(config) => config,
        Err(ConfigError::NotFound(_)) => FleetDeckConfig::default(),
        Err(e) => return Err(e),
    }
    .with_env_overrides();

    if let Some(url) = &args.url {
        config.control_plane.url = url.clone();
    }
    if let Some(level) = &args.log_level {
        config.logging.level = level.clone();
    }

    config.validate()?;
    Ok(config)
}
