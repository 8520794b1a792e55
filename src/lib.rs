//! FleetDeck - live operations console core for distributed inference fleets
//!
//! This library maintains a single persistent connection to a control plane's
//! event feed and folds the events into independently readable view slices
//! (hosts, instance runtime state, logs, request lifecycle, gateway summaries).

pub mod cli;
pub mod config;
pub mod control_plane;
pub mod events;
pub mod filter;
pub mod logging;
pub mod reconcile;
pub mod scheduler;
pub mod state;
pub mod stream;
