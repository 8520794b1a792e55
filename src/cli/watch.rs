//! `fleetdeck watch`

use super::output::{
    format_audit_table, format_hosts_table, format_json_line, format_requests_table,
};
use super::session::{rest_client, shutdown_signal, LiveSession};
use super::WatchArgs;
use crate::config::FleetDeckConfig;
use crate::control_plane::{StateSource, TimeRange};
use crate::events::HostStatus;
use crate::reconcile::{backfill_audit_events, FetchState};
use crate::state::FleetState;
use colored::Colorize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Routing events shown under the request table.
const AUDIT_ROWS: usize = 10;
/// Window of routing history merged in at startup.
const AUDIT_BACKFILL: Duration = Duration::from_secs(3600);
const AUDIT_BACKFILL_LIMIT: u32 = 500;

fn sorted_hosts(hosts: impl IntoIterator<Item = HostStatus>) -> Vec<HostStatus> {
    let mut hosts: Vec<_> = hosts.into_iter().collect();
    hosts.sort_by(|a, b| a.host_id.cmp(&b.host_id));
    hosts
}

fn render_live(state: &FleetState, json: bool) -> String {
    let hosts = sorted_hosts(state.hosts().into_values());
    let requests = state.requests();
    let audit = state.audit_events();
    let recent = &audit[audit.len().saturating_sub(AUDIT_ROWS)..];

    if json {
        return format_json_line(&json!({
            "connected": state.is_connected(),
            "hosts": hosts,
            "requests": requests,
            "routing_events": recent,
        }));
    }

    let connection = if state.is_connected() {
        "connected".green()
    } else {
        "disconnected".red()
    };
    format!(
        "Feed: {}\n\nHosts\n{}\n\nRequests ({})\n{}\n\nRouting events (last {})\n{}",
        connection,
        format_hosts_table(&hosts),
        requests.len(),
        format_requests_table(&requests),
        recent.len(),
        format_audit_table(recent)
    )
}

/// Handle `fleetdeck watch`
pub async fn handle_watch(args: &WatchArgs, config: &FleetDeckConfig) -> anyhow::Result<()> {
    let interval = Duration::from_secs(args.interval.max(1));

    if args.poll {
        let source = StateSource::Poll {
            api: Arc::new(rest_client(config)?),
            interval,
        };
        return watch_polling(args, &source).await;
    }

    let session = LiveSession::start(config)?;
    let api = rest_client(config)?;
    let range = TimeRange::last(AUDIT_BACKFILL);
    if let FetchState::Failed(e) =
        backfill_audit_events(&api, &session.state, &range, AUDIT_BACKFILL_LIMIT).await
    {
        eprintln!("Warning: routing history unavailable: {}", e);
    }

    let mut ticker = tokio::time::interval(interval);
    let mut rendered = 0u64;
    loop {
        tokio::select! {
            _ = session.cancel_token.cancelled() => break,
            _ = ticker.tick() => {
                println!("{}", render_live(&session.state, args.connect.json));
                rendered += 1;
                if args.count.is_some_and(|count| rendered >= count) {
                    break;
                }
            }
        }
    }

    session.stop().await;
    Ok(())
}

async fn watch_polling(args: &WatchArgs, source: &StateSource) -> anyhow::Result<()> {
    let cancel_token = CancellationToken::new();
    let signals = tokio::spawn(shutdown_signal(cancel_token.clone()));
    let interval = source.poll_interval().unwrap_or(Duration::from_secs(2));
    let mut ticker = tokio::time::interval(interval);
    let mut rendered = 0u64;

    loop {
        tokio::select! {
            _ = cancel_token.cancelled() => break,
            _ = ticker.tick() => {
                match source.hosts().await {
                    Ok(hosts) => {
                        let hosts = sorted_hosts(hosts.into_values());
                        if args.connect.json {
                            println!("{}", format_json_line(&json!({ "hosts": hosts })));
                        } else {
                            println!("Hosts\n{}", format_hosts_table(&hosts));
                        }
                    }
                    Err(e) => eprintln!("Warning: host poll failed: {}", e),
                }
                rendered += 1;
                if args.count.is_some_and(|count| rendered >= count) {
                    break;
                }
            }
        }
    }

    signals.abort();
    Ok(())
}
