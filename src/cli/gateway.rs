//! `fleetdeck gateway`

use super::output::{format_gateway_table, format_json, format_json_line, format_stats_line};
use super::session::{rest_client, LiveSession};
use super::GatewayArgs;
use crate::config::FleetDeckConfig;
use crate::control_plane::{GatewayQuery, TimeRange};
use crate::events::GatewayRequestSummary;
use crate::filter::{FilterPatch, GatewayFilter};
use crate::reconcile::{load_gateway_requests, load_gateway_stats};
use crate::state::{FleetState, SliceUpdate};
use serde_json::json;
use std::collections::{HashSet, VecDeque};
use std::time::Duration;

/// The filter the command line asks for.
pub fn filter_from_args(args: &GatewayArgs) -> GatewayFilter {
    GatewayFilter {
        status: args.status,
        request_type: args.request_type,
        model: args.model.clone(),
        host_id: args.host.clone(),
    }
}

/// A patch that sets every field of `filter`.
fn full_patch(filter: &GatewayFilter) -> FilterPatch {
    FilterPatch {
        status: Some(filter.status),
        request_type: Some(filter.request_type),
        model: Some(filter.model.clone()),
        host_id: Some(filter.host_id.clone()),
    }
}

/// Printed summaries, forgetting the oldest past `capacity`.
struct SeenRequests {
    order: VecDeque<String>,
    keys: HashSet<String>,
    capacity: usize,
}

impl SeenRequests {
    fn new(capacity: usize) -> Self {
        Self {
            order: VecDeque::with_capacity(capacity),
            keys: HashSet::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    /// Summaries without a request id are told apart by their full contents.
    fn key(summary: &GatewayRequestSummary) -> String {
        if summary.request_id.is_empty() {
            format!("{:?}", summary)
        } else {
            summary.request_id.clone()
        }
    }

    /// Returns true the first time `summary` is seen.
    fn insert(&mut self, summary: &GatewayRequestSummary) -> bool {
        let key = Self::key(summary);
        if !self.keys.insert(key.clone()) {
            return false;
        }
        self.order.push_back(key);
        while self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.keys.remove(&oldest);
            }
        }
        true
    }
}

/// Summaries in `current` not yet seen, oldest first.
fn unseen(current: &[GatewayRequestSummary], seen: &mut SeenRequests) -> Vec<GatewayRequestSummary> {
    current
        .iter()
        .rev()
        .filter(|s| seen.insert(s))
        .cloned()
        .collect()
}

/// Live entries to print: nothing until the server confirms the filter,
/// then only unseen entries the filter admits.
fn fresh_live(
    state: &FleetState,
    filter: &GatewayFilter,
    seen: &mut SeenRequests,
) -> Vec<GatewayRequestSummary> {
    if !state.is_filter_confirmed() {
        return Vec::new();
    }
    let live: Vec<_> = state
        .gateway_requests()
        .into_iter()
        .filter(|summary| filter.admits(summary))
        .collect();
    unseen(&live, seen)
}

/// Push the full filter upstream and drop live entries gathered under any
/// earlier one. The server forgets the filter whenever the socket drops.
fn reset_live_view(state: &FleetState, filter: &GatewayFilter) {
    state.set_filter(full_patch(filter));
    state.clear_gateway_requests();
}

/// Handle `fleetdeck gateway`
pub async fn handle_gateway(args: &GatewayArgs, config: &FleetDeckConfig) -> anyhow::Result<()> {
    let api = rest_client(config)?;
    let filter = filter_from_args(args);

    let range = TimeRange::last(Duration::from_secs(args.since.saturating_mul(60)));
    let mut query = GatewayQuery::new(range, filter.clone());
    query.limit = args.limit;

    let session = if args.follow {
        Some(LiveSession::start(config)?)
    } else {
        None
    };
    let state = match &session {
        Some(session) => {
            reset_live_view(&session.state, &filter);
            session.state.clone()
        }
        None => FleetState::new(&config.retention),
    };

    let stats = load_gateway_stats(&api, &state, &query)
        .await
        .into_result()
        .map_err(anyhow::Error::msg)?;
    let requests = load_gateway_requests(&api, &state, &query, args.limit as usize)
        .await
        .into_result()
        .map_err(anyhow::Error::msg)?;

    if args.connect.json {
        println!(
            "{}",
            format_json_line(&json!({ "stats": stats, "requests": requests }))
        );
    } else {
        println!("{}", format_stats_line(&stats));
        println!("{}", format_gateway_table(&requests));
    }

    let Some(mut session) = session else {
        return Ok(());
    };

    let mut seen = SeenRequests::new(config.retention.gateway_requests + args.limit as usize);
    for summary in requests.iter().rev() {
        seen.insert(summary);
    }

    while let Some(update) = session.next_update().await {
        match update {
            SliceUpdate::Connection(true) => reset_live_view(&session.state, &filter),
            SliceUpdate::Gateway | SliceUpdate::Filter => {
                if update == SliceUpdate::Filter && args.connect.json {
                    println!("{}", format_json("filter", &session.state.filter()));
                }
                let fresh = fresh_live(&session.state, &filter, &mut seen);
                if fresh.is_empty() {
                    continue;
                }
                if args.connect.json {
                    for summary in &fresh {
                        println!("{}", format_json_line(summary));
                    }
                } else {
                    println!("{}", format_gateway_table(&fresh));
                }
            }
            _ => {}
        }
    }

    session.stop().await;
    Ok(())
}
