//! Merging REST history with live stream data.
//!
//! The pure `merge_*` helpers are idempotent: merging the same inputs again
//! yields the same output. The async `load_*` / `backfill_*` helpers fetch
//! through a [`ControlPlaneApi`] and report the outcome as a [`FetchState`];
//! a failed fetch never affects the feed's connection state.

use crate::control_plane::{ControlPlaneApi, GatewayQuery, GatewayStats, TimeRange};
use crate::events::{
    GatewayOutcome, GatewayRequestSummary, InstanceRuntimeState, LogLine, RoutingEvent,
    RoutingEventKind, Timestamp,
};
use crate::state::FleetState;
use std::collections::{BTreeMap, HashMap, HashSet};

/// Outcome of one REST fetch, kept separate from the stream's liveness.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum FetchState<T> {
    #[default]
    Loading,
    Ready(T),
    Failed(String),
}

impl<T> FetchState<T> {
    pub fn is_ready(&self) -> bool {
        matches!(self, FetchState::Ready(_))
    }

    pub fn ready(&self) -> Option<&T> {
        match self {
            FetchState::Ready(value) => Some(value),
            _ => None,
        }
    }

    pub fn into_result(self) -> Result<T, String> {
        match self {
            FetchState::Ready(value) => Ok(value),
            FetchState::Failed(message) => Err(message),
            FetchState::Loading => Err("still loading".to_string()),
        }
    }
}

impl<T, E: std::fmt::Display> From<Result<T, E>> for FetchState<T> {
    fn from(result: Result<T, E>) -> Self {
        match result {
            Ok(value) => FetchState::Ready(value),
            Err(e) => FetchState::Failed(e.to_string()),
        }
    }
}

/// Union of historical and live log lines keyed by sequence number.
///
/// A live line replaces a historical line with the same `seq`. Output is
/// ascending by `seq`.
pub fn merge_logs(history: &[LogLine], live: &[LogLine]) -> Vec<LogLine> {
    let mut by_seq: BTreeMap<u64, LogLine> = BTreeMap::new();
    for line in history.iter().chain(live) {
        by_seq.insert(line.seq, line.clone());
    }
    by_seq.into_values().collect()
}

type RoutingKey = (RoutingEventKind, Option<String>, Option<Timestamp>);

fn routing_key(event: &RoutingEvent) -> RoutingKey {
    (
        event.kind,
        event.request_id().map(str::to_string),
        event.timestamp,
    )
}

/// Union of two routing event sets, deduplicated on kind, request id and
/// timestamp, ascending by timestamp and truncated from the oldest end.
///
/// On a duplicate the copy from `existing` is kept.
pub fn merge_routing_events(
    existing: &[RoutingEvent],
    incoming: &[RoutingEvent],
    capacity: usize,
) -> Vec<RoutingEvent> {
    let mut seen: HashSet<RoutingKey> = HashSet::new();
    let mut merged: Vec<RoutingEvent> = Vec::with_capacity(existing.len() + incoming.len());
    for event in existing.iter().chain(incoming) {
        if seen.insert(routing_key(event)) {
            merged.push(event.clone());
        }
    }
    merged.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
    if merged.len() > capacity {
        merged.drain(..merged.len() - capacity);
    }
    merged
}

/// Union of a REST page and live summaries, newest first, bounded.
///
/// Live summaries win on a shared request id. Summaries without an id are
/// never deduplicated.
pub fn merge_gateway_requests(
    page: &[GatewayRequestSummary],
    live: &[GatewayRequestSummary],
    capacity: usize,
) -> Vec<GatewayRequestSummary> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut merged: Vec<GatewayRequestSummary> = Vec::with_capacity(page.len() + live.len());
    for summary in live.iter().chain(page) {
        if summary.request_id.is_empty() || seen.insert(summary.request_id.as_str()) {
            merged.push(summary.clone());
        }
    }
    merged.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    merged.truncate(capacity);
    merged
}

/// Fold live summaries newer than the stats snapshot into its counters.
///
/// `since` defaults to the snapshot's own timestamp; without either, live
/// data cannot be placed relative to the snapshot and `stats` is returned
/// unchanged. Summaries without a timestamp are skipped.
pub fn apply_live_requests(
    stats: &GatewayStats,
    live: &[GatewayRequestSummary],
    since: Option<Timestamp>,
) -> GatewayStats {
    let mut result = stats.clone();
    let Some(since) = since.or(stats.snapshot_at) else {
        return result;
    };

    let mut duration_sum = 0.0;
    let mut duration_count = 0u64;
    let mut newest = since;
    for summary in live {
        let Some(at) = summary.timestamp else {
            continue;
        };
        if at <= since {
            continue;
        }
        newest = newest.max(at);
        result.total_requests += 1;
        match summary.status {
            GatewayOutcome::Success => result.success_count += 1,
            GatewayOutcome::Error => result.error_count += 1,
            GatewayOutcome::Missed => result.missed_count += 1,
            GatewayOutcome::Unknown => {}
        }
        if let Some(d) = summary.duration.filter(|d| d.is_finite()) {
            duration_sum += d;
            duration_count += 1;
        }
    }

    if duration_count > 0 {
        result.avg_duration = Some(match stats.avg_duration {
            Some(avg) if stats.total_requests > 0 => {
                let base = stats.total_requests as f64;
                (avg * base + duration_sum) / (base + duration_count as f64)
            }
            _ => duration_sum / duration_count as f64,
        });
    }
    result.snapshot_at = Some(newest);
    result
}

/// The live stream value wins over a REST snapshot when both exist.
pub fn resolve_instance_state(
    snapshot: Option<InstanceRuntimeState>,
    live: Option<InstanceRuntimeState>,
) -> Option<InstanceRuntimeState> {
    live.or(snapshot)
}

/// Historical logs for one instance merged with the live ring.
pub async fn load_instance_logs(
    api: &dyn ControlPlaneApi,
    state: &FleetState,
    host_id: &str,
    instance_id: &str,
) -> FetchState<Vec<LogLine>> {
    match api.fetch_instance_logs(host_id, instance_id).await {
        Ok(history) => {
            let live = state.instance_logs(host_id, instance_id);
            FetchState::Ready(merge_logs(&history, &live))
        }
        Err(e) => {
            tracing::warn!(host_id, instance_id, error = %e, "Log backfill failed");
            FetchState::Failed(e.to_string())
        }
    }
}

/// Instance runtime state, preferring the live slice over the REST snapshot.
///
/// REST is only consulted when the slice has nothing for the instance.
pub async fn load_instance_state(
    api: &dyn ControlPlaneApi,
    state: &FleetState,
    host_id: &str,
    instance_id: &str,
) -> FetchState<Option<InstanceRuntimeState>> {
    let live = state.instance_state(host_id, instance_id);
    if live.is_some() {
        return FetchState::Ready(live);
    }
    match api.fetch_instance_state(host_id, instance_id).await {
        Ok(snapshot) => FetchState::Ready(resolve_instance_state(
            Some(snapshot),
            state.instance_state(host_id, instance_id),
        )),
        Err(e) => {
            tracing::warn!(host_id, instance_id, error = %e, "Instance state fetch failed");
            FetchState::Failed(e.to_string())
        }
    }
}

/// Merge recent error and reroute history into the audit ring.
///
/// Returns the ring size after the merge.
pub async fn backfill_audit_events(
    api: &dyn ControlPlaneApi,
    state: &FleetState,
    range: &TimeRange,
    limit: u32,
) -> FetchState<usize> {
    let kinds = [RoutingEventKind::RequestError, RoutingEventKind::RequestReroute];
    match api.fetch_recent_gateway_events(range, limit, &kinds).await {
        Ok(history) => {
            let fetched = history.len();
            state.backfill_audit(history);
            let retained = state.audit_events().len();
            tracing::debug!(fetched, retained, "Audit backfill merged");
            FetchState::Ready(retained)
        }
        Err(e) => {
            tracing::warn!(error = %e, "Audit backfill failed");
            FetchState::Failed(e.to_string())
        }
    }
}

/// Live summaries that fall under `query`'s filter.
///
/// The slice may still hold entries received before the server applied the
/// current filter.
fn live_matching(state: &FleetState, query: &GatewayQuery) -> Vec<GatewayRequestSummary> {
    state
        .gateway_requests()
        .into_iter()
        .filter(|summary| query.filter.admits(summary))
        .collect()
}

/// Gateway counters for `query`, topped up with matching live summaries.
pub async fn load_gateway_stats(
    api: &dyn ControlPlaneApi,
    state: &FleetState,
    query: &GatewayQuery,
) -> FetchState<GatewayStats> {
    match api.fetch_gateway_stats(query).await {
        Ok(stats) => FetchState::Ready(apply_live_requests(
            &stats,
            &live_matching(state, query),
            None,
        )),
        Err(e) => {
            tracing::warn!(error = %e, "Gateway stats fetch failed");
            FetchState::Failed(e.to_string())
        }
    }
}

/// One page of gateway history merged with the matching live summaries.
pub async fn load_gateway_requests(
    api: &dyn ControlPlaneApi,
    state: &FleetState,
    query: &GatewayQuery,
    capacity: usize,
) -> FetchState<Vec<GatewayRequestSummary>> {
    match api.fetch_gateway_requests(query).await {
        Ok(page) => FetchState::Ready(merge_gateway_requests(
            &page.requests,
            &live_matching(state, query),
            capacity,
        )),
        Err(e) => {
            tracing::warn!(error = %e, "Gateway history fetch failed");
            FetchState::Failed(e.to_string())
        }
    }
}

/// Count of live summaries per outcome, for quick status lines.
pub fn outcome_counts(summaries: &[GatewayRequestSummary]) -> HashMap<GatewayOutcome, usize> {
    let mut counts = HashMap::new();
    for summary in summaries {
        *counts.entry(summary.status).or_insert(0) += 1;
    }
    counts
}
