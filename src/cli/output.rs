//! Output formatting helpers for CLI commands

use crate::control_plane::GatewayStats;
use crate::events::{GatewayOutcome, GatewayRequestSummary, HostState, HostStatus, LogLine, RoutingEvent};
use crate::state::{RequestState, RequestStatus};
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, Cell, ContentArrangement, Table};
use serde::Serialize;
use serde_json::json;

fn table(header: Vec<&str>) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(header);
    table
}

fn or_dash(value: Option<&str>) -> String {
    value.unwrap_or("-").to_string()
}

fn seconds(duration: Option<f64>) -> String {
    match duration {
        Some(d) => format!("{:.2}s", d),
        None => "-".to_string(),
    }
}

/// Colored label for a host state
pub fn host_state_label(state: HostState) -> String {
    match state {
        HostState::Online => "Online".green().to_string(),
        HostState::Offline => "Offline".red().to_string(),
        HostState::Error => "Error".red().bold().to_string(),
        HostState::Unknown => "Unknown".yellow().to_string(),
    }
}

/// Colored label for a request lifecycle status
pub fn request_status_label(status: RequestStatus, removing: bool) -> String {
    let label = match status {
        RequestStatus::Pending => "Pending".yellow().to_string(),
        RequestStatus::Processing => "Processing".cyan().to_string(),
        RequestStatus::Success => "Success".green().to_string(),
        RequestStatus::Error => "Error".red().to_string(),
    };
    if removing {
        label.dimmed().to_string()
    } else {
        label
    }
}

/// Colored label for a gateway outcome
pub fn outcome_label(outcome: GatewayOutcome) -> String {
    match outcome {
        GatewayOutcome::Success => "success".green().to_string(),
        GatewayOutcome::Error => "error".red().to_string(),
        GatewayOutcome::Missed => "missed".yellow().to_string(),
        GatewayOutcome::Unknown => "unknown".dimmed().to_string(),
    }
}

/// Format hosts as a table, sorted by host id
pub fn format_hosts_table(hosts: &[HostStatus]) -> String {
    let mut table = table(vec!["Host", "Name", "Status", "URL", "Memory", "Last Seen"]);

    for h in hosts {
        let memory = match &h.memory {
            Some(m) => format!(
                "{:.1}/{:.1} ({:.0}%){}",
                m.used,
                m.total,
                m.percent,
                m.kind.as_deref().map(|k| format!(" {}", k)).unwrap_or_default()
            ),
            None => "-".to_string(),
        };
        table.add_row(vec![
            Cell::new(&h.host_id),
            Cell::new(&h.name),
            Cell::new(host_state_label(h.status)),
            Cell::new(&h.url),
            Cell::new(memory),
            Cell::new(
                h.last_seen
                    .map(|t| t.to_string())
                    .unwrap_or_else(|| "-".to_string()),
            ),
        ]);
    }

    table.to_string()
}

/// Format in-flight and recently finished requests as a table
pub fn format_requests_table(requests: &[RequestState]) -> String {
    let mut table = table(vec!["Request", "Model", "Target", "Status", "Duration", "Error"]);

    for r in requests {
        let target = match (&r.host_name, &r.host_id, &r.instance_id) {
            (Some(name), _, Some(instance)) => format!("{}/{}", name, instance),
            (None, Some(host), Some(instance)) => format!("{}/{}", host, instance),
            (Some(name), _, None) => name.clone(),
            (None, Some(host), None) => host.clone(),
            _ => "-".to_string(),
        };
        table.add_row(vec![
            Cell::new(&r.request_id),
            Cell::new(or_dash(r.resolved_model.as_deref().or(r.model.as_deref()))),
            Cell::new(target),
            Cell::new(request_status_label(r.status, r.removing)),
            Cell::new(seconds(r.duration)),
            Cell::new(or_dash(r.error.as_deref())),
        ]);
    }

    table.to_string()
}

/// Format gateway summaries as a table, in the given order
pub fn format_gateway_table(requests: &[GatewayRequestSummary]) -> String {
    let mut table = table(vec![
        "Time", "Request", "Type", "Model", "Host", "Status", "Code", "Duration",
    ]);

    for r in requests {
        table.add_row(vec![
            Cell::new(
                r.timestamp
                    .map(|t| t.as_datetime().format("%H:%M:%S").to_string())
                    .unwrap_or_else(|| "-".to_string()),
            ),
            Cell::new(&r.request_id),
            Cell::new(or_dash(r.request_type.as_deref())),
            Cell::new(or_dash(r.model.as_deref())),
            Cell::new(or_dash(r.host_id.as_deref())),
            Cell::new(outcome_label(r.status)),
            Cell::new(
                r.status_code
                    .map(|c| c.to_string())
                    .unwrap_or_else(|| "-".to_string()),
            ),
            Cell::new(seconds(r.duration)),
        ]);
    }

    table.to_string()
}

/// Format routing audit events as a table
pub fn format_audit_table(events: &[RoutingEvent]) -> String {
    let mut table = table(vec!["Time", "Event", "Request", "Detail"]);

    for e in events {
        let detail = e
            .data
            .get("error")
            .or_else(|| e.data.get("reason"))
            .and_then(|v| v.as_str())
            .unwrap_or("-");
        table.add_row(vec![
            Cell::new(
                e.timestamp
                    .map(|t| t.to_string())
                    .unwrap_or_else(|| "-".to_string()),
            ),
            Cell::new(e.kind.as_str()),
            Cell::new(or_dash(e.request_id())),
            Cell::new(detail),
        ]);
    }

    table.to_string()
}

/// One-line summary of gateway counters
pub fn format_stats_line(stats: &GatewayStats) -> String {
    let failure = stats
        .failure_rate()
        .map(|r| format!("{:.1}%", r * 100.0))
        .unwrap_or_else(|| "-".to_string());
    format!(
        "Total: {}  {} {}  {} {}  {} {}  Failure rate: {}  Avg: {}",
        stats.total_requests,
        "success".green(),
        stats.success_count,
        "error".red(),
        stats.error_count,
        "missed".yellow(),
        stats.missed_count,
        failure,
        seconds(stats.avg_duration)
    )
}

/// Format one log line for terminal output
pub fn format_log_line(line: &LogLine) -> String {
    match line.timestamp {
        Some(t) => format!(
            "{} {}",
            t.as_datetime().format("%H:%M:%S%.3f").to_string().dimmed(),
            line.line
        ),
        None => line.line.clone(),
    }
}

/// Pretty-printed JSON object with a single named field
pub fn format_json<T: Serialize + ?Sized>(key: &str, value: &T) -> String {
    serde_json::to_string_pretty(&json!({ key: value })).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Failed to serialize output");
        "{}".to_string()
    })
}

/// Single-line JSON, for streamed output
pub fn format_json_line<T: Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Failed to serialize output");
        "{}".to_string()
    })
}
