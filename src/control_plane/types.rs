//! Request and response types for the control-plane REST API

use crate::events::{GatewayRequestSummary, Timestamp};
use crate::filter::{GatewayFilter, RequestKind, StatusClass};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Closed time window for history queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub start: Timestamp,
    pub end: Timestamp,
}

impl TimeRange {
    pub fn new(start: Timestamp, end: Timestamp) -> Self {
        Self { start, end }
    }

    /// The window ending now and spanning `span`.
    pub fn last(span: Duration) -> Self {
        let end = Utc::now();
        let span = chrono::Duration::from_std(span).unwrap_or_else(|_| chrono::Duration::zero());
        Self {
            start: Timestamp::from_datetime(end - span),
            end: Timestamp::from_datetime(end),
        }
    }

    pub(crate) fn query(&self) -> Vec<(&'static str, String)> {
        vec![
            ("start", self.start.to_string()),
            ("end", self.end.to_string()),
        ]
    }
}

/// Gateway history query: time window, feed filter and paging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayQuery {
    pub range: TimeRange,
    pub filter: GatewayFilter,
    /// 1-based page number
    pub page: u32,
    pub limit: u32,
}

impl GatewayQuery {
    pub fn new(range: TimeRange, filter: GatewayFilter) -> Self {
        Self {
            range,
            filter,
            page: 1,
            limit: 50,
        }
    }

    /// Query parameters for the stats endpoint (no paging).
    pub(crate) fn filter_query(&self) -> Vec<(&'static str, String)> {
        let mut params = self.range.query();
        if !matches!(self.filter.status, StatusClass::All | StatusClass::Unknown) {
            params.push(("status", self.filter.status.as_str().to_string()));
        }
        if !matches!(
            self.filter.request_type,
            RequestKind::All | RequestKind::Unknown
        ) {
            params.push(("request_type", self.filter.request_type.as_str().to_string()));
        }
        if let Some(model) = &self.filter.model {
            params.push(("model", model.clone()));
        }
        if let Some(host_id) = &self.filter.host_id {
            params.push(("host_id", host_id.clone()));
        }
        params
    }

    pub(crate) fn page_query(&self) -> Vec<(&'static str, String)> {
        let mut params = self.filter_query();
        params.push(("page", self.page.max(1).to_string()));
        params.push(("limit", self.limit.to_string()));
        params
    }
}

/// Aggregate gateway counters for a time window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct GatewayStats {
    #[serde(default, alias = "total")]
    pub total_requests: u64,
    #[serde(default, alias = "success")]
    pub success_count: u64,
    #[serde(default, alias = "error", alias = "errors")]
    pub error_count: u64,
    #[serde(default, alias = "missed")]
    pub missed_count: u64,
    /// Mean duration in seconds
    #[serde(default)]
    pub avg_duration: Option<f64>,
    /// Server time the counters were computed at
    #[serde(default, alias = "timestamp")]
    pub snapshot_at: Option<Timestamp>,
}

impl GatewayStats {
    /// Fraction of requests that ended in error or were missed.
    pub fn failure_rate(&self) -> Option<f64> {
        if self.total_requests == 0 {
            return None;
        }
        Some((self.error_count + self.missed_count) as f64 / self.total_requests as f64)
    }
}

/// One page of gateway request history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct GatewayRequestPage {
    #[serde(default, alias = "items", alias = "data")]
    pub requests: Vec<GatewayRequestSummary>,
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub page: u32,
    #[serde(default)]
    pub limit: u32,
}
