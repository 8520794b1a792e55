//! Gateway feed filter.
//!
//! The operator's desired filter is merged locally, pushed to the control plane
//! over the open feed connection and considered confirmed once the server
//! echoes it back in a `filter_status` event.

use crate::events::{GatewayOutcome, GatewayRequestSummary, OutboundFrame};
use crate::stream::FeedSender;
use serde::{Deserialize, Serialize};
use std::sync::{PoisonError, RwLock};

/// Outcome class the gateway feed is restricted to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StatusClass {
    #[default]
    All,
    Success,
    Error,
    Missed,
    /// Class this client does not know; never parsed from the command line
    #[serde(other)]
    Unknown,
}

/// Request kind the gateway feed is restricted to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RequestKind {
    #[default]
    All,
    Chat,
    Completion,
    Embedding,
    Classification,
    Rerank,
    #[serde(other)]
    Unknown,
}

impl StatusClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusClass::All => "all",
            StatusClass::Success => "success",
            StatusClass::Error => "error",
            StatusClass::Missed => "missed",
            StatusClass::Unknown => "unknown",
        }
    }
}

impl RequestKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestKind::All => "all",
            RequestKind::Chat => "chat",
            RequestKind::Completion => "completion",
            RequestKind::Embedding => "embedding",
            RequestKind::Classification => "classification",
            RequestKind::Rerank => "rerank",
            RequestKind::Unknown => "unknown",
        }
    }
}

impl std::str::FromStr for StatusClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "all" => Ok(StatusClass::All),
            "success" => Ok(StatusClass::Success),
            "error" => Ok(StatusClass::Error),
            "missed" => Ok(StatusClass::Missed),
            _ => Err(format!("Invalid status class: {}", s)),
        }
    }
}

impl std::str::FromStr for RequestKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "all" => Ok(RequestKind::All),
            "chat" => Ok(RequestKind::Chat),
            "completion" => Ok(RequestKind::Completion),
            "embedding" => Ok(RequestKind::Embedding),
            "classification" => Ok(RequestKind::Classification),
            "rerank" => Ok(RequestKind::Rerank),
            _ => Err(format!("Invalid request type: {}", s)),
        }
    }
}

/// Server-side filter for the gateway request feed.
///
/// `model` and `host_id` serialize as `null` when unset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct GatewayFilter {
    #[serde(default)]
    pub status: StatusClass,
    #[serde(default)]
    pub request_type: RequestKind,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub host_id: Option<String>,
}

/// Partial filter update; `None` keeps the previous value.
///
/// `model` and `host_id` are doubly optional so a patch can clear them.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FilterPatch {
    pub status: Option<StatusClass>,
    pub request_type: Option<RequestKind>,
    pub model: Option<Option<String>>,
    pub host_id: Option<Option<String>>,
}

impl FilterPatch {
    pub fn status(status: StatusClass) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }
}

impl GatewayFilter {
    /// Functional merge of a patch over this filter.
    pub fn merged(&self, patch: &FilterPatch) -> GatewayFilter {
        GatewayFilter {
            status: patch.status.unwrap_or(self.status),
            request_type: patch.request_type.unwrap_or(self.request_type),
            model: patch.model.clone().unwrap_or_else(|| self.model.clone()),
            host_id: patch.host_id.clone().unwrap_or_else(|| self.host_id.clone()),
        }
    }

    /// Whether a completed request belongs under this filter.
    ///
    /// Fields the summary does not report, and filter values this client does
    /// not recognize, never exclude it.
    pub fn admits(&self, summary: &GatewayRequestSummary) -> bool {
        let status = match self.status {
            StatusClass::All | StatusClass::Unknown => true,
            StatusClass::Success => summary.status == GatewayOutcome::Success,
            StatusClass::Error => summary.status == GatewayOutcome::Error,
            StatusClass::Missed => summary.status == GatewayOutcome::Missed,
        };
        let request_type = match (self.request_type, summary.request_type.as_deref()) {
            (RequestKind::All | RequestKind::Unknown, _) | (_, None) => true,
            (kind, Some(reported)) => reported.eq_ignore_ascii_case(kind.as_str()),
        };
        let model = match &self.model {
            None => true,
            Some(model) => match (&summary.model, &summary.resolved_model) {
                (None, None) => true,
                (requested, resolved) => {
                    requested.as_ref() == Some(model) || resolved.as_ref() == Some(model)
                }
            },
        };
        let host = match (&self.host_id, &summary.host_id) {
            (Some(wanted), Some(reported)) => wanted == reported,
            _ => true,
        };
        status && request_type && model && host
    }
}

struct FilterState {
    current: GatewayFilter,
    confirmed: Option<GatewayFilter>,
}

/// Tracks the desired gateway filter and syncs it upstream.
pub struct FilterController {
    state: RwLock<FilterState>,
    feed: FeedSender,
}

impl FilterController {
    pub fn new(feed: FeedSender) -> Self {
        Self {
            state: RwLock::new(FilterState {
                current: GatewayFilter::default(),
                confirmed: None,
            }),
            feed,
        }
    }

    /// Merge `patch` into the current filter and push the result upstream.
    ///
    /// The push is dropped when the feed is not connected; it is not replayed
    /// on the next connection.
    pub fn set_filter(&self, patch: FilterPatch) -> GatewayFilter {
        let merged = {
            let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
            let merged = state.current.merged(&patch);
            state.current = merged.clone();
            merged
        };

        let frame = OutboundFrame::SetFilter {
            filter: merged.clone(),
        };
        if self.feed.send(&frame) {
            tracing::debug!(filter = ?merged, "Pushed gateway filter");
        } else {
            tracing::debug!(filter = ?merged, "Feed not connected, gateway filter push dropped");
        }

        merged
    }

    /// Authoritative overwrite from a `filter_status` echo.
    pub fn apply_status(&self, filter: GatewayFilter) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.current = filter.clone();
        state.confirmed = Some(filter);
    }

    pub fn current(&self) -> GatewayFilter {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .current
            .clone()
    }

    /// Whether the server has echoed the current filter.
    pub fn is_confirmed(&self) -> bool {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        state.confirmed.as_ref() == Some(&state.current)
    }
}
