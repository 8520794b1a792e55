//! reqwest-backed control-plane client

use super::{
    ControlPlaneApi, ControlPlaneError, GatewayQuery, GatewayRequestPage, GatewayStats, TimeRange,
};
use crate::config::ControlPlaneConfig;
use crate::events::{HostStatus, InstanceRuntimeState, LogLine, RoutingEvent, RoutingEventKind};
use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;

/// List endpoints answer either with a bare array or an object wrapping it.
#[derive(Deserialize)]
#[serde(untagged)]
enum Listing<T> {
    Bare(Vec<T>),
    Wrapped {
        #[serde(
            alias = "hosts",
            alias = "logs",
            alias = "lines",
            alias = "events",
            alias = "data"
        )]
        items: Vec<T>,
    },
}

impl<T> Listing<T> {
    fn into_vec(self) -> Vec<T> {
        match self {
            Listing::Bare(items) | Listing::Wrapped { items } => items,
        }
    }
}

/// Single-object endpoints may wrap the value in `{"state": ...}`.
#[derive(Deserialize)]
#[serde(untagged)]
enum StateBody {
    Wrapped { state: InstanceRuntimeState },
    Bare(InstanceRuntimeState),
}

/// HTTP client for the control-plane REST API.
pub struct ControlPlaneClient {
    base_url: Url,
    client: Client,
    timeout_seconds: u64,
}

impl ControlPlaneClient {
    pub fn new(config: &ControlPlaneConfig) -> Result<Self, ControlPlaneError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| ControlPlaneError::ConnectionFailed(e.to_string()))?;
        let base = config
            .http_base()
            .map_err(|e| ControlPlaneError::InvalidUrl(e.to_string()))?;
        Self::with_client(&base, client, config.timeout_seconds)
    }

    /// Create a client around an existing `reqwest::Client` (for testing).
    pub fn with_client(
        base_url: &str,
        client: Client,
        timeout_seconds: u64,
    ) -> Result<Self, ControlPlaneError> {
        let base_url =
            Url::parse(base_url).map_err(|e| ControlPlaneError::InvalidUrl(e.to_string()))?;
        Ok(Self {
            base_url,
            client,
            timeout_seconds,
        })
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str()
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, ControlPlaneError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ControlPlaneError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        query: &[(&'static str, String)],
    ) -> Result<T, ControlPlaneError> {
        let url = self.endpoint(segments)?;
        let path = url.path().to_string();
        tracing::debug!(path = %path, "Control-plane request");

        let response = self
            .client
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(|e| ControlPlaneError::classify(e, self.timeout_seconds))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ControlPlaneError::HttpError {
                status: status.as_u16(),
                path,
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| ControlPlaneError::classify(e, self.timeout_seconds))?;
        serde_json::from_str(&body).map_err(|e| {
            ControlPlaneError::ParseError(format!("Failed to parse {} response: {}", path, e))
        })
    }
}

#[async_trait]
impl ControlPlaneApi for ControlPlaneClient {
    async fn fetch_hosts(&self) -> Result<Vec<HostStatus>, ControlPlaneError> {
        let listing: Listing<HostStatus> = self.get_json(&["api", "hosts"], &[]).await?;
        Ok(listing.into_vec())
    }

    async fn fetch_instance_logs(
        &self,
        host_id: &str,
        instance_id: &str,
    ) -> Result<Vec<LogLine>, ControlPlaneError> {
        let listing: Listing<LogLine> = self
            .get_json(
                &["api", "hosts", host_id, "instances", instance_id, "logs"],
                &[],
            )
            .await?;
        Ok(listing.into_vec())
    }

    async fn fetch_instance_state(
        &self,
        host_id: &str,
        instance_id: &str,
    ) -> Result<InstanceRuntimeState, ControlPlaneError> {
        let body: StateBody = self
            .get_json(
                &["api", "hosts", host_id, "instances", instance_id, "state"],
                &[],
            )
            .await?;
        Ok(match body {
            StateBody::Wrapped { state } | StateBody::Bare(state) => state,
        })
    }

    async fn fetch_gateway_stats(
        &self,
        query: &GatewayQuery,
    ) -> Result<GatewayStats, ControlPlaneError> {
        self.get_json(&["api", "gateway", "stats"], &query.filter_query())
            .await
    }

    async fn fetch_gateway_requests(
        &self,
        query: &GatewayQuery,
    ) -> Result<GatewayRequestPage, ControlPlaneError> {
        self.get_json(&["api", "gateway", "requests"], &query.page_query())
            .await
    }

    async fn fetch_recent_gateway_events(
        &self,
        range: &TimeRange,
        limit: u32,
        kinds: &[RoutingEventKind],
    ) -> Result<Vec<RoutingEvent>, ControlPlaneError> {
        let mut query = range.query();
        query.push(("limit", limit.to_string()));
        if !kinds.is_empty() {
            let types: Vec<&str> = kinds.iter().map(|k| k.as_str()).collect();
            query.push(("types", types.join(",")));
        }
        let listing: Listing<RoutingEvent> =
            self.get_json(&["api", "gateway", "events"], &query).await?;
        Ok(listing.into_vec())
    }
}
