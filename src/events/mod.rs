//! Control-plane event feed wire format.
//!
//! Every JSON frame on the feed is an envelope with a `type` discriminant, a few
//! routing fields and a type-specific `data` payload. [`StreamEvent::decode`]
//! has one decode path per known discriminant and an explicit
//! [`StreamEvent::Unknown`] arm so that newer servers never break older clients.
//!
//! Heartbeats (`ping` / `pong`) travel as bare text outside the envelope.

mod error;
mod time;
mod types;

pub use error::DecodeError;
pub use time::Timestamp;
pub use types::*;

use crate::filter::GatewayFilter;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Heartbeat text sent by the client.
pub const PING: &str = "ping";
/// Heartbeat acknowledgement sent by the server.
pub const PONG: &str = "pong";

/// Returns true for bare heartbeat frames.
pub fn is_heartbeat(text: &str) -> bool {
    let text = text.trim();
    text.eq_ignore_ascii_case(PONG) || text.eq_ignore_ascii_case(PING)
}

/// Raw inbound envelope before discriminant-specific decoding.
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub host_id: Option<String>,
    #[serde(default)]
    pub host_name: Option<String>,
    #[serde(default)]
    pub instance_id: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub timestamp: Option<Timestamp>,
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default, deserialize_with = "lenient")]
    pub filter: Option<GatewayFilter>,
}

/// Optional field that reads as absent when its value does not parse.
pub(crate) fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(|value| match serde_json::from_value(value) {
        Ok(parsed) => Some(parsed),
        Err(e) => {
            tracing::debug!(error = %e, "Ignoring unparseable optional field");
            None
        }
    }))
}

/// A decoded feed event, one variant per recognized discriminant.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// Full host list, replaces the host slice
    InitialStatus(Vec<HostStatus>),
    HostStatus(HostStatus),
    HostHealth {
        host_id: String,
        memory: Option<MemorySnapshot>,
    },
    Log {
        key: InstanceKey,
        line: LogLine,
    },
    InstanceState {
        key: InstanceKey,
        state: InstanceRuntimeState,
    },
    RequestStart(RequestPayload),
    RequestRouted(RequestPayload),
    RequestSuccess(RequestPayload),
    /// Lifecycle payload plus the audit record kept for the routing timeline
    RequestError(RequestPayload, RoutingEvent),
    RequestReroute(RoutingEvent),
    GatewayRequest(GatewayRequestSummary),
    FilterStatus(GatewayFilter),
    Keepalive,
    /// Discriminant this client does not know about
    Unknown(String),
}

impl StreamEvent {
    /// Decode a parsed envelope into a typed event.
    pub fn decode(envelope: Envelope) -> Result<Self, DecodeError> {
        let Envelope {
            kind,
            host_id,
            host_name,
            instance_id,
            timestamp,
            data,
            filter,
        } = envelope;

        let event = match kind.as_str() {
            "initial_status" => {
                let hosts: Vec<HostStatus> = payload(&kind, data)?;
                StreamEvent::InitialStatus(hosts)
            }
            "host_status" => {
                let mut host: HostStatus = payload(&kind, data)?;
                if host.host_id.is_empty() {
                    host.host_id = host_id.ok_or_else(|| DecodeError::missing(&kind, "host_id"))?;
                }
                if host.name.is_empty() {
                    if let Some(name) = host_name {
                        host.name = name;
                    }
                }
                StreamEvent::HostStatus(host)
            }
            "host_health" => {
                let health: HostHealth = match data {
                    Some(value) => payload(&kind, Some(value))?,
                    None => HostHealth::default(),
                };
                let host_id = host_id
                    .or(health.host_id)
                    .ok_or_else(|| DecodeError::missing(&kind, "host_id"))?;
                StreamEvent::HostHealth {
                    host_id,
                    memory: health.memory,
                }
            }
            "log" => {
                let key = instance_key(&kind, host_id, instance_id)?;
                let mut line: LogLine = payload(&kind, data)?;
                if line.timestamp.is_none() {
                    line.timestamp = timestamp;
                }
                StreamEvent::Log { key, line }
            }
            "instance_state" => {
                let key = instance_key(&kind, host_id, instance_id)?;
                let mut state: InstanceRuntimeState = payload(&kind, data)?;
                if state.updated_at.is_none() {
                    state.updated_at = timestamp;
                }
                StreamEvent::InstanceState { key, state }
            }
            "request_start" => StreamEvent::RequestStart(request(&kind, data, timestamp)?),
            "request_routed" => StreamEvent::RequestRouted(request(&kind, data, timestamp)?),
            "request_success" => StreamEvent::RequestSuccess(request(&kind, data, timestamp)?),
            "request_error" => {
                let raw = data.clone().unwrap_or(Value::Null);
                let request = request(&kind, data, timestamp)?;
                let audit = RoutingEvent {
                    kind: RoutingEventKind::RequestError,
                    timestamp: request.timestamp,
                    data: raw,
                };
                StreamEvent::RequestError(request, audit)
            }
            "request_reroute" => StreamEvent::RequestReroute(RoutingEvent {
                kind: RoutingEventKind::RequestReroute,
                timestamp,
                data: data.unwrap_or(Value::Null),
            }),
            "gateway_request" => {
                let mut summary: GatewayRequestSummary = payload(&kind, data)?;
                if summary.timestamp.is_none() {
                    summary.timestamp = timestamp;
                }
                StreamEvent::GatewayRequest(summary)
            }
            "filter_status" => {
                let filter = match filter {
                    Some(filter) => filter,
                    None => payload(&kind, data)?,
                };
                StreamEvent::FilterStatus(filter)
            }
            "keepalive" => StreamEvent::Keepalive,
            _ => StreamEvent::Unknown(kind),
        };

        Ok(event)
    }

    /// Discriminant string this event was decoded from.
    pub fn kind(&self) -> &str {
        match self {
            StreamEvent::InitialStatus(_) => "initial_status",
            StreamEvent::HostStatus(_) => "host_status",
            StreamEvent::HostHealth { .. } => "host_health",
            StreamEvent::Log { .. } => "log",
            StreamEvent::InstanceState { .. } => "instance_state",
            StreamEvent::RequestStart(_) => "request_start",
            StreamEvent::RequestRouted(_) => "request_routed",
            StreamEvent::RequestSuccess(_) => "request_success",
            StreamEvent::RequestError(..) => "request_error",
            StreamEvent::RequestReroute(_) => "request_reroute",
            StreamEvent::GatewayRequest(_) => "gateway_request",
            StreamEvent::FilterStatus(_) => "filter_status",
            StreamEvent::Keepalive => "keepalive",
            StreamEvent::Unknown(kind) => kind,
        }
    }
}

/// Parse one text frame into an event.
pub fn parse(text: &str) -> Result<StreamEvent, DecodeError> {
    let envelope: Envelope = serde_json::from_str(text)?;
    StreamEvent::decode(envelope)
}

/// Frames the client pushes to the control plane
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundFrame {
    SetFilter { filter: GatewayFilter },
}

fn payload<T: DeserializeOwned>(kind: &str, data: Option<Value>) -> Result<T, DecodeError> {
    serde_json::from_value(data.unwrap_or(Value::Null)).map_err(|source| DecodeError::Payload {
        kind: kind.to_string(),
        source,
    })
}

fn request(
    kind: &str,
    data: Option<Value>,
    timestamp: Option<Timestamp>,
) -> Result<RequestPayload, DecodeError> {
    let mut request: RequestPayload = payload(kind, data)?;
    if request.request_id.is_empty() {
        return Err(DecodeError::missing(kind, "request_id"));
    }
    if request.timestamp.is_none() {
        request.timestamp = timestamp;
    }
    Ok(request)
}

fn instance_key(
    kind: &str,
    host_id: Option<String>,
    instance_id: Option<String>,
) -> Result<InstanceKey, DecodeError> {
    let host_id = host_id.ok_or_else(|| DecodeError::missing(kind, "host_id"))?;
    let instance_id = instance_id.ok_or_else(|| DecodeError::missing(kind, "instance_id"))?;
    Ok(InstanceKey::new(host_id, instance_id))
}
