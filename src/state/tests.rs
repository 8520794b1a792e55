use super::*;
use crate::events::{parse, GatewayOutcome, HostState, MemorySnapshot, RequestPayload, Timestamp};
use crate::filter::StatusClass;
use serde_json::json;
use std::time::Duration;

fn state() -> Arc<FleetState> {
    FleetState::new(&RetentionConfig::default())
}

fn apply_json(state: &FleetState, value: serde_json::Value) -> Option<SliceUpdate> {
    let event = parse(&value.to_string()).unwrap();
    state.apply(event)
}

fn request(id: &str) -> RequestPayload {
    RequestPayload {
        request_id: id.to_string(),
        ..Default::default()
    }
}

fn host(id: &str, status: HostState) -> HostStatus {
    HostStatus {
        host_id: id.to_string(),
        name: format!("{}-name", id),
        status,
        ..Default::default()
    }
}

#[test]
fn test_initial_status_replaces_host_map() {
    let state = state();
    state.apply(StreamEvent::InitialStatus(vec![
        host("h1", HostState::Online),
        host("h2", HostState::Online),
    ]));
    state.apply(StreamEvent::InitialStatus(vec![host("h3", HostState::Offline)]));

    let hosts = state.hosts();
    assert_eq!(hosts.len(), 1);
    assert!(hosts.contains_key("h3"));
}

#[test]
fn test_host_health_only_touches_memory_of_known_host() {
    let state = state();
    state.apply(StreamEvent::HostStatus(host("h1", HostState::Online)));

    let memory = MemorySnapshot {
        used: 12.0,
        total: 24.0,
        percent: 50.0,
        kind: Some("vram".to_string()),
    };
    let update = state.apply(StreamEvent::HostHealth {
        host_id: "h1".to_string(),
        memory: Some(memory.clone()),
    });
    assert_eq!(update, Some(SliceUpdate::Host("h1".to_string())));

    let h1 = state.host("h1").unwrap();
    assert_eq!(h1.memory, Some(memory));
    assert_eq!(h1.status, HostState::Online);
    assert_eq!(h1.name, "h1-name");

    let update = state.apply(StreamEvent::HostHealth {
        host_id: "ghost".to_string(),
        memory: None,
    });
    assert_eq!(update, None);
    assert!(state.host("ghost").is_none());
}

#[test]
fn test_instance_state_is_replaced_not_merged() {
    let state = state();
    let key = InstanceKey::new("h1", "i1");
    state.apply(StreamEvent::InstanceState {
        key: key.clone(),
        state: InstanceRuntimeState {
            busy: true,
            prompt_tokens: Some(512),
            ..Default::default()
        },
    });
    state.apply(StreamEvent::InstanceState {
        key,
        state: InstanceRuntimeState::default(),
    });

    let current = state.instance_state("h1", "i1").unwrap();
    assert!(!current.busy);
    assert_eq!(current.prompt_tokens, None);
    assert!(state.instance_state("h1", "other").is_none());
}

#[test]
fn test_logs_are_bounded_per_instance() {
    let state = state();
    for seq in 0..1500u64 {
        state.apply(StreamEvent::Log {
            key: InstanceKey::new("h1", "i1"),
            line: LogLine {
                seq,
                timestamp: None,
                line: format!("line {}", seq),
            },
        });
    }
    let lines = state.instance_logs("h1", "i1");
    assert_eq!(lines.len(), 1000);
    assert_eq!(lines.first().unwrap().seq, 500);
    assert_eq!(lines.last().unwrap().seq, 1499);
    assert!(state.instance_logs("h1", "i2").is_empty());

    state.clear_instance_logs("h1", "i1");
    assert!(state.instance_logs("h1", "i1").is_empty());
}

#[test]
fn test_unknown_and_keepalive_events_change_nothing() {
    let state = state();
    let mut rx = state.subscribe();

    assert_eq!(apply_json(&state, json!({"type": "future_feature_x"})), None);
    assert_eq!(apply_json(&state, json!({"type": "keepalive"})), None);

    assert!(state.hosts().is_empty());
    assert!(state.requests().is_empty());
    assert!(rx.try_recv().is_err());
}

#[test]
fn test_request_error_feeds_lifecycle_and_audit() {
    let state = state();
    let mut rx = state.subscribe();
    apply_json(
        &state,
        json!({
            "type": "request_error",
            "timestamp": "2024-05-01T10:00:00Z",
            "data": {"request_id": "r9", "error": "all instances busy"}
        }),
    );

    assert_eq!(state.request("r9").unwrap().status, RequestStatus::Error);
    let audit = state.audit_events();
    assert_eq!(audit.len(), 1);
    assert_eq!(audit[0].request_id(), Some("r9"));

    assert_eq!(rx.try_recv().unwrap(), SliceUpdate::Audit);
    assert_eq!(rx.try_recv().unwrap(), SliceUpdate::Request("r9".to_string()));
}

#[test]
fn test_gateway_newest_first_and_clear() {
    let state = state();
    for i in 0..3 {
        state.apply(StreamEvent::GatewayRequest(GatewayRequestSummary {
            request_id: format!("g{}", i),
            status: GatewayOutcome::Success,
            ..Default::default()
        }));
    }
    let ids: Vec<_> = state
        .gateway_requests()
        .into_iter()
        .map(|s| s.request_id)
        .collect();
    assert_eq!(ids, vec!["g2", "g1", "g0"]);

    state.clear_gateway_requests();
    assert!(state.gateway_requests().is_empty());
}

#[test]
fn test_filter_status_event_confirms_filter() {
    let state = state();
    state.set_filter(FilterPatch::status(StatusClass::Error));
    assert!(!state.is_filter_confirmed());

    apply_json(
        &state,
        json!({
            "type": "filter_status",
            "filter": {"status": "error", "request_type": "all", "model": null, "host_id": null}
        }),
    );
    assert!(state.is_filter_confirmed());
    assert_eq!(state.filter().status, StatusClass::Error);
}

#[test]
fn test_set_connected_announces_transitions_only() {
    let state = state();
    let mut rx = state.subscribe();

    state.set_connected(true);
    state.set_connected(true);
    state.set_connected(false);

    assert_eq!(rx.try_recv().unwrap(), SliceUpdate::Connection(true));
    assert_eq!(rx.try_recv().unwrap(), SliceUpdate::Connection(false));
    assert!(rx.try_recv().is_err());
    assert!(!state.is_connected());
}

#[tokio::test(start_paused = true)]
async fn test_two_phase_removal() {
    let state = state();
    state.apply(StreamEvent::RequestError(
        request("r1"),
        crate::events::RoutingEvent {
            kind: crate::events::RoutingEventKind::RequestError,
            timestamp: None,
            data: json!({"request_id": "r1"}),
        },
    ));

    state.remove_request("r1");
    let entry = state.request("r1").unwrap();
    assert!(entry.removing);

    tokio::time::sleep(Duration::from_millis(349)).await;
    assert!(state.request("r1").is_some());

    tokio::time::sleep(Duration::from_millis(2)).await;
    assert!(state.request("r1").is_none());
}

#[tokio::test(start_paused = true)]
async fn test_remove_unknown_request_is_harmless() {
    let state = state();
    state.remove_request("nope");
    tokio::time::sleep(Duration::from_millis(400)).await;
    assert!(state.requests().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_success_expires_after_five_seconds() {
    let state = state();
    state.apply(StreamEvent::RequestStart(request("r1")));
    state.apply(StreamEvent::RequestRouted(request("r1")));
    state.apply(StreamEvent::RequestSuccess(RequestPayload {
        duration: Some(1.2),
        ..request("r1")
    }));

    tokio::time::sleep(Duration::from_millis(4600)).await;
    let entry = state.request("r1").unwrap();
    assert_eq!(entry.status, RequestStatus::Success);
    assert!(!entry.removing);

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(state.request("r1").unwrap().removing);

    tokio::time::sleep(Duration::from_millis(301)).await;
    assert!(state.request("r1").is_none());
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_cancels_pending_removals() {
    let state = state();
    state.apply(StreamEvent::RequestSuccess(request("r1")));
    state.apply(StreamEvent::RequestError(
        request("r2"),
        crate::events::RoutingEvent {
            kind: crate::events::RoutingEventKind::RequestError,
            timestamp: None,
            data: json!({"request_id": "r2"}),
        },
    ));
    state.remove_request("r2");

    state.shutdown();
    tokio::time::sleep(Duration::from_secs(10)).await;

    assert!(state.request("r1").is_some());
    assert!(state.request("r2").is_some());
}

#[tokio::test(start_paused = true)]
async fn test_end_to_end_scenario() {
    let state = state();
    let frames = [
        json!({"type": "initial_status", "data": [
            {"host_id": "h1", "name": "alpha", "status": "online", "url": "http://alpha:9000"}
        ]}),
        json!({"type": "request_start", "data": {"request_id": "r1", "model": "llama-7b", "stream": true}}),
        json!({"type": "request_routed", "data": {"request_id": "r1", "host_id": "h1", "instance_id": "i1"}}),
        json!({"type": "instance_state", "host_id": "h1", "instance_id": "i1",
               "data": {"busy": true, "phase": "generating", "generated_tokens": 17}}),
        json!({"type": "log", "host_id": "h1", "instance_id": "i1", "data": {"seq": 1, "line": "decode step"}}),
        json!({"type": "request_success", "data": {"request_id": "r1", "duration": 0.8}}),
    ];
    for frame in frames {
        apply_json(&state, frame);
    }

    assert_eq!(state.hosts().len(), 1);
    let r1 = state.request("r1").unwrap();
    assert_eq!(r1.status, RequestStatus::Success);
    assert_eq!(r1.host_id.as_deref(), Some("h1"));
    assert_eq!(r1.model.as_deref(), Some("llama-7b"));
    assert!(state.instance_state("h1", "i1").unwrap().busy);
    assert_eq!(state.instance_logs("h1", "i1").len(), 1);

    tokio::time::sleep(Duration::from_millis(5001)).await;
    assert!(state.request("r1").is_none());
}

#[test]
fn test_request_snapshot_orders_by_start_time() {
    let state = state();
    let at = |secs: f64| Timestamp::from_unix_seconds(secs);
    state.apply(StreamEvent::RequestStart(RequestPayload {
        timestamp: at(200.0),
        ..request("late")
    }));
    state.apply(StreamEvent::RequestStart(RequestPayload {
        timestamp: at(100.0),
        ..request("early")
    }));

    let ids: Vec<_> = state.requests().into_iter().map(|r| r.request_id).collect();
    assert_eq!(ids, vec!["early", "late"]);
}
