//! Shared test utilities for FleetDeck integration tests.
//!
//! Provides an in-process mock control plane that serves the event feed over
//! a real websocket, plus config builders and polling helpers.

#![allow(dead_code)]

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
    routing::get,
    Router,
};
use fleetdeck::config::FleetDeckConfig;
use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

// =============================================================================
// Mock Control Plane
// =============================================================================

/// Instruction fanned out to every open feed session.
#[derive(Debug, Clone)]
pub enum ServerCommand {
    /// Send a text frame
    Send(String),
    /// Close the socket from the server side
    Drop,
}

#[derive(Clone)]
struct MockState {
    commands: broadcast::Sender<ServerCommand>,
    received: Arc<Mutex<Vec<String>>>,
    active: Arc<AtomicUsize>,
    total: Arc<AtomicUsize>,
    greeting: Arc<Vec<String>>,
}

/// Websocket event feed on `127.0.0.1` with an ephemeral port.
pub struct MockControlPlane {
    pub addr: SocketAddr,
    state: MockState,
    server: JoinHandle<()>,
}

impl MockControlPlane {
    /// Start a feed with no greeting frames.
    pub async fn start() -> Self {
        Self::with_greeting(Vec::new()).await
    }

    /// Start a feed that sends `greeting` to every new session.
    pub async fn with_greeting(greeting: Vec<String>) -> Self {
        let (commands, _) = broadcast::channel(256);
        let state = MockState {
            commands,
            received: Arc::new(Mutex::new(Vec::new())),
            active: Arc::new(AtomicUsize::new(0)),
            total: Arc::new(AtomicUsize::new(0)),
            greeting: Arc::new(greeting),
        };

        let app = Router::new()
            .route("/ws", get(feed_handler))
            .with_state(state.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            addr,
            state,
            server,
        }
    }

    /// Control-plane base URL, as a user would configure it.
    pub fn http_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Config pointing at this server with test-friendly timing.
    pub fn config(&self, keepalive_ms: u64, reconnect_ms: u64) -> FleetDeckConfig {
        let mut config = FleetDeckConfig::default();
        config.control_plane.url = self.http_url();
        config.stream.keepalive_interval_ms = keepalive_ms;
        config.stream.reconnect_delay_ms = reconnect_ms;
        config
    }

    /// Send a text frame to every open session.
    pub fn broadcast(&self, text: impl Into<String>) {
        let _ = self.state.commands.send(ServerCommand::Send(text.into()));
    }

    /// Close every open session from the server side.
    pub fn drop_sessions(&self) {
        let _ = self.state.commands.send(ServerCommand::Drop);
    }

    /// Text frames received from clients, in arrival order.
    pub fn received(&self) -> Vec<String> {
        self.state.received.lock().unwrap().clone()
    }

    pub fn active_sessions(&self) -> usize {
        self.state.active.load(Ordering::SeqCst)
    }

    /// Sessions accepted since start.
    pub fn total_sessions(&self) -> usize {
        self.state.total.load(Ordering::SeqCst)
    }
}

impl Drop for MockControlPlane {
    fn drop(&mut self) {
        self.server.abort();
    }
}

async fn feed_handler(ws: WebSocketUpgrade, State(state): State<MockState>) -> Response {
    ws.on_upgrade(move |socket| handle_session(socket, state))
}

async fn handle_session(socket: WebSocket, state: MockState) {
    // Subscribe before counting so a test that saw the session never misses a command.
    let mut commands = state.commands.subscribe();
    state.total.fetch_add(1, Ordering::SeqCst);
    state.active.fetch_add(1, Ordering::SeqCst);

    let (mut sender, mut receiver) = socket.split();
    for frame in state.greeting.iter() {
        if sender.send(Message::Text(frame.clone())).await.is_err() {
            state.active.fetch_sub(1, Ordering::SeqCst);
            return;
        }
    }

    loop {
        tokio::select! {
            command = commands.recv() => match command {
                Ok(ServerCommand::Send(text)) => {
                    if sender.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
                Ok(ServerCommand::Drop) => {
                    let _ = sender.send(Message::Close(None)).await;
                    break;
                }
                Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => break,
            },
            message = receiver.next() => match message {
                Some(Ok(Message::Text(text))) => {
                    state.received.lock().unwrap().push(text);
                }
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                Some(Ok(_)) => {}
            },
        }
    }

    state.active.fetch_sub(1, Ordering::SeqCst);
}

// =============================================================================
// Polling Helpers
// =============================================================================

/// Poll `condition` every 10ms until it holds or `timeout` elapses.
pub async fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

// =============================================================================
// Frame Builders
// =============================================================================

pub fn initial_status(host_ids: &[&str]) -> String {
    let hosts: Vec<_> = host_ids
        .iter()
        .map(|id| serde_json::json!({"host_id": id, "name": id, "status": "online"}))
        .collect();
    serde_json::json!({"type": "initial_status", "data": hosts}).to_string()
}

pub fn request_event(kind: &str, request_id: &str) -> String {
    serde_json::json!({"type": kind, "data": {"request_id": request_id}}).to_string()
}

pub fn gateway_request(request_id: &str, status: &str) -> String {
    serde_json::json!({
        "type": "gateway_request",
        "data": {"request_id": request_id, "status": status, "request_type": "chat"}
    })
    .to_string()
}
