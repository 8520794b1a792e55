//! Event feed connection manager.
//!
//! [`EventStream`] keeps one WebSocket to the control plane open, sends a
//! text `ping` on a fixed interval, folds every inbound frame into
//! [`FleetState`] and reconnects after a fixed delay whenever the socket goes
//! away. Cancelling the token passed to [`EventStream::start`] closes the
//! socket and stops all further attempts.

mod error;
mod lifecycle;
mod sender;

pub use error::StreamError;
pub use lifecycle::{ConnectionLifecycle, ConnectionPhase};
pub use sender::FeedSender;

use crate::config::{ConfigError, FleetDeckConfig, StreamConfig};
use crate::events::{self, PING};
use crate::state::{FleetState, SliceUpdate};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;

type FeedSocket = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// `interval` panics on a zero period.
const MIN_KEEPALIVE: Duration = Duration::from_millis(1);

/// Longest frame excerpt included in malformed-frame warnings.
const FRAME_EXCERPT_CHARS: usize = 200;

/// What happened to one inbound text frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameOutcome {
    /// Heartbeat, not parsed
    Heartbeat,
    /// Decoded and routed; `None` when no slice changed
    Applied(Option<SliceUpdate>),
    /// Not valid JSON or not a valid payload; dropped
    Malformed,
}

/// Route one raw text frame into `state`.
///
/// Never fails: malformed frames are logged and dropped so a bad frame cannot
/// take the connection down.
pub fn dispatch_frame(state: &FleetState, text: &str) -> FrameOutcome {
    if events::is_heartbeat(text) {
        return FrameOutcome::Heartbeat;
    }
    match events::parse(text) {
        Ok(event) => {
            tracing::trace!(kind = event.kind(), "Feed event");
            FrameOutcome::Applied(state.apply(event))
        }
        Err(e) => {
            let excerpt: String = text.chars().take(FRAME_EXCERPT_CHARS).collect();
            tracing::warn!(error = %e, frame = %excerpt, "Dropping malformed feed frame");
            FrameOutcome::Malformed
        }
    }
}

enum SessionEnd {
    Cancelled,
    Lost(StreamError),
}

/// Persistent, self-healing connection to the control-plane event feed.
pub struct EventStream {
    url: String,
    config: StreamConfig,
    state: Arc<FleetState>,
}

impl EventStream {
    pub fn new(url: impl Into<String>, config: StreamConfig, state: Arc<FleetState>) -> Self {
        Self {
            url: url.into(),
            config,
            state,
        }
    }

    /// Build the stream for the feed URL described by `config`.
    pub fn from_config(
        config: &FleetDeckConfig,
        state: Arc<FleetState>,
    ) -> Result<Self, ConfigError> {
        let url = config.control_plane.feed_url(&config.stream)?;
        Ok(Self::new(url, config.stream.clone(), state))
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Start the connection loop as a background task.
    pub fn start(self, cancel_token: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move { self.run(cancel_token).await })
    }

    async fn run(self, cancel_token: CancellationToken) {
        let feed = self.state.feed_sender();
        let mut lifecycle = ConnectionLifecycle::new(self.config.reconnect_delay());

        tracing::info!(
            url = %self.url,
            keepalive_ms = self.config.keepalive_interval_ms,
            reconnect_ms = self.config.reconnect_delay_ms,
            "Event stream started"
        );

        while lifecycle.begin_connect() {
            let connect = tokio::select! {
                _ = cancel_token.cancelled() => {
                    lifecycle.teardown();
                    break;
                }
                result = tokio_tungstenite::connect_async(self.url.as_str()) => result,
            };

            match connect {
                Ok((socket, _response)) => {
                    lifecycle.on_open(Instant::now());
                    let outbound = feed.attach();
                    self.state.set_connected(true);
                    tracing::info!(
                        url = %self.url,
                        session = lifecycle.sessions_opened(),
                        "Event feed connected"
                    );

                    let end = self.run_session(socket, outbound, &cancel_token).await;

                    feed.detach();
                    self.state.set_connected(false);
                    match end {
                        SessionEnd::Cancelled => {
                            lifecycle.teardown();
                            break;
                        }
                        SessionEnd::Lost(e) => {
                            tracing::warn!(error = %e, "Event feed disconnected");
                            lifecycle.on_close(Instant::now());
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(url = %self.url, error = %e, "Event feed connection failed");
                    lifecycle.on_error(Instant::now());
                }
            }

            let Some(deadline) = lifecycle.reconnect_deadline() else {
                break;
            };
            tracing::info!(
                delay_ms = self.config.reconnect_delay_ms,
                "Reconnecting to event feed"
            );
            tokio::select! {
                _ = cancel_token.cancelled() => {
                    lifecycle.teardown();
                    break;
                }
                _ = tokio::time::sleep_until(deadline) => {}
            }
        }

        self.state.set_connected(false);
        tracing::info!("Event stream shutting down");
    }

    async fn run_session(
        &self,
        socket: FeedSocket,
        mut outbound: mpsc::UnboundedReceiver<String>,
        cancel_token: &CancellationToken,
    ) -> SessionEnd {
        let (mut sink, mut source) = socket.split();
        let period = self.config.keepalive_interval().max(MIN_KEEPALIVE);
        let mut keepalive = tokio::time::interval_at(Instant::now() + period, period);
        keepalive.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = cancel_token.cancelled() => {
                    let _ = sink.send(Message::Close(None)).await;
                    return SessionEnd::Cancelled;
                }
                _ = keepalive.tick() => {
                    tracing::trace!("Sending keepalive ping");
                    if let Err(e) = sink.send(Message::Text(PING.to_string())).await {
                        return SessionEnd::Lost(e.into());
                    }
                }
                Some(text) = outbound.recv() => {
                    if let Err(e) = sink.send(Message::Text(text)).await {
                        return SessionEnd::Lost(e.into());
                    }
                }
                message = source.next() => match message {
                    Some(Ok(Message::Text(text))) => {
                        dispatch_frame(&self.state, &text);
                    }
                    Some(Ok(Message::Binary(bytes))) => match String::from_utf8(bytes) {
                        Ok(text) => {
                            dispatch_frame(&self.state, &text);
                        }
                        Err(_) => tracing::warn!("Dropping non-UTF-8 binary feed frame"),
                    },
                    Some(Ok(Message::Close(frame))) => {
                        let (code, reason) = frame
                            .map(|f| (u16::from(f.code), f.reason.into_owned()))
                            .unwrap_or((1005, String::new()));
                        return SessionEnd::Lost(StreamError::ClosedByServer { code, reason });
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return SessionEnd::Lost(e.into()),
                    None => return SessionEnd::Lost(StreamError::EndOfStream),
                },
            }
        }
    }
}
