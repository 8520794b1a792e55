//! Live feed session shared by the streaming commands

use crate::config::FleetDeckConfig;
use crate::control_plane::ControlPlaneClient;
use crate::state::{FleetState, SliceUpdate};
use crate::stream::EventStream;
use anyhow::Context;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Longest wait for the stream task after cancellation.
const STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// Wait for SIGINT or SIGTERM, then cancel `cancel_token`.
pub async fn shutdown_signal(cancel_token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "Failed to install CTRL+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received SIGINT, shutting down...");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, shutting down...");
        }
        _ = cancel_token.cancelled() => {}
    }

    cancel_token.cancel();
}

/// A running event stream plus the state it feeds.
pub struct LiveSession {
    pub state: Arc<FleetState>,
    pub cancel_token: CancellationToken,
    updates: broadcast::Receiver<SliceUpdate>,
    stream: JoinHandle<()>,
    signals: JoinHandle<()>,
}

impl LiveSession {
    /// Build the state, start the stream and hook up signal handling.
    pub fn start(config: &FleetDeckConfig) -> anyhow::Result<Self> {
        let state = FleetState::new(&config.retention);
        let updates = state.subscribe();
        let stream = EventStream::from_config(config, state.clone())
            .context("Invalid event feed URL")?;
        tracing::debug!(url = %stream.url(), "Starting live session");

        let cancel_token = CancellationToken::new();
        let stream = stream.start(cancel_token.clone());
        let signals = tokio::spawn(shutdown_signal(cancel_token.clone()));

        Ok(Self {
            state,
            cancel_token,
            updates,
            stream,
            signals,
        })
    }

    /// Next change notification, or `None` once the session is cancelled.
    ///
    /// Lagged notifications are skipped.
    pub async fn next_update(&mut self) -> Option<SliceUpdate> {
        loop {
            tokio::select! {
                _ = self.cancel_token.cancelled() => return None,
                update = self.updates.recv() => match update {
                    Ok(update) => return Some(update),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::debug!(skipped, "Update receiver lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => return None,
                },
            }
        }
    }

    /// Cancel the stream, wait for it to finish and drop pending timers.
    pub async fn stop(self) {
        self.cancel_token.cancel();
        if tokio::time::timeout(STOP_TIMEOUT, self.stream).await.is_err() {
            tracing::warn!("Event stream did not stop in time");
        }
        self.signals.abort();
        self.state.shutdown();
    }
}

/// REST client for the configured control plane.
pub fn rest_client(config: &FleetDeckConfig) -> anyhow::Result<ControlPlaneClient> {
    ControlPlaneClient::new(&config.control_plane).context("Failed to create control-plane client")
}
