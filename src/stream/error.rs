//! Error types for the event feed connection.

use thiserror::Error;
use tokio_tungstenite::tungstenite;

/// Ways a feed session can end other than local cancellation.
#[derive(Debug, Error)]
pub enum StreamError {
    /// WebSocket handshake or transport failure
    #[error("websocket error: {0}")]
    Transport(#[from] tungstenite::Error),

    /// Server sent a close frame
    #[error("closed by server (code {code}): {reason}")]
    ClosedByServer { code: u16, reason: String },

    /// Socket ended without a close frame
    #[error("connection ended unexpectedly")]
    EndOfStream,
}
