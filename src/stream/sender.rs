//! Outbound half of the feed connection

use serde::Serialize;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc;

/// Handle for pushing text frames to the currently open feed session.
///
/// Each session attaches a fresh channel on open and detaches it on close, so
/// frames queued during one session are never delivered on a later one.
/// Clones share the same slot.
#[derive(Clone, Default)]
pub struct FeedSender {
    slot: Arc<Mutex<Option<mpsc::UnboundedSender<String>>>>,
}

impl FeedSender {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a new session channel, dropping any previous one.
    pub fn attach(&self) -> mpsc::UnboundedReceiver<String> {
        let (tx, rx) = mpsc::unbounded_channel();
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(tx);
        rx
    }

    pub fn detach(&self) {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }

    pub fn is_open(&self) -> bool {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|tx| !tx.is_closed())
    }

    /// Queue a raw text frame. Returns false when no session is open.
    pub fn send_text(&self, text: String) -> bool {
        match self
            .slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
        {
            Some(tx) => tx.send(text).is_ok(),
            None => false,
        }
    }

    /// Serialize `frame` as JSON and queue it.
    pub fn send<T: Serialize>(&self, frame: &T) -> bool {
        match serde_json::to_string(frame) {
            Ok(text) => self.send_text(text),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to serialize outbound frame");
                false
            }
        }
    }
}
