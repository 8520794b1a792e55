//! Connection lifecycle bookkeeping, free of any IO.
//!
//! The stream task asks this machine before every connect and reports every
//! open, close and error to it. It guarantees at most one live socket and at
//! most one pending reconnect, and nothing at all after teardown.

use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionPhase {
    Idle,
    Connecting,
    Open,
    ReconnectPending,
    TornDown,
}

#[derive(Debug)]
pub struct ConnectionLifecycle {
    phase: ConnectionPhase,
    reconnect_delay: Duration,
    reconnect_at: Option<Instant>,
    opened_at: Option<Instant>,
    sessions_opened: u64,
}

impl ConnectionLifecycle {
    pub fn new(reconnect_delay: Duration) -> Self {
        Self {
            phase: ConnectionPhase::Idle,
            reconnect_delay,
            reconnect_at: None,
            opened_at: None,
            sessions_opened: 0,
        }
    }

    /// Request a new connection attempt.
    ///
    /// Returns false while a socket is connecting or open, and after teardown.
    /// A pending reconnect is consumed by the attempt.
    pub fn begin_connect(&mut self) -> bool {
        match self.phase {
            ConnectionPhase::Idle | ConnectionPhase::ReconnectPending => {
                self.reconnect_at = None;
                self.phase = ConnectionPhase::Connecting;
                true
            }
            ConnectionPhase::Connecting | ConnectionPhase::Open | ConnectionPhase::TornDown => {
                false
            }
        }
    }

    pub fn on_open(&mut self, now: Instant) -> bool {
        if self.phase != ConnectionPhase::Connecting {
            return false;
        }
        self.phase = ConnectionPhase::Open;
        self.reconnect_at = None;
        self.opened_at = Some(now);
        self.sessions_opened += 1;
        true
    }

    /// Socket closed or failed to open. Returns the reconnect deadline the
    /// first time a session ends; later calls for the same session are no-ops.
    pub fn on_close(&mut self, now: Instant) -> Option<Instant> {
        match self.phase {
            ConnectionPhase::Connecting | ConnectionPhase::Open => {
                let deadline = now + self.reconnect_delay;
                self.phase = ConnectionPhase::ReconnectPending;
                self.reconnect_at = Some(deadline);
                self.opened_at = None;
                Some(deadline)
            }
            _ => None,
        }
    }

    /// Errors take the same path as a close.
    pub fn on_error(&mut self, now: Instant) -> Option<Instant> {
        self.on_close(now)
    }

    pub fn teardown(&mut self) {
        self.phase = ConnectionPhase::TornDown;
        self.reconnect_at = None;
        self.opened_at = None;
    }

    pub fn phase(&self) -> ConnectionPhase {
        self.phase
    }

    pub fn is_connected(&self) -> bool {
        self.phase == ConnectionPhase::Open
    }

    pub fn reconnect_deadline(&self) -> Option<Instant> {
        self.reconnect_at
    }

    pub fn opened_at(&self) -> Option<Instant> {
        self.opened_at
    }

    pub fn sessions_opened(&self) -> u64 {
        self.sessions_opened
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DELAY: Duration = Duration::from_secs(5);

    #[test]
    fn test_connect_is_idempotent_while_live() {
        let mut lifecycle = ConnectionLifecycle::new(DELAY);
        assert!(lifecycle.begin_connect());
        assert!(!lifecycle.begin_connect());

        assert!(lifecycle.on_open(Instant::now()));
        assert!(!lifecycle.begin_connect());
        assert!(lifecycle.is_connected());
        assert_eq!(lifecycle.sessions_opened(), 1);
    }

    #[test]
    fn test_close_schedules_single_reconnect() {
        let mut lifecycle = ConnectionLifecycle::new(DELAY);
        lifecycle.begin_connect();
        let now = Instant::now();
        lifecycle.on_open(now);

        let deadline = lifecycle.on_close(now).unwrap();
        assert_eq!(deadline, now + DELAY);
        assert!(!lifecycle.is_connected());

        // error after close of the same session
        assert_eq!(lifecycle.on_error(now), None);
        assert_eq!(lifecycle.on_close(now), None);
        assert_eq!(lifecycle.reconnect_deadline(), Some(deadline));
    }

    #[test]
    fn test_failed_connect_reconnects() {
        let mut lifecycle = ConnectionLifecycle::new(DELAY);
        lifecycle.begin_connect();
        assert!(lifecycle.on_error(Instant::now()).is_some());
        assert_eq!(lifecycle.phase(), ConnectionPhase::ReconnectPending);

        assert!(lifecycle.begin_connect());
        assert_eq!(lifecycle.reconnect_deadline(), None);
    }

    #[test]
    fn test_open_clears_pending_reconnect() {
        let mut lifecycle = ConnectionLifecycle::new(DELAY);
        lifecycle.begin_connect();
        lifecycle.on_close(Instant::now());
        lifecycle.begin_connect();
        lifecycle.on_open(Instant::now());
        assert_eq!(lifecycle.reconnect_deadline(), None);
        assert!(lifecycle.opened_at().is_some());
    }

    #[test]
    fn test_teardown_is_final() {
        let mut lifecycle = ConnectionLifecycle::new(DELAY);
        lifecycle.begin_connect();
        lifecycle.on_open(Instant::now());
        lifecycle.teardown();

        assert_eq!(lifecycle.on_close(Instant::now()), None);
        assert!(!lifecycle.begin_connect());
        assert!(!lifecycle.on_open(Instant::now()));
        assert_eq!(lifecycle.phase(), ConnectionPhase::TornDown);
    }

    #[test]
    fn test_open_without_connect_is_ignored() {
        let mut lifecycle = ConnectionLifecycle::new(DELAY);
        assert!(!lifecycle.on_open(Instant::now()));
        assert_eq!(lifecycle.phase(), ConnectionPhase::Idle);
    }
}
