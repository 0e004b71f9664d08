//! Connection state for the TETHER transport layer.
//!
//! One [`Connection`] exists per client and is owned exclusively by the
//! transport actor; it is mutated only by the actor's own event handling
//! and by explicit `open()`/`close()` commands.

use std::time::Duration;

use crate::core::{RECONNECT_BASE, RECONNECT_CAP};

/// Connection lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionPhase {
    /// No connection and none being attempted.
    Closed,
    /// A connection attempt is in flight.
    Opening,
    /// Connection established.
    Open,
    /// Explicit `close()` in progress; suppresses reconnection.
    Closing,
}

/// Observable snapshot of the transport's state flags.
///
/// Published through a watch channel so application code can react to the
/// transport newly becoming (dis)connected or authenticated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransportState {
    /// Transport-level link is up.
    pub connected: bool,
    /// Server has validated credentials.
    pub preauthenticated: bool,
    /// Application finished loading mandatory post-login state.
    ///
    /// Deliberately independent from `preauthenticated`: the two halves of
    /// the auth gate can be set in either order by different call sites.
    pub authenticated: bool,
    /// Server signalled throttling on this connection.
    pub throttled: bool,
}

/// Full connection state owned by the transport actor.
#[derive(Debug)]
pub struct Connection {
    /// Current lifecycle phase.
    pub phase: ConnectionPhase,
    /// Observable flag block.
    pub flags: TransportState,
    /// Whether a disconnect should schedule a reconnect.
    pub must_reconnect: bool,
}

impl Connection {
    /// Create a closed connection.
    pub fn new() -> Self {
        Self {
            phase: ConnectionPhase::Closed,
            flags: TransportState::default(),
            must_reconnect: false,
        }
    }

    /// Transition to `Open` and raise `connected`.
    pub fn on_connected(&mut self) {
        self.phase = ConnectionPhase::Open;
        self.flags.connected = true;
        self.flags.throttled = false;
    }

    /// Transition to `Closed`, clearing `connected` and both auth
    /// sub-flags. Authentication never survives a disconnect.
    pub fn on_disconnected(&mut self) {
        self.phase = ConnectionPhase::Closed;
        self.flags.connected = false;
        self.flags.preauthenticated = false;
        self.flags.authenticated = false;
    }
}

impl Default for Connection {
    fn default() -> Self {
        Self::new()
    }
}

/// Reconnect bookkeeping.
///
/// Invariant: at most one reconnect timer is armed at any time; the actor
/// enforces this by storing the deadline here.
#[derive(Debug, Default)]
pub struct ReconnectState {
    /// Consecutive failed attempts; resets on successful connect.
    pub attempt: u32,
    /// Deadline of the armed reconnect timer, if any.
    pub deadline: Option<tokio::time::Instant>,
}

impl ReconnectState {
    /// Clear the attempt counter after a successful connect.
    pub fn on_connected(&mut self) {
        self.attempt = 0;
        self.deadline = None;
    }
}

/// Delay before reconnect attempt number `attempt` with explicit bounds.
///
/// `min(base * 2^attempt, cap)` - capped exponential backoff with
/// unconditional infinite retry: giving up would leave the application
/// with no connectivity at all.
pub fn reconnect_delay_with(attempt: u32, base: Duration, cap: Duration) -> Duration {
    let base_ms = base.as_millis() as u64;
    let cap_ms = cap.as_millis() as u64;
    let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
    Duration::from_millis(base_ms.saturating_mul(factor).min(cap_ms))
}

/// [`reconnect_delay_with`] using the protocol default base and cap.
pub fn reconnect_delay(attempt: u32) -> Duration {
    reconnect_delay_with(attempt, RECONNECT_BASE, RECONNECT_CAP)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_sequence() {
        let delays: Vec<u64> = (0..6).map(|a| reconnect_delay(a).as_millis() as u64).collect();
        assert_eq!(delays, vec![500, 1000, 2000, 4000, 8000, 9000]);
    }

    #[test]
    fn test_backoff_stays_capped() {
        assert_eq!(reconnect_delay(10), RECONNECT_CAP);
        assert_eq!(reconnect_delay(63), RECONNECT_CAP);
        assert_eq!(reconnect_delay(64), RECONNECT_CAP);
        assert_eq!(reconnect_delay(u32::MAX), RECONNECT_CAP);
    }

    #[test]
    fn test_disconnect_clears_auth_flags() {
        let mut conn = Connection::new();
        conn.on_connected();
        conn.flags.preauthenticated = true;
        conn.flags.authenticated = true;

        conn.on_disconnected();
        assert!(!conn.flags.connected);
        assert!(!conn.flags.preauthenticated);
        assert!(!conn.flags.authenticated);
        assert_eq!(conn.phase, ConnectionPhase::Closed);
    }

    #[test]
    fn test_connect_clears_throttled() {
        let mut conn = Connection::new();
        conn.flags.throttled = true;
        conn.on_connected();
        assert!(!conn.flags.throttled);
    }
}
