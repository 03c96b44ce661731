//! Connection lifecycle states.

use std::fmt;

/// Where the connection engine currently is in its lifecycle.
///
/// Transitions are linear from `Idle` through `Running`; a lost connection
/// moves to `Reconnecting` and back to `Resolving` when reconnection is
/// enabled, otherwise to `Stopped`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    /// `run` has not been called yet.
    Idle,
    /// Resolving the configured host name.
    Resolving,
    /// Establishing the TCP connection.
    Connecting,
    /// Exchanging the `HELLO 3` handshake.
    Handshaking,
    /// Reads, writes and the watchdog are active.
    Running,
    /// Connection lost; waiting out the reconnect interval.
    Reconnecting,
    /// The engine has exited.
    Stopped,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Resolving => "resolving",
            Self::Connecting => "connecting",
            Self::Handshaking => "handshaking",
            Self::Running => "running",
            Self::Reconnecting => "reconnecting",
            Self::Stopped => "stopped",
        };
        f.write_str(name)
    }
}
