//! Connection State Machine
//!
//! Lifecycle of one streaming connection:
//!
//! ```text
//! Disconnected ─► Connecting ─► Authenticating ─► Subscribing ─► Streaming
//!                     ▲              │                 │             │
//!                     │              ▼                 ▼             ▼
//!                     └─────────── Reconnecting ◄────────────────────┘
//!
//! any state ─► Closed (cancellation or fatal error)
//! ```

use std::fmt;

/// State of a streaming connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// Not started.
    #[default]
    Disconnected,
    /// Opening the transport.
    Connecting,
    /// Auth message sent, waiting for the ack.
    Authenticating,
    /// Sending the subscribe message.
    Subscribing,
    /// Read loop running.
    Streaming,
    /// Waiting out the backoff before the next connect.
    Reconnecting,
    /// Terminal.
    Closed,
}

impl ConnectionState {
    /// Whether `next` is a legal successor of `self`.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        use ConnectionState::{
            Authenticating, Closed, Connecting, Disconnected, Reconnecting, Streaming, Subscribing,
        };

        matches!(
            (self, next),
            (Disconnected | Reconnecting, Connecting)
                | (Connecting, Authenticating)
                | (Authenticating, Subscribing)
                | (Subscribing, Streaming)
                | (Connecting | Authenticating | Subscribing | Streaming, Reconnecting)
                | (
                    Disconnected
                        | Connecting
                        | Authenticating
                        | Subscribing
                        | Streaming
                        | Reconnecting,
                    Closed
                )
        )
    }

    /// Whether the state is terminal.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Closed)
    }

    /// Whether the connection is delivering events.
    #[must_use]
    pub const fn is_streaming(self) -> bool {
        matches!(self, Self::Streaming)
    }

    /// Name used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Authenticating => "authenticating",
            Self::Subscribing => "subscribing",
            Self::Streaming => "streaming",
            Self::Reconnecting => "reconnecting",
            Self::Closed => "closed",
        }
    }

    /// Numeric value exported as a gauge.
    #[must_use]
    pub const fn as_gauge(self) -> f64 {
        match self {
            Self::Disconnected => 0.0,
            Self::Connecting => 1.0,
            Self::Authenticating => 2.0,
            Self::Subscribing => 3.0,
            Self::Streaming => 4.0,
            Self::Reconnecting => 5.0,
            Self::Closed => 6.0,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    use ConnectionState::*;

    #[test_case(Disconnected, Connecting)]
    #[test_case(Connecting, Authenticating)]
    #[test_case(Authenticating, Subscribing)]
    #[test_case(Subscribing, Streaming)]
    #[test_case(Streaming, Reconnecting)]
    #[test_case(Connecting, Reconnecting)]
    #[test_case(Reconnecting, Connecting)]
    #[test_case(Reconnecting, Closed)]
    #[test_case(Streaming, Closed)]
    fn allowed(from: ConnectionState, to: ConnectionState) {
        assert!(from.can_transition_to(to));
    }

    #[test_case(Disconnected, Streaming)]
    #[test_case(Connecting, Subscribing)]
    #[test_case(Streaming, Connecting)]
    #[test_case(Closed, Connecting)]
    #[test_case(Closed, Closed)]
    #[test_case(Disconnected, Reconnecting)]
    fn rejected(from: ConnectionState, to: ConnectionState) {
        assert!(!from.can_transition_to(to));
    }

    #[test]
    fn defaults_to_disconnected() {
        assert_eq!(ConnectionState::default(), Disconnected);
        assert!(Closed.is_terminal());
        assert!(Streaming.is_streaming());
    }
}
