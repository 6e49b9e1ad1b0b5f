//! Error types for the Chatline session core.
//!
//! Strongly-typed errors for each layer: connection errors (handshake,
//! heartbeat, retries), identity store errors, and local command validation.
//!
//! None of these crash a session. Validation errors hand the input back to the
//! caller, connection errors drive the reconnection state machine, and store
//! errors degrade to "no persisted identity".

use std::{io, time::Duration};

use chatline_proto::{PacketType, ProtocolError};
use thiserror::Error;

use crate::connection::ConnectionState;

/// Errors that can occur during connection state machine operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    /// Configuration lists no transport kinds
    #[error("no transport kinds configured")]
    NoTransports,

    /// Received a packet that makes no sense in the current state
    #[error("unexpected {packet:?} packet in state {state:?}")]
    UnexpectedPacket {
        /// Current state when the packet arrived
        state: ConnectionState,
        /// Type of the unexpected packet
        packet: PacketType,
    },

    /// Transport open or namespace handshake took too long
    #[error("connect timeout after {elapsed:?}")]
    ConnectTimeout {
        /// How long we waited
        elapsed: Duration,
    },

    /// Server stopped sending heartbeats
    #[error("ping timeout after {elapsed:?}")]
    PingTimeout {
        /// Time since the last ping
        elapsed: Duration,
    },

    /// Server refused the namespace connect
    #[error("connect refused: {0}")]
    Refused(String),

    /// Reconnection attempts used up
    #[error("gave up after {attempts} reconnection attempts")]
    Exhausted {
        /// Number of attempts made
        attempts: u32,
    },

    /// Protocol error from packet parsing/validation
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Underlying transport error
    #[error("transport error: {0}")]
    Transport(String),
}

impl ConnectionError {
    /// Returns true if this error is transient and may succeed on retry.
    ///
    /// Transient errors feed the reconnection policy. Protocol violations and
    /// exhaustion are never transient.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::ConnectTimeout { .. }
                | Self::PingTimeout { .. }
                | Self::Refused(_)
                | Self::Transport(_)
        )
    }
}

impl From<ProtocolError> for ConnectionError {
    fn from(err: ProtocolError) -> Self {
        Self::Protocol(err.to_string())
    }
}

impl From<io::Error> for ConnectionError {
    fn from(err: io::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

/// Errors from an [`IdentityStore`](crate::identity::IdentityStore).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Backing storage cannot be read or written
    #[error("identity store not available: {0}")]
    NotAvailable(String),

    /// Refused to persist a blank username
    #[error("refusing to persist an empty username")]
    EmptyUsername,
}

impl From<io::Error> for StoreError {
    fn from(err: io::Error) -> Self {
        Self::NotAvailable(err.to_string())
    }
}

/// Local rejection of a user command. Nothing was sent.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// Username is empty after trimming
    #[error("username must not be empty")]
    EmptyUsername {
        /// Raw input, handed back to the caller
        input: String,
    },

    /// Message text is empty after trimming
    #[error("message must not be empty")]
    EmptyMessage {
        /// Raw input, handed back to the caller
        input: String,
    },

    /// Sending requires a joined session
    #[error("join the chat before sending messages")]
    NotJoined {
        /// Raw input, handed back to the caller
        input: String,
    },
}

impl CommandError {
    /// Whether this is an input validation failure.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::EmptyUsername { .. } | Self::EmptyMessage { .. })
    }

    /// Give the rejected input back.
    pub fn into_input(self) -> String {
        match self {
            Self::EmptyUsername { input } | Self::EmptyMessage { input } | Self::NotJoined { input } => {
                input
            },
        }
    }
}

/// Transport name that is neither `websocket` nor `polling`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown transport kind {0:?} (expected \"websocket\" or \"polling\")")]
pub struct UnknownTransport(pub String);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeouts_and_transport_failures_are_transient() {
        assert!(ConnectionError::ConnectTimeout { elapsed: Duration::from_secs(21) }.is_transient());
        assert!(ConnectionError::PingTimeout { elapsed: Duration::from_secs(46) }.is_transient());
        assert!(ConnectionError::Transport("reset".into()).is_transient());
        assert!(ConnectionError::Refused("busy".into()).is_transient());
    }

    #[test]
    fn protocol_violations_and_exhaustion_are_fatal() {
        assert!(!ConnectionError::Protocol("bad".into()).is_transient());
        assert!(!ConnectionError::Exhausted { attempts: 5 }.is_transient());
        assert!(!ConnectionError::NoTransports.is_transient());
        assert!(
            !ConnectionError::UnexpectedPacket {
                state: ConnectionState::Connecting,
                packet: PacketType::Upgrade,
            }
            .is_transient()
        );
    }

    #[test]
    fn command_errors_return_input() {
        let err = CommandError::EmptyMessage { input: "   ".into() };
        assert!(err.is_validation());
        assert_eq!(err.into_input(), "   ");

        let err = CommandError::NotJoined { input: "hi".into() };
        assert!(!err.is_validation());
    }

    #[test]
    fn io_errors_become_unavailable_store() {
        let err: StoreError = io::Error::new(io::ErrorKind::PermissionDenied, "denied").into();
        assert!(matches!(err, StoreError::NotAvailable(_)));
    }
}
