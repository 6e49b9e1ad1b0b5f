//! Protocol error types.

use thiserror::Error;

/// Result alias for wire-level operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors produced while encoding or decoding wire packets.
///
/// None of these are fatal to a session: a malformed packet is dropped and the
/// connection keeps running.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Packet text was empty
    #[error("empty packet")]
    EmptyPacket,

    /// Leading type character is not a known packet type
    #[error("unknown packet type {0:?}")]
    UnknownPacketType(char),

    /// Binary attachments are not supported by this client
    #[error("binary packets are not supported")]
    UnsupportedBinary,

    /// Engine.IO open packet did not carry a usable handshake
    #[error("invalid handshake: {0}")]
    InvalidHandshake(String),

    /// Packet data was not valid JSON
    #[error("invalid json: {0}")]
    Json(String),

    /// Socket.IO packet structure is wrong (missing event name, bad ack id)
    #[error("malformed packet: {0}")]
    Malformed(String),

    /// Event arguments do not match the expected payload shape
    #[error("invalid payload for {event}: {reason}")]
    InvalidPayload {
        /// Event name the payload belonged to
        event: String,
        /// What was wrong with it
        reason: String,
    },
}

impl From<serde_json::Error> for ProtocolError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err.to_string())
    }
}
