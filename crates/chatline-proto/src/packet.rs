//! Engine.IO v4 packets.
//!
//! Engine.IO is the transport layer under Socket.IO. Every packet is a single
//! type character followed by optional text data:
//!
//! ```text
//! 0{"sid":"..","upgrades":[],"pingInterval":25000,"pingTimeout":20000}   open
//! 1                                                                      close
//! 2                                                                      ping
//! 3                                                                      pong
//! 4<socket.io packet>                                                    message
//! 5                                                                      upgrade
//! 6                                                                      noop
//! ```
//!
//! Over WebSocket each frame carries one packet. Over HTTP long-polling a
//! payload carries several packets joined by [`RECORD_SEPARATOR`].

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::{ProtocolError, Result};

/// Engine.IO protocol revision spoken by this client (`EIO=4`).
pub const PROTOCOL_VERSION: u8 = 4;

/// Separator between packets in a long-polling payload.
pub const RECORD_SEPARATOR: char = '\u{1e}';

/// Server default for `maxPayload` when the handshake omits it.
pub const DEFAULT_MAX_PAYLOAD: u64 = 1_000_000;

/// Engine.IO packet type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PacketType {
    /// Handshake from the server
    Open,
    /// Transport close request
    Close,
    /// Heartbeat probe
    Ping,
    /// Heartbeat answer
    Pong,
    /// Carries a Socket.IO packet
    Message,
    /// Transport upgrade confirmation
    Upgrade,
    /// Filler used to unblock a pending poll
    Noop,
}

impl PacketType {
    /// Wire character for this type.
    pub fn as_char(self) -> char {
        match self {
            Self::Open => '0',
            Self::Close => '1',
            Self::Ping => '2',
            Self::Pong => '3',
            Self::Message => '4',
            Self::Upgrade => '5',
            Self::Noop => '6',
        }
    }

    /// Parse a wire character. `None` for anything outside `0..=6`.
    pub fn from_char(c: char) -> Option<Self> {
        match c {
            '0' => Some(Self::Open),
            '1' => Some(Self::Close),
            '2' => Some(Self::Ping),
            '3' => Some(Self::Pong),
            '4' => Some(Self::Message),
            '5' => Some(Self::Upgrade),
            '6' => Some(Self::Noop),
            _ => None,
        }
    }
}

/// Handshake data carried by the server's open packet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Handshake {
    /// Engine.IO session id
    pub sid: String,
    /// Transports the server would upgrade to
    #[serde(default)]
    pub upgrades: Vec<String>,
    /// Milliseconds between server pings
    pub ping_interval: u64,
    /// Milliseconds the server waits for a pong
    pub ping_timeout: u64,
    /// Largest payload the server accepts, in bytes
    #[serde(default = "default_max_payload")]
    pub max_payload: u64,
}

fn default_max_payload() -> u64 {
    DEFAULT_MAX_PAYLOAD
}

impl Handshake {
    /// Interval between server pings.
    pub fn ping_interval(&self) -> Duration {
        Duration::from_millis(self.ping_interval)
    }

    /// Grace period the server allows for a pong.
    pub fn ping_timeout(&self) -> Duration {
        Duration::from_millis(self.ping_timeout)
    }

    /// Longest silence tolerated before the link is considered dead.
    pub fn heartbeat_deadline(&self) -> Duration {
        self.ping_interval() + self.ping_timeout()
    }
}

/// A single Engine.IO packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet {
    /// Server handshake
    Open(Handshake),
    /// Close the transport
    Close,
    /// Heartbeat probe (server to client in v4)
    Ping,
    /// Heartbeat answer
    Pong,
    /// Encoded Socket.IO packet
    Message(String),
    /// Upgrade confirmation
    Upgrade,
    /// No operation
    Noop,
}

impl Packet {
    /// Type tag of this packet.
    pub fn packet_type(&self) -> PacketType {
        match self {
            Self::Open(_) => PacketType::Open,
            Self::Close => PacketType::Close,
            Self::Ping => PacketType::Ping,
            Self::Pong => PacketType::Pong,
            Self::Message(_) => PacketType::Message,
            Self::Upgrade => PacketType::Upgrade,
            Self::Noop => PacketType::Noop,
        }
    }

    /// Encode to wire text.
    pub fn encode(&self) -> Result<String> {
        let mut out = String::new();
        out.push(self.packet_type().as_char());
        match self {
            Self::Open(handshake) => out.push_str(&serde_json::to_string(handshake)?),
            Self::Message(data) => out.push_str(data),
            Self::Close | Self::Ping | Self::Pong | Self::Upgrade | Self::Noop => {},
        }
        Ok(out)
    }

    /// Decode one packet from wire text.
    ///
    /// Trailing data on ping/pong (the `probe` used by transport upgrades) is
    /// accepted and discarded.
    pub fn decode(text: &str) -> Result<Self> {
        let mut chars = text.chars();
        let Some(tag) = chars.next() else {
            return Err(ProtocolError::EmptyPacket);
        };
        let data = chars.as_str();

        if tag == 'b' {
            return Err(ProtocolError::UnsupportedBinary);
        }

        let packet_type = PacketType::from_char(tag).ok_or(ProtocolError::UnknownPacketType(tag))?;

        let packet = match packet_type {
            PacketType::Open => {
                let handshake: Handshake = serde_json::from_str(data)
                    .map_err(|e| ProtocolError::InvalidHandshake(e.to_string()))?;
                if handshake.sid.is_empty() {
                    return Err(ProtocolError::InvalidHandshake("empty sid".to_string()));
                }
                Self::Open(handshake)
            },
            PacketType::Close => Self::Close,
            PacketType::Ping => Self::Ping,
            PacketType::Pong => Self::Pong,
            PacketType::Message => Self::Message(data.to_string()),
            PacketType::Upgrade => Self::Upgrade,
            PacketType::Noop => Self::Noop,
        };

        Ok(packet)
    }
}

/// Encode several packets into one long-polling payload.
pub fn encode_payload(packets: &[Packet]) -> Result<String> {
    let mut out = String::new();
    for (i, packet) in packets.iter().enumerate() {
        if i > 0 {
            out.push(RECORD_SEPARATOR);
        }
        out.push_str(&packet.encode()?);
    }
    Ok(out)
}

/// Decode a long-polling payload into its packets.
///
/// An empty body yields no packets.
pub fn decode_payload(body: &str) -> Result<Vec<Packet>> {
    if body.is_empty() {
        return Ok(Vec::new());
    }
    body.split(RECORD_SEPARATOR).map(Packet::decode).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handshake() -> Handshake {
        Handshake {
            sid: "lv_VI97HAXpY6yYWAAAC".to_string(),
            upgrades: vec!["websocket".to_string()],
            ping_interval: 25_000,
            ping_timeout: 20_000,
            max_payload: 1_000_000,
        }
    }

    #[test]
    fn decodes_server_open_packet() {
        let text = r#"0{"sid":"lv_VI97HAXpY6yYWAAAC","upgrades":["websocket"],"pingInterval":25000,"pingTimeout":20000,"maxPayload":1000000}"#;

        let packet = Packet::decode(text).unwrap();
        assert_eq!(packet, Packet::Open(handshake()));
    }

    #[test]
    fn open_without_max_payload_uses_default() {
        let packet =
            Packet::decode(r#"0{"sid":"abc","pingInterval":300,"pingTimeout":200}"#).unwrap();

        match packet {
            Packet::Open(hs) => {
                assert_eq!(hs.max_payload, DEFAULT_MAX_PAYLOAD);
                assert!(hs.upgrades.is_empty());
                assert_eq!(hs.heartbeat_deadline(), Duration::from_millis(500));
            },
            other => panic!("expected open packet, got {other:?}"),
        }
    }

    #[test]
    fn rejects_open_with_empty_sid() {
        let result = Packet::decode(r#"0{"sid":"","pingInterval":1,"pingTimeout":1}"#);
        assert!(matches!(result, Err(ProtocolError::InvalidHandshake(_))));
    }

    #[test]
    fn heartbeat_packets_ignore_probe_data() {
        assert_eq!(Packet::decode("2probe").unwrap(), Packet::Ping);
        assert_eq!(Packet::decode("3").unwrap(), Packet::Pong);
    }

    #[test]
    fn message_keeps_raw_socket_data() {
        let packet = Packet::decode(r#"42["new-message",{"sender":"a","text":"hi"}]"#).unwrap();
        assert_eq!(
            packet,
            Packet::Message(r#"2["new-message",{"sender":"a","text":"hi"}]"#.to_string())
        );
        assert_eq!(
            packet.encode().unwrap(),
            r#"42["new-message",{"sender":"a","text":"hi"}]"#
        );
    }

    #[test]
    fn rejects_empty_unknown_and_binary() {
        assert_eq!(Packet::decode(""), Err(ProtocolError::EmptyPacket));
        assert_eq!(Packet::decode("9"), Err(ProtocolError::UnknownPacketType('9')));
        assert_eq!(Packet::decode("bAQID"), Err(ProtocolError::UnsupportedBinary));
    }

    #[test]
    fn payload_splits_on_record_separator() {
        let body = "2\u{1e}40{\"sid\":\"x\"}\u{1e}6";
        let packets = decode_payload(body).unwrap();

        assert_eq!(packets, vec![
            Packet::Ping,
            Packet::Message("0{\"sid\":\"x\"}".to_string()),
            Packet::Noop,
        ]);
        assert_eq!(encode_payload(&packets).unwrap(), body);
    }

    #[test]
    fn empty_payload_has_no_packets() {
        assert!(decode_payload("").unwrap().is_empty());
    }

    #[test]
    fn payload_fails_on_any_bad_packet() {
        assert!(decode_payload("2\u{1e}\u{1e}3").is_err());
    }
}
