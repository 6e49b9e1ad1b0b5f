//! Socket.IO v5 packets.
//!
//! Socket.IO packets ride inside Engine.IO message packets. The text layout is
//!
//! ```text
//! <type>[<namespace>,][<ack id>][<json>]
//! ```
//!
//! where the namespace is omitted for the default `/` namespace. A chat event
//! therefore looks like `2["new-message",{"sender":"a","text":"hi"}]` and
//! travels as the Engine.IO packet `42[...]`.

use serde_json::{Value, json};

use crate::{
    Packet,
    errors::{ProtocolError, Result},
};

/// The namespace every chat event uses.
pub const DEFAULT_NAMESPACE: &str = "/";

/// A single Socket.IO packet.
#[derive(Debug, Clone, PartialEq)]
pub enum SocketPacket {
    /// Namespace connect request (client) or acknowledgement (server)
    Connect {
        /// Target namespace
        namespace: String,
        /// Optional auth data (client) or `{"sid": ..}` (server)
        data: Option<Value>,
    },
    /// Namespace disconnect
    Disconnect {
        /// Target namespace
        namespace: String,
    },
    /// Named event with JSON arguments
    Event {
        /// Target namespace
        namespace: String,
        /// Acknowledgement id. `None` when no ack is requested.
        id: Option<u64>,
        /// Event name
        name: String,
        /// Event arguments in order
        args: Vec<Value>,
    },
    /// Acknowledgement of an earlier event
    Ack {
        /// Target namespace
        namespace: String,
        /// Id of the acknowledged event
        id: u64,
        /// Acknowledgement arguments
        args: Vec<Value>,
    },
    /// Server refused the namespace connect
    ConnectError {
        /// Target namespace
        namespace: String,
        /// Human-readable reason
        message: String,
    },
}

impl SocketPacket {
    /// Connect request for the default namespace.
    pub fn connect() -> Self {
        Self::Connect { namespace: DEFAULT_NAMESPACE.to_string(), data: None }
    }

    /// Disconnect from the default namespace.
    pub fn disconnect() -> Self {
        Self::Disconnect { namespace: DEFAULT_NAMESPACE.to_string() }
    }

    /// Event on the default namespace without an ack id.
    pub fn event(name: impl Into<String>, args: Vec<Value>) -> Self {
        Self::Event { namespace: DEFAULT_NAMESPACE.to_string(), id: None, name: name.into(), args }
    }

    /// Namespace this packet targets.
    pub fn namespace(&self) -> &str {
        match self {
            Self::Connect { namespace, .. }
            | Self::Disconnect { namespace }
            | Self::Event { namespace, .. }
            | Self::Ack { namespace, .. }
            | Self::ConnectError { namespace, .. } => namespace,
        }
    }

    /// Session id carried by a server connect acknowledgement.
    pub fn connect_sid(&self) -> Option<&str> {
        match self {
            Self::Connect { data: Some(data), .. } => data.get("sid").and_then(Value::as_str),
            _ => None,
        }
    }

    fn tag(&self) -> char {
        match self {
            Self::Connect { .. } => '0',
            Self::Disconnect { .. } => '1',
            Self::Event { .. } => '2',
            Self::Ack { .. } => '3',
            Self::ConnectError { .. } => '4',
        }
    }

    /// Encode to Socket.IO text.
    pub fn encode(&self) -> Result<String> {
        let mut out = String::new();
        out.push(self.tag());

        let namespace = self.namespace();
        if namespace != DEFAULT_NAMESPACE {
            out.push_str(namespace);
            out.push(',');
        }

        match self {
            Self::Connect { data, .. } => {
                if let Some(data) = data {
                    out.push_str(&serde_json::to_string(data)?);
                }
            },
            Self::Disconnect { .. } => {},
            Self::Event { id, name, args, .. } => {
                if let Some(id) = id {
                    out.push_str(&id.to_string());
                }
                let mut items = Vec::with_capacity(args.len() + 1);
                items.push(Value::String(name.clone()));
                items.extend(args.iter().cloned());
                out.push_str(&serde_json::to_string(&Value::Array(items))?);
            },
            Self::Ack { id, args, .. } => {
                out.push_str(&id.to_string());
                out.push_str(&serde_json::to_string(args)?);
            },
            Self::ConnectError { message, .. } => {
                out.push_str(&serde_json::to_string(&json!({ "message": message }))?);
            },
        }

        Ok(out)
    }

    /// Decode Socket.IO text.
    pub fn decode(text: &str) -> Result<Self> {
        let mut chars = text.chars();
        let Some(tag) = chars.next() else {
            return Err(ProtocolError::EmptyPacket);
        };
        match tag {
            '0'..='4' => {},
            '5' | '6' => return Err(ProtocolError::UnsupportedBinary),
            other => return Err(ProtocolError::UnknownPacketType(other)),
        }

        let mut rest = chars.as_str();

        let namespace = if rest.starts_with('/') {
            match rest.find(',') {
                Some(end) => {
                    let namespace = rest[..end].to_string();
                    rest = &rest[end + 1..];
                    namespace
                },
                None => {
                    let namespace = rest.to_string();
                    rest = "";
                    namespace
                },
            }
        } else {
            DEFAULT_NAMESPACE.to_string()
        };

        let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
        let id = if digits > 0 {
            let id = rest[..digits]
                .parse::<u64>()
                .map_err(|e| ProtocolError::Malformed(format!("ack id: {e}")))?;
            Some(id)
        } else {
            None
        };
        rest = &rest[digits..];

        let data: Option<Value> =
            if rest.is_empty() { None } else { Some(serde_json::from_str(rest)?) };

        let packet = match tag {
            '0' => Self::Connect { namespace, data },
            '1' => Self::Disconnect { namespace },
            '2' => {
                let Some(Value::Array(mut items)) = data else {
                    return Err(ProtocolError::Malformed("event data must be an array".into()));
                };
                if items.is_empty() {
                    return Err(ProtocolError::Malformed("event without a name".into()));
                }
                let Value::String(name) = items.remove(0) else {
                    return Err(ProtocolError::Malformed("event name must be a string".into()));
                };
                Self::Event { namespace, id, name, args: items }
            },
            '3' => {
                let Some(id) = id else {
                    return Err(ProtocolError::Malformed("ack without id".into()));
                };
                let args = match data {
                    Some(Value::Array(items)) => items,
                    None => Vec::new(),
                    Some(_) => {
                        return Err(ProtocolError::Malformed("ack data must be an array".into()));
                    },
                };
                Self::Ack { namespace, id, args }
            },
            _ => {
                let message = match data {
                    Some(Value::Object(map)) => {
                        map.get("message").and_then(Value::as_str).unwrap_or_default().to_string()
                    },
                    Some(Value::String(message)) => message,
                    _ => String::new(),
                };
                Self::ConnectError { namespace, message }
            },
        };

        Ok(packet)
    }

    /// Wrap into an Engine.IO message packet.
    pub fn into_packet(self) -> Result<Packet> {
        Ok(Packet::Message(self.encode()?))
    }

    /// Unwrap from an Engine.IO message packet. `None` for any other packet
    /// type.
    pub fn from_packet(packet: &Packet) -> Option<Result<Self>> {
        match packet {
            Packet::Message(data) => Some(Self::decode(data)),
            _ => None,
        }
    }
}
