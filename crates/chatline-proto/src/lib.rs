//! Wire protocol for Chatline.
//!
//! The chat server speaks Socket.IO v5 over Engine.IO v4. This crate holds the
//! pure codecs for both layers plus the catalog of chat events and commands.
//! There is no I/O here: transports hand raw text to [`Packet::decode`] and
//! send whatever [`Packet::encode`] produces.
//!
//! # Layers
//!
//! - [`Packet`]: Engine.IO packet (handshake, heartbeat, message framing)
//! - [`SocketPacket`]: Socket.IO packet (namespace connect, named events)
//! - [`ServerEvent`] / [`ClientCommand`]: typed chat payloads

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod errors;
pub mod events;
pub mod packet;
pub mod socket;

pub use errors::ProtocolError;
pub use events::{ChatMessage, ClientCommand, SYSTEM_SENDER, ServerEvent, names};
pub use packet::{Handshake, Packet, PacketType, decode_payload, encode_payload};
pub use socket::{DEFAULT_NAMESPACE, SocketPacket};
