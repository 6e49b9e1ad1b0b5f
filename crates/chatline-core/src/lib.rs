//! Sans-IO session core for the Chatline client.
//!
//! Everything here is a pure state machine. Time comes in as a parameter,
//! effects go out as return values, and storage sits behind a trait. The
//! runtime in `chatline-app` serializes all inputs through these types on a
//! single loop.
//!
//! # Components
//!
//! - [`Connection`]: transport lifecycle, handshake, heartbeat, reconnection
//! - [`InboundHandler`]: server event name to session transition table
//! - [`CommandEmitter`]: validated client commands plus identity persistence
//! - [`SessionState`]: observable identity, message log, and user list
//! - [`IdentityStore`]: single-key username storage
//! - [`Environment`]: clock and entropy abstraction

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod backoff;
pub mod connection;
pub mod env;
pub mod error;
pub mod identity;
pub mod inbound;
pub mod outbound;
pub mod session;

pub use backoff::Backoff;
pub use connection::{
    Connection, ConnectionAction, ConnectionConfig, ConnectionState, TransportKind,
};
pub use env::Environment;
pub use error::{CommandError, ConnectionError, StoreError, UnknownTransport};
pub use identity::{IdentityStore, MemoryIdentityStore};
pub use inbound::{InboundHandler, InboundOutcome};
pub use outbound::CommandEmitter;
pub use session::{Message, SessionState};
