//! Production glue for the Chatline client.
//!
//! The session core is sans-IO. This crate supplies the real resources it is
//! driven with:
//!
//! - [`transport`]: Engine.IO over WebSocket (tokio-tungstenite) and HTTP
//!   long-polling (reqwest), exposed as packet channels
//! - [`SystemEnv`]: wall-clock time, tokio sleep, OS randomness
//! - [`FileIdentityStore`]: username persisted as a single plain-text file

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod store;
pub mod system_env;
pub mod transport;

pub use store::FileIdentityStore;
pub use system_env::SystemEnv;
pub use transport::{ConnectedTransport, Inbound, TransportError, connect, engine_url};
