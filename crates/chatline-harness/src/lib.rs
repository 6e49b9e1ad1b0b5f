//! Deterministic simulation harness for the Chatline session layer.
//!
//! Virtual-time implementations of the Environment and Driver traits plus an
//! in-process chat server, for reproducible testing of connection loss,
//! transport fallback, heartbeat expiry, and the chat session itself.
//!
//! # Scenarios
//!
//! The `scenario` module wraps the production [`chatline_app::Runtime`] in a
//! [`Simulation`] that can be scripted step by step from a test.
//!
//! # Invariant Testing
//!
//! The `invariants` module provides behavioral testing through invariant
//! checks. Invariants verify WHAT must be true across all execution paths, not
//! specific scenarios. Every [`Simulation`] step runs
//! [`InvariantRegistry::standard()`] unless told otherwise.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod invariants;
pub mod scenario;
pub mod sim_driver;
pub mod sim_env;
pub mod sim_server;

pub use invariants::{
    ClientSnapshot, ConnectedHasSocketId, ConnectionMirrored, EpochMonotonicity, Invariant,
    InvariantRegistry, InvariantResult, JoinedHasUsername, LogFollowsSession,
    PersistedIdentityAgrees, ReconnectionBounded, SingleTransport, SystemSnapshot,
    UsersFollowSnapshot, Violation,
};
pub use scenario::Simulation;
pub use sim_driver::{SharedSimServer, SimDriver, SimDriverError, create_shared_server};
pub use sim_env::{SimEnv, SimInstant};
pub use sim_server::{SessionId, SimServer};
