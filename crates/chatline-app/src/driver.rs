//! Driver trait for abstracting I/O operations.
//!
//! The [`Driver`] trait decouples the application runtime from specific I/O
//! implementations. Each frontend implements the trait to provide
//! platform-specific I/O, while the generic [`crate::Runtime`] handles all
//! orchestration.

use std::{future::Future, ops::Sub, time::Duration};

use chatline_core::{IdentityStore, TransportKind};
use chatline_proto::Packet;

use crate::{App, UserIntent};

/// What happened on the transport.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// A packet arrived from the server
    Packet(Packet),
    /// The requested transport could not be opened
    Failed {
        /// Failure description
        reason: String,
    },
    /// The open transport closed
    Closed {
        /// Close description
        reason: String,
    },
}

/// One input for the runtime loop.
#[derive(Debug, Clone, PartialEq)]
pub enum DriverInput {
    /// User intent from the presentation layer
    Intent(UserIntent),
    /// Transport activity
    Transport(TransportEvent),
    /// Periodic tick for timers
    Tick,
}

/// Abstracts I/O operations for the application runtime.
///
/// Implementations provide platform-specific I/O while the generic
/// [`Runtime`](crate::Runtime) handles orchestration logic. This ensures
/// the same orchestration code runs in production and simulation.
///
/// Transport failures are never driver errors: they come back through
/// [`next_input`](Driver::next_input) as [`TransportEvent`]s so the connection
/// state machine can react. Driver errors end the runtime.
///
/// # Implementations
///
/// - **CLI**: stdin lines for intents, tokio-tungstenite / reqwest transports
/// - **Simulation**: scripted intents against an in-process chat server
///
/// # Associated Types
///
/// - [`Error`](Driver::Error): Platform-specific error type
/// - [`Instant`](Driver::Instant): Time representation (real or virtual)
pub trait Driver: Send {
    /// Platform-specific error type.
    type Error: std::error::Error + Send + 'static;

    /// Time instant type. Enables virtual time in simulation.
    type Instant: Copy + Ord + Send + Sync + Sub<Output = Duration>;

    /// Wait for the next input.
    ///
    /// Returns `None` when the input side is exhausted and the runtime should
    /// shut down.
    fn next_input(&mut self) -> impl Future<Output = Result<Option<DriverInput>, Self::Error>> + Send;

    /// Start opening a transport of `kind` to the configured endpoint.
    ///
    /// The outcome arrives later as an Engine.IO open packet or
    /// [`TransportEvent::Failed`].
    ///
    /// # Errors
    ///
    /// Returns an error only for local failures unrelated to the network.
    fn open_transport(
        &mut self,
        kind: TransportKind,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Send a packet over the open transport.
    ///
    /// # Errors
    ///
    /// Returns an error only for local failures unrelated to the network.
    fn send_packet(&mut self, packet: Packet) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Close the open transport. No-op when none is open.
    fn close_transport(&mut self, reason: &str);

    /// Current time instant.
    fn now(&self) -> Self::Instant;

    /// Render the application state.
    ///
    /// # Errors
    ///
    /// Returns an error if rendering fails.
    fn render<S: IdentityStore>(&mut self, app: &App<S>) -> Result<(), Self::Error>;

    /// Stop the transport and clean up resources.
    fn stop(&mut self);
}
