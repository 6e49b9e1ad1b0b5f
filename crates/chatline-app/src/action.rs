//! Application side-effects and intents.
//!
//! This module defines the [`AppAction`] enum, which represents instructions
//! produced by the [`crate::App`] state machine for the runtime to execute.

use chatline_proto::ClientCommand;

/// Actions produced by the App state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppAction {
    /// Render the session.
    Render,

    /// Quit the application.
    Quit,

    /// Start connecting (no-op while connected or trying).
    Connect,

    /// Close the connection and cancel retries.
    Disconnect,

    /// Send a command to the server.
    Emit(ClientCommand),
}
