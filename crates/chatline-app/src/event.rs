//! Application input events.
//!
//! This module defines [`AppEvent`], the inputs that drive the [`crate::App`]
//! state machine.
//!
//! Events originate from two distinct sources:
//! - User intents and system ticks.
//! - Connection notifications translated by the [`crate::Bridge`].

use chatline_core::ConnectionState;
use serde_json::Value;

use crate::UserIntent;

/// Events processed by the App state machine.
#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    /// User intent from the presentation layer.
    Intent(UserIntent),

    /// Periodic tick.
    Tick,

    /// Connection state changed.
    ConnectionChanged(ConnectionState),

    /// Server event on the chat namespace.
    Server {
        /// Event name.
        name: String,
        /// Event arguments.
        args: Vec<Value>,
    },

    /// Error occurred.
    Error {
        /// Error description.
        message: String,
    },
}
