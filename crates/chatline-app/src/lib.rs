//! Application layer for Chatline
//!
//! Pure state machines and generic runtime for session orchestration, enabling
//! deterministic simulation testing with the same code that runs in
//! production.
//!
//! # Components
//!
//! - [`App`]: Session state machine (intents, server events, status)
//! - [`Bridge`]: Connection bridge (translates App actions to transport ops)
//! - [`Driver`]: Trait for platform-specific I/O abstraction
//! - [`Runtime`]: Generic orchestration loop using Driver

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod action;
mod app;
mod bridge;
mod driver;
mod event;
mod intent;
mod runtime;

pub use action::AppAction;
pub use app::App;
pub use bridge::{Bridge, TransportOp};
pub use driver::{Driver, DriverInput, TransportEvent};
pub use event::AppEvent;
pub use intent::UserIntent;
pub use runtime::Runtime;
