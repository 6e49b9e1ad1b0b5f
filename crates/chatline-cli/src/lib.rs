//! Terminal client for Chatline
//!
//! A thin shell over [`chatline_app::Driver`] that reads commands from stdin
//! and prints the session as plain lines. All orchestration logic lives in the
//! generic [`chatline_app::Runtime`].

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod args;
pub mod driver;
pub mod error;
pub mod input;
pub mod render;

pub use args::Args;
pub use chatline_app::{App, Driver, Runtime, UserIntent};
pub use driver::StdioDriver;
pub use error::CliError;
pub use input::{LineInput, parse_line};
pub use render::Renderer;
