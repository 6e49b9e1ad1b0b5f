//! CLI errors.

use std::io;

use thiserror::Error;

/// Errors that end the CLI.
#[derive(Debug, Error)]
pub enum CliError {
    /// Terminal I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// No `--identity-file` and the platform has no config directory.
    #[error("no config directory found, pass --identity-file")]
    NoIdentityPath,
}
