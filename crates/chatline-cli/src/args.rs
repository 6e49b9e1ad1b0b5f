//! Command-line arguments.
//!
//! Every flag can also come from a `CHATLINE_*` environment variable. Flags
//! win over the environment.

use std::{path::PathBuf, time::Duration};

use chatline_client::FileIdentityStore;
use chatline_core::{
    ConnectionConfig, TransportKind,
    connection::{
        DEFAULT_CONNECT_TIMEOUT, DEFAULT_RANDOMIZATION_FACTOR, DEFAULT_RECONNECTION_ATTEMPTS,
        DEFAULT_RECONNECTION_DELAY, DEFAULT_RECONNECTION_DELAY_MAX,
    },
};
use clap::Parser;
use url::Url;

use crate::CliError;

/// Chatline terminal client
#[derive(Parser, Debug, Clone)]
#[command(name = "chatline")]
#[command(about = "Line-oriented client for a Socket.IO chat server")]
#[command(version)]
pub struct Args {
    /// Chat server URL
    #[arg(short, long, env = "CHATLINE_ENDPOINT", default_value = "http://localhost:3000")]
    pub endpoint: Url,

    /// Transports to try, in order
    #[arg(
        long,
        env = "CHATLINE_TRANSPORTS",
        value_delimiter = ',',
        default_value = "websocket,polling"
    )]
    pub transports: Vec<TransportKind>,

    /// Reconnection attempts before giving up
    #[arg(long, env = "CHATLINE_RECONNECTION_ATTEMPTS", default_value_t = DEFAULT_RECONNECTION_ATTEMPTS)]
    pub reconnection_attempts: u32,

    /// First reconnection delay in milliseconds
    #[arg(long, env = "CHATLINE_RECONNECTION_DELAY_MS", default_value_t = millis(DEFAULT_RECONNECTION_DELAY))]
    pub reconnection_delay_ms: u64,

    /// Upper bound on the reconnection delay in milliseconds
    #[arg(long, env = "CHATLINE_RECONNECTION_DELAY_MAX_MS", default_value_t = millis(DEFAULT_RECONNECTION_DELAY_MAX))]
    pub reconnection_delay_max_ms: u64,

    /// Jitter applied to reconnection delays, between 0 and 1
    #[arg(long, env = "CHATLINE_RANDOMIZATION_FACTOR", default_value_t = DEFAULT_RANDOMIZATION_FACTOR)]
    pub randomization_factor: f64,

    /// How long one connection attempt may take in milliseconds
    #[arg(long, env = "CHATLINE_CONNECT_TIMEOUT_MS", default_value_t = millis(DEFAULT_CONNECT_TIMEOUT))]
    pub connect_timeout_ms: u64,

    /// File holding the persisted username
    ///
    /// Defaults to `<config dir>/chatline/username`.
    #[arg(long, env = "CHATLINE_IDENTITY_FILE")]
    pub identity_file: Option<PathBuf>,

    /// Timer resolution in milliseconds
    #[arg(long, default_value_t = 100)]
    pub tick_ms: u64,

    /// Log filter used when `RUST_LOG` is unset
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

const fn millis(duration: Duration) -> u64 {
    duration.as_millis() as u64
}

impl Args {
    /// Connection settings from the flags.
    ///
    /// Out-of-range jitter is clamped to `[0, 1]`.
    pub fn connection_config(&self) -> ConnectionConfig {
        ConnectionConfig {
            transports: self.transports.clone(),
            reconnection_attempts: self.reconnection_attempts,
            reconnection_delay: Duration::from_millis(self.reconnection_delay_ms),
            reconnection_delay_max: Duration::from_millis(self.reconnection_delay_max_ms),
            randomization_factor: self.randomization_factor.clamp(0.0, 1.0),
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
        }
    }

    /// Identity store at `--identity-file` or the platform default.
    pub fn identity_store(&self) -> Result<FileIdentityStore, CliError> {
        self.identity_file
            .clone()
            .or_else(FileIdentityStore::default_path)
            .map(FileIdentityStore::new)
            .ok_or(CliError::NoIdentityPath)
    }

    /// Interval between timer ticks. Never zero.
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_ms.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("chatline").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn defaults_match_connection_defaults() {
        let args = parse(&[]);
        let config = args.connection_config();
        let defaults = ConnectionConfig::default();

        assert_eq!(args.endpoint.as_str(), "http://localhost:3000/");
        assert_eq!(config.transports, defaults.transports);
        assert_eq!(config.reconnection_attempts, defaults.reconnection_attempts);
        assert_eq!(config.reconnection_delay, defaults.reconnection_delay);
        assert_eq!(config.reconnection_delay_max, defaults.reconnection_delay_max);
        assert_eq!(config.connect_timeout, defaults.connect_timeout);
    }

    #[test]
    fn transports_are_comma_separated() {
        let args = parse(&["--transports", "polling,ws"]);
        assert_eq!(args.transports, vec![TransportKind::Polling, TransportKind::WebSocket]);
    }

    #[test]
    fn unknown_transport_is_rejected() {
        let result = Args::try_parse_from(["chatline", "--transports", "carrier-pigeon"]);
        assert!(result.is_err());
    }

    #[test]
    fn jitter_is_clamped() {
        let args = parse(&["--randomization-factor", "3.5"]);
        assert!((args.connection_config().randomization_factor - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn explicit_identity_file_wins() {
        let args = parse(&["--identity-file", "/tmp/chatline-test/name"]);
        let store = args.identity_store().unwrap();
        assert_eq!(store.path(), std::path::Path::new("/tmp/chatline-test/name"));
    }

    #[test]
    fn zero_tick_is_bumped() {
        assert_eq!(parse(&["--tick-ms", "0"]).tick_interval(), Duration::from_millis(1));
    }
}
