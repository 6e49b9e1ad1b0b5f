//! Observable state snapshots for invariant checking.
//!
//! Snapshots capture the observable state of the system at a point in time.
//! Invariants operate on snapshots rather than live state to ensure
//! consistent, atomic checks.

use chatline_app::{App, Bridge};
use chatline_core::{ConnectionState, Environment, IdentityStore, Message};

/// Snapshot of the entire system state.
///
/// Contains observable state from one or more clients for invariant checking.
#[derive(Debug, Clone, Default)]
pub struct SystemSnapshot {
    /// Per-client state snapshots.
    pub clients: Vec<ClientSnapshot>,
}

impl SystemSnapshot {
    /// Create an empty snapshot (no clients).
    pub fn empty() -> Self {
        Self::default()
    }

    /// Create a snapshot with a single client.
    pub fn single(client: ClientSnapshot) -> Self {
        Self { clients: vec![client] }
    }

    /// Create a snapshot from multiple clients.
    pub fn from_clients(clients: Vec<ClientSnapshot>) -> Self {
        Self { clients }
    }
}

/// Snapshot of a single client's observable state.
#[derive(Debug, Clone, Default)]
pub struct ClientSnapshot {
    /// Client identifier.
    pub id: u64,
    /// Committed username. Empty when not joined.
    pub username: String,
    /// Joined flag.
    pub joined: bool,
    /// Message log.
    pub messages: Vec<Message>,
    /// Log at the previous check, if the session was joined then.
    pub log_before: Option<Vec<Message>>,
    /// Whether a history snapshot replaced the log since the previous check.
    pub log_replaced: bool,
    /// Active user list.
    pub users: Vec<String>,
    /// User list the session should show given the events it was handed.
    /// `None` when nobody tracked them.
    pub expected_users: Option<Vec<String>>,
    /// Connection state as the session sees it.
    pub session_connection: ConnectionState,
    /// Connection state as the connection manager sees it.
    pub connection: ConnectionState,
    /// Whether the Socket.IO session id is known.
    pub has_socket_id: bool,
    /// Reconnection attempts made since the last success.
    pub attempts: u32,
    /// Configured attempt cap.
    pub attempt_cap: u32,
    /// Whether a reconnection is scheduled.
    pub retry_pending: bool,
    /// Persisted username. `None` when the store could not be read.
    pub persisted: Option<Option<String>>,
    /// Connection epoch after every step so far.
    pub epoch_history: Vec<u64>,
    /// Transports open on the server for this client.
    pub open_transports: usize,
}

impl ClientSnapshot {
    /// Capture the observable state of `app` and `bridge`.
    pub fn capture<S: IdentityStore, E: Environment>(
        id: u64,
        app: &App<S>,
        bridge: &Bridge<E>,
    ) -> Self {
        let connection = bridge.connection();
        Self {
            id,
            username: app.username().to_string(),
            joined: app.joined(),
            messages: app.messages().to_vec(),
            log_before: None,
            log_replaced: false,
            users: app.users().to_vec(),
            expected_users: None,
            session_connection: app.connection_state(),
            connection: connection.state(),
            has_socket_id: connection.session_id().is_some(),
            attempts: connection.attempts(),
            attempt_cap: connection.config().reconnection_attempts,
            retry_pending: connection.retry_pending(),
            persisted: app.store().read().ok(),
            epoch_history: vec![app.epoch()],
            open_transports: 0,
        }
    }

    /// Replace the epoch history.
    #[must_use]
    pub fn with_epoch_history(mut self, history: Vec<u64>) -> Self {
        self.epoch_history = history;
        self
    }

    /// Record the log seen at the previous check and whether a history
    /// snapshot arrived since.
    #[must_use]
    pub fn with_log_before(mut self, log: Option<Vec<Message>>, replaced: bool) -> Self {
        self.log_before = log;
        self.log_replaced = replaced;
        self
    }

    /// Record the user list the session should show.
    #[must_use]
    pub fn with_expected_users(mut self, users: Vec<String>) -> Self {
        self.expected_users = Some(users);
        self
    }

    /// Record how many transports the server holds open.
    #[must_use]
    pub fn with_open_transports(mut self, open: usize) -> Self {
        self.open_transports = open;
        self
    }
}
