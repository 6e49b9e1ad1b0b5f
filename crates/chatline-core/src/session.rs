//! Aggregate observable session state.
//!
//! Readers are public so a presentation layer can render. Writers are
//! crate-private: the message log and user list change only through the
//! inbound handler, identity changes only through the command emitter, and
//! leave resets everything.

pub use chatline_proto::ChatMessage as Message;

use crate::connection::ConnectionState;

/// Identity, message log, user list, and last known connection state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    username: String,
    joined: bool,
    messages: Vec<Message>,
    users: Vec<String>,
    connection: ConnectionState,
}

impl SessionState {
    /// Fresh, unjoined session.
    pub fn new() -> Self {
        Self::default()
    }

    /// Committed username. Empty unless joined.
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Whether a username is committed.
    pub fn joined(&self) -> bool {
        self.joined
    }

    /// Message log in arrival order.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Users from the most recent snapshot.
    pub fn users(&self) -> &[String] {
        &self.users
    }

    /// Most recently observed connection state.
    pub fn connection(&self) -> ConnectionState {
        self.connection
    }

    /// Record a connection state change. Never touches identity or the log.
    pub fn observe_connection(&mut self, state: ConnectionState) {
        self.connection = state;
    }

    pub(crate) fn replace_messages(&mut self, messages: Vec<Message>) {
        self.messages = messages;
    }

    pub(crate) fn push_message(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub(crate) fn replace_users(&mut self, users: Vec<String>) {
        self.users = users;
    }

    pub(crate) fn commit_identity(&mut self, username: String) {
        self.username = username;
        self.joined = true;
    }

    /// Back to the unjoined state. The connection state survives.
    pub(crate) fn reset(&mut self) {
        let connection = self.connection;
        *self = Self { connection, ..Self::default() };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_keeps_connection_state() {
        let mut state = SessionState::new();
        state.observe_connection(ConnectionState::Connected);
        state.commit_identity("alice".into());
        state.push_message(Message::new("alice", "hi"));
        state.replace_users(vec!["alice".into()]);

        state.reset();

        assert!(!state.joined());
        assert_eq!(state.username(), "");
        assert!(state.messages().is_empty());
        assert!(state.users().is_empty());
        assert_eq!(state.connection(), ConnectionState::Connected);
    }

    #[test]
    fn connection_changes_leave_identity_alone() {
        let mut state = SessionState::new();
        state.commit_identity("bob".into());
        state.observe_connection(ConnectionState::DisconnectedPermanent);

        assert!(state.joined());
        assert_eq!(state.username(), "bob");
    }
}
