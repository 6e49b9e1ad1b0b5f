//! Outbound command emitter.
//!
//! Validates user input, keeps the identity store and session identity in
//! step, and produces the [`ClientCommand`] to send. It never touches the
//! message log: a sent message shows up only when the server echoes it.
//!
//! Commands are produced regardless of connection state. Delivery is the
//! bridge's concern.

use chatline_proto::{ChatMessage, ClientCommand};

use crate::{
    error::CommandError,
    identity::IdentityStore,
    session::SessionState,
};

/// Produces client commands and owns the identity store.
#[derive(Debug, Clone)]
pub struct CommandEmitter<S> {
    store: S,
    /// Connection epoch that already got its restore
    restored_epoch: Option<u64>,
}

impl<S: IdentityStore> CommandEmitter<S> {
    /// Create an emitter over `store`.
    pub fn new(store: S) -> Self {
        Self { store, restored_epoch: None }
    }

    /// Backing identity store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Commit the persisted username, if any, as the session identity.
    ///
    /// An unavailable store counts as "no prior session".
    pub fn load_identity(&self, state: &mut SessionState) -> Option<String> {
        let username = match self.store.read() {
            Ok(Some(username)) => username.trim().to_string(),
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!(error = %e, "identity store unavailable, starting without identity");
                return None;
            },
        };
        if username.is_empty() {
            return None;
        }

        tracing::info!(%username, "restored persisted identity");
        state.commit_identity(username.clone());
        Some(username)
    }

    /// `restore-session` for a newly established connection.
    ///
    /// At most one per connection epoch, and only while joined.
    pub fn restore_session(&mut self, state: &SessionState, epoch: u64) -> Option<ClientCommand> {
        if !state.joined() || self.restored_epoch == Some(epoch) {
            return None;
        }
        self.restored_epoch = Some(epoch);
        Some(ClientCommand::RestoreSession { username: state.username().to_string() })
    }

    /// Join with `raw` (trimmed).
    ///
    /// A failed store write is logged and does not fail the join.
    ///
    /// # Errors
    ///
    /// - `CommandError::EmptyUsername` if `raw` is blank. Nothing is persisted
    ///   or sent.
    pub fn join(&mut self, state: &mut SessionState, raw: &str) -> Result<ClientCommand, CommandError> {
        let username = raw.trim();
        if username.is_empty() {
            return Err(CommandError::EmptyUsername { input: raw.to_string() });
        }

        if let Err(e) = self.store.write(username) {
            tracing::warn!(error = %e, "failed to persist username");
        }
        state.commit_identity(username.to_string());

        Ok(ClientCommand::Join { username: username.to_string() })
    }

    /// Post `raw` (trimmed) as the committed user.
    ///
    /// # Errors
    ///
    /// - `CommandError::EmptyMessage` if `raw` is blank
    /// - `CommandError::NotJoined` if no username is committed
    pub fn send_message(&self, state: &SessionState, raw: &str) -> Result<ClientCommand, CommandError> {
        let text = raw.trim();
        if text.is_empty() {
            return Err(CommandError::EmptyMessage { input: raw.to_string() });
        }
        if !state.joined() {
            return Err(CommandError::NotJoined { input: raw.to_string() });
        }

        Ok(ClientCommand::Message(ChatMessage::new(state.username(), text)))
    }

    /// Leave: clear the store, reset the session, emit `leave`.
    pub fn leave_chat(&mut self, state: &mut SessionState) -> ClientCommand {
        if let Err(e) = self.store.clear() {
            tracing::warn!(error = %e, "failed to clear persisted username");
        }
        state.reset();
        ClientCommand::Leave
    }
}
