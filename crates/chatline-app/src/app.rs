//! Application state machine.
//!
//! This module defines the [`App`] state machine, which owns the chat session
//! completely decoupled from I/O and transport mechanics.
//!
//! This is a pure state machine: it consumes [`crate::AppEvent`] inputs and
//! produces [`crate::AppAction`] instructions for the runtime to execute.
//!
//! # Responsibilities
//!
//! - Routes server events through the inbound handler into session state.
//! - Turns user intents into validated commands.
//! - Issues `restore-session` once per established connection.
//! - Keeps a transient status line for validation errors and connection
//!   notices, and hands a rejected intent's input back.

use chatline_core::{
    CommandEmitter, CommandError, ConnectionState, IdentityStore, InboundHandler, InboundOutcome,
    Message, SessionState,
};

use crate::{AppAction, AppEvent, UserIntent};

/// Application state machine.
///
/// Pure state machine that processes events and produces actions.
/// No I/O dependencies - fully testable in simulation.
#[derive(Debug, Clone)]
pub struct App<S> {
    /// Observable session state.
    state: SessionState,
    /// Server event routes. Disposed on shutdown.
    inbound: InboundHandler,
    /// Command producer and identity persistence.
    emitter: CommandEmitter<S>,
    /// Number of connections established so far.
    epoch: u64,
    /// Transient status message. `None` if no message.
    status_message: Option<String>,
    /// Raw input of the last intent, if it was rejected.
    rejected_input: Option<String>,
}

impl<S: IdentityStore> App<S> {
    /// Create the session, committing any persisted username.
    pub fn new(store: S) -> Self {
        let mut state = SessionState::new();
        let emitter = CommandEmitter::new(store);
        emitter.load_identity(&mut state);

        Self {
            state,
            inbound: InboundHandler::new(),
            emitter,
            epoch: 0,
            status_message: None,
            rejected_input: None,
        }
    }

    /// Process an event and return actions.
    pub fn handle(&mut self, event: AppEvent) -> Vec<AppAction> {
        match event {
            AppEvent::Intent(intent) => self.handle_intent(intent),
            AppEvent::Tick => vec![],
            AppEvent::ConnectionChanged(state) => self.connection_changed(state),
            AppEvent::Server { name, args } => {
                match self.inbound.handle(&mut self.state, &name, &args) {
                    Ok(InboundOutcome::Applied(_)) => vec![AppAction::Render],
                    Ok(InboundOutcome::Ignored | InboundOutcome::NotJoined) => vec![],
                    Err(e) => {
                        tracing::warn!(event = %name, error = %e, "dropping malformed server event");
                        vec![]
                    },
                }
            },
            AppEvent::Error { message } => {
                self.status_message = Some(message);
                vec![AppAction::Render]
            },
        }
    }

    fn handle_intent(&mut self, intent: UserIntent) -> Vec<AppAction> {
        self.rejected_input = None;
        let result = match intent {
            UserIntent::Join(raw) => self.join(&raw),
            UserIntent::SendMessage(raw) => self.send_message(&raw),
            UserIntent::Leave => Ok(self.leave_chat()),
            UserIntent::Reconnect => Ok(self.connect()),
            UserIntent::Quit => Ok(self.shutdown()),
        };

        result.unwrap_or_else(|e| {
            tracing::debug!(error = %e, "command rejected");
            self.status_message = Some(e.to_string());
            self.rejected_input = Some(e.into_input());
            vec![AppAction::Render]
        })
    }

    fn connection_changed(&mut self, state: ConnectionState) -> Vec<AppAction> {
        self.state.observe_connection(state);

        let mut actions = Vec::new();
        let status = match state {
            ConnectionState::Connected => {
                self.epoch += 1;
                if let Some(command) = self.emitter.restore_session(&self.state, self.epoch) {
                    actions.push(AppAction::Emit(command));
                }
                "Connected"
            },
            ConnectionState::Connecting => "Connecting...",
            ConnectionState::Reconnecting => "Connection lost, reconnecting...",
            ConnectionState::Disconnected => "Disconnected",
            ConnectionState::DisconnectedPermanent => "Could not reach the server, gave up",
        };
        self.status_message = Some(status.to_string());

        actions.push(AppAction::Render);
        actions
    }

    /// Join with `raw` as the username.
    ///
    /// # Errors
    ///
    /// - `CommandError::EmptyUsername` if `raw` is blank
    pub fn join(&mut self, raw: &str) -> Result<Vec<AppAction>, CommandError> {
        let command = self.emitter.join(&mut self.state, raw)?;
        self.status_message = None;
        Ok(vec![AppAction::Emit(command), AppAction::Render])
    }

    /// Send `raw` as a chat message.
    ///
    /// # Errors
    ///
    /// - `CommandError::EmptyMessage` if `raw` is blank
    /// - `CommandError::NotJoined` if no username is committed
    pub fn send_message(&self, raw: &str) -> Result<Vec<AppAction>, CommandError> {
        let command = self.emitter.send_message(&self.state, raw)?;
        Ok(vec![AppAction::Emit(command)])
    }

    /// Leave the chat and forget the persisted username.
    pub fn leave_chat(&mut self) -> Vec<AppAction> {
        let command = self.emitter.leave_chat(&mut self.state);
        self.status_message = None;
        vec![AppAction::Emit(command), AppAction::Render]
    }

    /// Connect to the server.
    pub fn connect(&self) -> Vec<AppAction> {
        vec![AppAction::Connect]
    }

    /// Dispose the inbound handler, disconnect, and quit.
    pub fn shutdown(&mut self) -> Vec<AppAction> {
        self.inbound.dispose();
        vec![AppAction::Disconnect, AppAction::Quit]
    }

    /// Stop applying server events.
    pub fn dispose(&mut self) {
        self.inbound.dispose();
    }

    /// Whether server events are still applied.
    pub fn is_disposed(&self) -> bool {
        self.inbound.is_disposed()
    }

    /// Full session state.
    pub fn session(&self) -> &SessionState {
        &self.state
    }

    /// Committed username. Empty unless joined.
    pub fn username(&self) -> &str {
        self.state.username()
    }

    /// Whether a username is committed.
    pub fn joined(&self) -> bool {
        self.state.joined()
    }

    /// Message log in arrival order.
    pub fn messages(&self) -> &[Message] {
        self.state.messages()
    }

    /// Users from the latest snapshot.
    pub fn users(&self) -> &[String] {
        self.state.users()
    }

    /// Current connection state.
    pub fn connection_state(&self) -> ConnectionState {
        self.state.connection()
    }

    /// Number of connections established so far.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Current status message.
    pub fn status_message(&self) -> Option<&str> {
        self.status_message.as_deref()
    }

    /// Input of the last intent if it was rejected, for the caller to edit
    /// and resubmit.
    pub fn rejected_input(&self) -> Option<&str> {
        self.rejected_input.as_deref()
    }

    /// Identity store backing this session.
    pub fn store(&self) -> &S {
        self.emitter.store()
    }
}

#[cfg(test)]
mod tests {
    use chatline_core::MemoryIdentityStore;
    use chatline_proto::{ChatMessage, ClientCommand};
    use serde_json::json;

    use super::*;

    fn joined_app() -> App<MemoryIdentityStore> {
        let mut app = App::new(MemoryIdentityStore::new());
        app.join("alice").unwrap();
        app
    }

    #[test]
    fn persisted_username_restores_on_connect() {
        let mut app = App::new(MemoryIdentityStore::with_username("alice"));
        assert!(app.joined());

        let actions = app.handle(AppEvent::ConnectionChanged(ConnectionState::Connected));
        assert_eq!(actions, vec![
            AppAction::Emit(ClientCommand::RestoreSession { username: "alice".into() }),
            AppAction::Render,
        ]);
        assert_eq!(app.epoch(), 1);
    }

    #[test]
    fn fresh_session_does_not_restore() {
        let mut app = App::new(MemoryIdentityStore::new());
        let actions = app.handle(AppEvent::ConnectionChanged(ConnectionState::Connected));
        assert_eq!(actions, vec![AppAction::Render]);
    }

    #[test]
    fn rejected_intent_sets_status() {
        let mut app = App::new(MemoryIdentityStore::new());

        let actions = app.handle(AppEvent::Intent(UserIntent::Join("  ".into())));

        assert_eq!(actions, vec![AppAction::Render]);
        assert_eq!(app.status_message(), Some("username must not be empty"));
        assert_eq!(app.rejected_input(), Some("  "));
        assert!(!app.joined());
    }

    #[test]
    fn rejected_send_hands_the_text_back() {
        let mut app = App::new(MemoryIdentityStore::new());

        app.handle(AppEvent::Intent(UserIntent::SendMessage("hello?".into())));
        assert_eq!(app.status_message(), Some("join the chat before sending messages"));
        assert_eq!(app.rejected_input(), Some("hello?"));

        // The next accepted intent clears it
        app.handle(AppEvent::Intent(UserIntent::Join("alice".into())));
        assert_eq!(app.rejected_input(), None);
    }

    #[test]
    fn api_send_message() {
        let app = joined_app();
        let actions = app.send_message("hi").unwrap();
        assert_eq!(actions, vec![AppAction::Emit(ClientCommand::Message(ChatMessage::new(
            "alice", "hi"
        )))]);
    }

    #[test]
    fn send_before_join_is_rejected() {
        let app = App::new(MemoryIdentityStore::new());
        assert!(matches!(app.send_message("hi"), Err(CommandError::NotJoined { .. })));
    }

    #[test]
    fn server_events_update_session() {
        let mut app = joined_app();

        let actions = app.handle(AppEvent::Server {
            name: "new-message".into(),
            args: vec![json!({ "sender": "bob", "text": "yo" })],
        });

        assert_eq!(actions, vec![AppAction::Render]);
        assert_eq!(app.messages(), [ChatMessage::new("bob", "yo")]);
    }

    #[test]
    fn disconnection_keeps_identity() {
        let mut app = joined_app();
        app.handle(AppEvent::ConnectionChanged(ConnectionState::Reconnecting));
        app.handle(AppEvent::ConnectionChanged(ConnectionState::DisconnectedPermanent));

        assert!(app.joined());
        assert_eq!(app.username(), "alice");
        assert_eq!(app.connection_state(), ConnectionState::DisconnectedPermanent);
    }

    #[test]
    fn api_leave_chat() {
        let mut app = joined_app();
        let actions = app.leave_chat();

        assert_eq!(actions, vec![AppAction::Emit(ClientCommand::Leave), AppAction::Render]);
        assert!(!app.joined());
        assert_eq!(app.store().peek(), None);
    }

    #[test]
    fn shutdown_disposes_inbound() {
        let mut app = joined_app();
        let actions = app.handle(AppEvent::Intent(UserIntent::Quit));

        assert_eq!(actions, vec![AppAction::Disconnect, AppAction::Quit]);
        assert!(app.is_disposed());

        let actions = app.handle(AppEvent::Server {
            name: "new-message".into(),
            args: vec![json!({ "sender": "bob", "text": "late" })],
        });
        assert!(actions.is_empty());
        assert!(app.messages().is_empty());
    }

    #[test]
    fn api_connect() {
        let mut app = App::new(MemoryIdentityStore::new());
        assert_eq!(app.handle(AppEvent::Intent(UserIntent::Reconnect)), vec![AppAction::Connect]);
    }
}
