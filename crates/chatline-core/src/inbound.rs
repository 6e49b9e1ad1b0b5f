//! Inbound protocol handler.
//!
//! An explicit table from event name to transition function. Built once per
//! session, disposed at teardown. Every transition is a pure function of the
//! current state and the event payload, so replaying the same events in the
//! same order always yields the same state.
//!
//! | event               | effect                                      |
//! |---------------------|---------------------------------------------|
//! | `previous-messages` | replace the message log                     |
//! | `new-message`       | append to the message log                   |
//! | `user-joined`       | append "<name> joined the chat" notice      |
//! | `user-left`         | append "<name> left the chat" notice        |
//! | `active-users`      | replace the user list                       |
//!
//! An unjoined session has no chat view. Events arriving before a join or
//! restore, or after a leave, are ignored so the reset state stays empty.

use std::collections::HashMap;

use chatline_proto::{
    ChatMessage, ProtocolError, ServerEvent,
    events::{decode_arg, decode_username},
    names,
};
use serde_json::Value;

use crate::session::SessionState;

/// Applies one decoded event payload to session state.
pub type Transition = fn(&mut SessionState, &[Value]) -> Result<(), ProtocolError>;

/// What the handler did with an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InboundOutcome {
    /// A transition ran
    Applied(&'static str),
    /// No route for this name, or the handler was disposed
    Ignored,
    /// The session is not joined, so the event was dropped
    NotJoined,
}

/// Event-name to transition table.
#[derive(Debug, Clone)]
pub struct InboundHandler {
    routes: HashMap<&'static str, (&'static str, Transition)>,
}

impl Default for InboundHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl InboundHandler {
    /// Handler subscribed to every server event.
    pub fn new() -> Self {
        let table: [(&'static str, Transition); 5] = [
            (names::PREVIOUS_MESSAGES, previous_messages),
            (names::NEW_MESSAGE, new_message),
            (names::USER_JOINED, user_joined),
            (names::USER_LEFT, user_left),
            (names::ACTIVE_USERS, active_users),
        ];
        let routes = table.into_iter().map(|(name, transition)| (name, (name, transition))).collect();
        Self { routes }
    }

    /// Run the transition registered for `name`.
    ///
    /// Unknown names are ignored, and so is everything while `state` is not
    /// joined. On error the state is left untouched.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::InvalidPayload` if the arguments do not match the
    ///   event's payload shape
    pub fn handle(
        &self,
        state: &mut SessionState,
        name: &str,
        args: &[Value],
    ) -> Result<InboundOutcome, ProtocolError> {
        let Some(&(route, transition)) = self.routes.get(name) else {
            tracing::debug!(event = name, "ignoring unsubscribed event");
            return Ok(InboundOutcome::Ignored);
        };
        if !state.joined() {
            tracing::debug!(event = route, "not joined, dropping server event");
            return Ok(InboundOutcome::NotJoined);
        }

        transition(state, args)?;
        tracing::debug!(event = route, messages = state.messages().len(), "applied server event");
        Ok(InboundOutcome::Applied(route))
    }

    /// Unsubscribe from everything. Later events are ignored.
    pub fn dispose(&mut self) {
        self.routes.clear();
    }

    /// Whether `name` still has a route.
    pub fn is_subscribed(&self, name: &str) -> bool {
        self.routes.contains_key(name)
    }

    /// Whether [`dispose`](Self::dispose) has run.
    pub fn is_disposed(&self) -> bool {
        self.routes.is_empty()
    }
}

/// Apply an already decoded event.
pub fn apply(state: &mut SessionState, event: ServerEvent) {
    match event {
        ServerEvent::PreviousMessages(messages) => state.replace_messages(messages),
        ServerEvent::NewMessage(message) => state.push_message(message),
        ServerEvent::UserJoined { username } => {
            state.push_message(ChatMessage::system(format!("{username} joined the chat")));
        },
        ServerEvent::UserLeft { username } => {
            state.push_message(ChatMessage::system(format!("{username} left the chat")));
        },
        ServerEvent::ActiveUsers(users) => state.replace_users(users),
    }
}

fn previous_messages(state: &mut SessionState, args: &[Value]) -> Result<(), ProtocolError> {
    let messages = decode_arg(names::PREVIOUS_MESSAGES, args)?;
    apply(state, ServerEvent::PreviousMessages(messages));
    Ok(())
}

fn new_message(state: &mut SessionState, args: &[Value]) -> Result<(), ProtocolError> {
    let message = decode_arg(names::NEW_MESSAGE, args)?;
    apply(state, ServerEvent::NewMessage(message));
    Ok(())
}

fn user_joined(state: &mut SessionState, args: &[Value]) -> Result<(), ProtocolError> {
    let username = decode_username(names::USER_JOINED, args)?;
    apply(state, ServerEvent::UserJoined { username });
    Ok(())
}

fn user_left(state: &mut SessionState, args: &[Value]) -> Result<(), ProtocolError> {
    let username = decode_username(names::USER_LEFT, args)?;
    apply(state, ServerEvent::UserLeft { username });
    Ok(())
}

fn active_users(state: &mut SessionState, args: &[Value]) -> Result<(), ProtocolError> {
    let users = decode_arg(names::ACTIVE_USERS, args)?;
    apply(state, ServerEvent::ActiveUsers(users));
    Ok(())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn message(sender: &str, text: &str) -> Value {
        json!({ "sender": sender, "text": text })
    }

    fn joined() -> SessionState {
        let mut state = SessionState::new();
        state.commit_identity("alice".to_string());
        state
    }

    #[test]
    fn snapshot_then_append() {
        let handler = InboundHandler::new();
        let mut state = joined();

        handler
            .handle(&mut state, "previous-messages", &[json!([message("a", "1"), message("b", "2")])])
            .unwrap();
        handler.handle(&mut state, "new-message", &[message("c", "3")]).unwrap();

        let texts: Vec<_> = state.messages().iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, ["1", "2", "3"]);
    }

    #[test]
    fn snapshot_replaces_existing_log() {
        let handler = InboundHandler::new();
        let mut state = joined();

        handler.handle(&mut state, "new-message", &[message("a", "old")]).unwrap();
        handler.handle(&mut state, "previous-messages", &[json!([message("b", "new")])]).unwrap();

        assert_eq!(state.messages(), [ChatMessage::new("b", "new")]);
    }

    #[test]
    fn user_joined_appends_notice_only() {
        let handler = InboundHandler::new();
        let mut state = joined();
        handler.handle(&mut state, "active-users", &[json!(["a"])]).unwrap();

        let outcome =
            handler.handle(&mut state, "user-joined", &[json!({ "username": "x" })]).unwrap();

        assert_eq!(outcome, InboundOutcome::Applied("user-joined"));
        assert_eq!(state.messages(), [ChatMessage::system("x joined the chat")]);
        assert_eq!(state.users(), ["a"]);
    }

    #[test]
    fn user_left_appends_notice() {
        let handler = InboundHandler::new();
        let mut state = joined();

        handler.handle(&mut state, "user-left", &[json!({ "username": "y" })]).unwrap();
        assert_eq!(state.messages(), [ChatMessage::system("y left the chat")]);
    }

    #[test]
    fn duplicates_are_kept() {
        let handler = InboundHandler::new();
        let mut state = joined();

        handler.handle(&mut state, "new-message", &[message("a", "hi")]).unwrap();
        handler.handle(&mut state, "new-message", &[message("a", "hi")]).unwrap();
        assert_eq!(state.messages().len(), 2);
        assert_eq!(state.messages()[0], state.messages()[1]);
    }

    #[test]
    fn malformed_payload_leaves_state_untouched() {
        let handler = InboundHandler::new();
        let mut state = joined();
        handler.handle(&mut state, "active-users", &[json!(["a", "b"])]).unwrap();
        let before = state.clone();

        assert!(handler.handle(&mut state, "active-users", &[json!("a")]).is_err());
        assert!(handler.handle(&mut state, "new-message", &[]).is_err());
        assert_eq!(state, before);
    }

    #[test]
    fn unknown_events_are_ignored() {
        let handler = InboundHandler::new();
        let mut state = joined();

        let outcome = handler.handle(&mut state, "typing", &[json!("a")]).unwrap();
        assert_eq!(outcome, InboundOutcome::Ignored);
        assert_eq!(state, joined());
    }

    #[test]
    fn disposed_handler_ignores_everything() {
        let mut handler = InboundHandler::new();
        let mut state = joined();
        handler.dispose();

        assert!(handler.is_disposed());
        assert!(!handler.is_subscribed("new-message"));
        let outcome = handler.handle(&mut state, "new-message", &[message("a", "hi")]).unwrap();
        assert_eq!(outcome, InboundOutcome::Ignored);
        assert!(state.messages().is_empty());
    }

    #[test]
    fn unjoined_session_ignores_every_event() {
        let handler = InboundHandler::new();
        let mut state = SessionState::new();

        for (name, arg) in [
            ("previous-messages", json!([message("a", "1")])),
            ("new-message", message("a", "2")),
            ("user-joined", json!({ "username": "x" })),
            ("user-left", json!({ "username": "alice" })),
            ("active-users", json!(["x"])),
        ] {
            let outcome = handler.handle(&mut state, name, &[arg]).unwrap();
            assert_eq!(outcome, InboundOutcome::NotJoined, "{name}");
        }
        assert_eq!(state, SessionState::new());
    }

    #[test]
    fn left_session_stays_empty() {
        let handler = InboundHandler::new();
        let mut state = joined();
        handler.handle(&mut state, "new-message", &[message("a", "hi")]).unwrap();
        state.reset();

        handler.handle(&mut state, "user-left", &[json!({ "username": "alice" })]).unwrap();
        handler.handle(&mut state, "active-users", &[json!(["bob"])]).unwrap();

        assert!(state.messages().is_empty());
        assert!(state.users().is_empty());
    }
}
