//! Chat event and command catalog.
//!
//! Event names are part of the compatibility surface with the chat server and
//! must not change. Server events flow into the client, client commands flow
//! out. Both travel as Socket.IO `EVENT` packets on the default namespace.

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Value, json};

use crate::{
    SocketPacket,
    errors::{ProtocolError, Result},
};

/// Sender name used for locally synthesized notices.
pub const SYSTEM_SENDER: &str = "System";

/// Wire names of every event and command.
pub mod names {
    /// Server: full message history snapshot
    pub const PREVIOUS_MESSAGES: &str = "previous-messages";
    /// Server: one new chat message
    pub const NEW_MESSAGE: &str = "new-message";
    /// Server: a user joined
    pub const USER_JOINED: &str = "user-joined";
    /// Server: a user left
    pub const USER_LEFT: &str = "user-left";
    /// Server: active user list snapshot
    pub const ACTIVE_USERS: &str = "active-users";

    /// Client: re-attach a persisted username
    pub const RESTORE_SESSION: &str = "restore-session";
    /// Client: join with a username
    pub const JOIN: &str = "join";
    /// Client: post a chat message
    pub const MESSAGE: &str = "message";
    /// Client: leave the chat
    pub const LEAVE: &str = "leave";
}

/// A chat message as carried on the wire and kept in the local log.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Display name of the author
    pub sender: String,
    /// Message body
    pub text: String,
}

impl ChatMessage {
    /// Create a message.
    pub fn new(sender: impl Into<String>, text: impl Into<String>) -> Self {
        Self { sender: sender.into(), text: text.into() }
    }

    /// Create a notice attributed to [`SYSTEM_SENDER`].
    pub fn system(text: impl Into<String>) -> Self {
        Self::new(SYSTEM_SENDER, text)
    }

    /// Whether this message was synthesized by the client.
    pub fn is_system(&self) -> bool {
        self.sender == SYSTEM_SENDER
    }
}

#[derive(Serialize, Deserialize)]
struct UserPayload {
    username: String,
}

/// Decode the first event argument as `T`.
pub fn decode_arg<T: DeserializeOwned>(event: &str, args: &[Value]) -> Result<T> {
    let Some(first) = args.first() else {
        return Err(ProtocolError::InvalidPayload {
            event: event.to_string(),
            reason: "missing argument".to_string(),
        });
    };
    T::deserialize(first).map_err(|e| ProtocolError::InvalidPayload {
        event: event.to_string(),
        reason: e.to_string(),
    })
}

/// Decode a `{ "username": .. }` argument.
pub fn decode_username(event: &str, args: &[Value]) -> Result<String> {
    decode_arg::<UserPayload>(event, args).map(|payload| payload.username)
}

/// Events pushed by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerEvent {
    /// History snapshot, replaces the local log
    PreviousMessages(Vec<ChatMessage>),
    /// One message, appended to the local log
    NewMessage(ChatMessage),
    /// A user joined
    UserJoined {
        /// Name of the user
        username: String,
    },
    /// A user left
    UserLeft {
        /// Name of the user
        username: String,
    },
    /// User list snapshot, replaces the local list
    ActiveUsers(Vec<String>),
}

impl ServerEvent {
    /// Wire name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::PreviousMessages(_) => names::PREVIOUS_MESSAGES,
            Self::NewMessage(_) => names::NEW_MESSAGE,
            Self::UserJoined { .. } => names::USER_JOINED,
            Self::UserLeft { .. } => names::USER_LEFT,
            Self::ActiveUsers(_) => names::ACTIVE_USERS,
        }
    }

    /// Decode from an event name and its arguments. `Ok(None)` for names that
    /// are not server events.
    pub fn decode(name: &str, args: &[Value]) -> Result<Option<Self>> {
        let event = match name {
            names::PREVIOUS_MESSAGES => Self::PreviousMessages(decode_arg(name, args)?),
            names::NEW_MESSAGE => Self::NewMessage(decode_arg(name, args)?),
            names::USER_JOINED => Self::UserJoined { username: decode_username(name, args)? },
            names::USER_LEFT => Self::UserLeft { username: decode_username(name, args)? },
            names::ACTIVE_USERS => Self::ActiveUsers(decode_arg(name, args)?),
            _ => return Ok(None),
        };
        Ok(Some(event))
    }

    /// Socket.IO packet carrying this event.
    pub fn to_socket_packet(&self) -> Result<SocketPacket> {
        let arg = match self {
            Self::PreviousMessages(messages) => serde_json::to_value(messages)?,
            Self::NewMessage(message) => serde_json::to_value(message)?,
            Self::UserJoined { username } | Self::UserLeft { username } => {
                json!({ "username": username })
            },
            Self::ActiveUsers(users) => serde_json::to_value(users)?,
        };
        Ok(SocketPacket::event(self.name(), vec![arg]))
    }
}

/// Commands sent by the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientCommand {
    /// Re-attach a persisted username after (re)connecting
    RestoreSession {
        /// Persisted username
        username: String,
    },
    /// Join the chat
    Join {
        /// Trimmed username
        username: String,
    },
    /// Post a message
    Message(ChatMessage),
    /// Leave the chat
    Leave,
}

impl ClientCommand {
    /// Wire name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::RestoreSession { .. } => names::RESTORE_SESSION,
            Self::Join { .. } => names::JOIN,
            Self::Message(_) => names::MESSAGE,
            Self::Leave => names::LEAVE,
        }
    }

    /// Socket.IO packet carrying this command.
    pub fn to_socket_packet(&self) -> Result<SocketPacket> {
        let args = match self {
            Self::RestoreSession { username } | Self::Join { username } => {
                vec![Value::String(username.clone())]
            },
            Self::Message(message) => vec![serde_json::to_value(message)?],
            Self::Leave => Vec::new(),
        };
        Ok(SocketPacket::event(self.name(), args))
    }

    /// Decode from an event name and its arguments. `Ok(None)` for names that
    /// are not client commands.
    pub fn decode(name: &str, args: &[Value]) -> Result<Option<Self>> {
        let command = match name {
            names::RESTORE_SESSION => Self::RestoreSession { username: decode_arg(name, args)? },
            names::JOIN => Self::Join { username: decode_arg(name, args)? },
            names::MESSAGE => Self::Message(decode_arg(name, args)?),
            names::LEAVE => Self::Leave,
            _ => return Ok(None),
        };
        Ok(Some(command))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_joined_uses_username_object() {
        let packet =
            ServerEvent::UserJoined { username: "alice".into() }.to_socket_packet().unwrap();
        assert_eq!(packet.encode().unwrap(), r#"2["user-joined",{"username":"alice"}]"#);
    }

    #[test]
    fn decodes_previous_messages_snapshot() {
        let args = vec![json!([{"sender":"a","text":"one"},{"sender":"b","text":"two"}])];
        let event = ServerEvent::decode(names::PREVIOUS_MESSAGES, &args).unwrap();
        assert_eq!(
            event,
            Some(ServerEvent::PreviousMessages(vec![
                ChatMessage::new("a", "one"),
                ChatMessage::new("b", "two"),
            ]))
        );
    }

    #[test]
    fn unknown_names_are_not_events() {
        assert_eq!(ServerEvent::decode("typing", &[]).unwrap(), None);
        assert_eq!(ClientCommand::decode("typing", &[]).unwrap(), None);
    }

    #[test]
    fn missing_argument_is_invalid_payload() {
        let err = ServerEvent::decode(names::NEW_MESSAGE, &[]).unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidPayload { ref event, .. } if event == "new-message"));
    }

    #[test]
    fn wrong_shape_is_invalid_payload() {
        let err = ServerEvent::decode(names::ACTIVE_USERS, &[json!("alice")]).unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidPayload { .. }));
    }

    #[test]
    fn leave_carries_no_arguments() {
        let packet = ClientCommand::Leave.to_socket_packet().unwrap();
        assert_eq!(packet.encode().unwrap(), r#"2["leave"]"#);
    }

    #[test]
    fn system_messages_are_flagged() {
        assert!(ChatMessage::system("x joined the chat").is_system());
        assert!(!ChatMessage::new("x", "hi").is_system());
    }
}
