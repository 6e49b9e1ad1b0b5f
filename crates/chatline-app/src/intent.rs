//! User intents forwarded by the presentation layer.

/// What the user asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserIntent {
    /// Submit a username
    Join(String),
    /// Submit message text
    SendMessage(String),
    /// Leave the chat
    Leave,
    /// Connect again after giving up
    Reconnect,
    /// Exit the application
    Quit,
}
