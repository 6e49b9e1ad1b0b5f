//! Line input.
//!
//! Lines starting with `/` are commands. Anything else is chat text. A leading
//! `//` escapes a message that itself starts with a slash.

use chatline_app::UserIntent;

/// Usage shown by `/help` and for unknown commands.
pub const HELP: &str = "commands: /join <name>, /leave, /reconnect, /quit";

/// What one line of input asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineInput {
    /// Forward to the application
    Intent(UserIntent),
    /// Print usage. Nothing reaches the application.
    Help,
    /// Blank line
    Nothing,
}

/// Parse one line of input.
pub fn parse_line(line: &str) -> LineInput {
    let line = line.trim_end_matches(['\r', '\n']);
    if line.trim().is_empty() {
        return LineInput::Nothing;
    }

    if let Some(escaped) = line.strip_prefix("//") {
        return LineInput::Intent(UserIntent::SendMessage(format!("/{escaped}")));
    }

    let Some(command) = line.strip_prefix('/') else {
        return LineInput::Intent(UserIntent::SendMessage(line.to_string()));
    };

    let (name, rest) = command.split_once(char::is_whitespace).unwrap_or((command, ""));
    match name {
        "join" | "j" => LineInput::Intent(UserIntent::Join(rest.to_string())),
        "leave" => LineInput::Intent(UserIntent::Leave),
        "reconnect" => LineInput::Intent(UserIntent::Reconnect),
        "quit" | "q" | "exit" => LineInput::Intent(UserIntent::Quit),
        _ => LineInput::Help,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn intent(line: &str) -> UserIntent {
        match parse_line(line) {
            LineInput::Intent(intent) => intent,
            other => panic!("expected an intent for {line:?}, got {other:?}"),
        }
    }

    #[test]
    fn plain_text_is_a_message() {
        assert_eq!(intent("hello there"), UserIntent::SendMessage("hello there".into()));
    }

    #[test]
    fn join_keeps_the_raw_name() {
        assert_eq!(intent("/join  alice "), UserIntent::Join(" alice ".into()));
        assert_eq!(intent("/join"), UserIntent::Join(String::new()));
    }

    #[test]
    fn commands() {
        assert_eq!(intent("/leave"), UserIntent::Leave);
        assert_eq!(intent("/reconnect"), UserIntent::Reconnect);
        assert_eq!(intent("/q"), UserIntent::Quit);
        assert_eq!(intent("/quit\r\n"), UserIntent::Quit);
    }

    #[test]
    fn double_slash_escapes() {
        assert_eq!(intent("//shrug"), UserIntent::SendMessage("/shrug".into()));
    }

    #[test]
    fn blank_and_unknown() {
        assert_eq!(parse_line("   "), LineInput::Nothing);
        assert_eq!(parse_line("/dance"), LineInput::Help);
        assert_eq!(parse_line("/help"), LineInput::Help);
    }
}
