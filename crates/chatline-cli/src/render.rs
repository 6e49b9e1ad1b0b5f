//! Incremental line rendering.
//!
//! A terminal scrolls, so the renderer prints only what changed since the
//! last call: the join state, the status line, the user list, and new
//! messages. Text of a rejected send is echoed back so it is not lost. When the message log no longer extends what was printed (a
//! history snapshot or a leave), the whole log is printed again.

use std::io::{self, Write};

use chatline_app::App;
use chatline_core::{IdentityStore, Message};

/// Remembers what has been printed.
#[derive(Debug, Default)]
pub struct Renderer {
    joined: Option<bool>,
    status: Option<String>,
    rejected: Option<String>,
    users: Vec<String>,
    shown: Vec<Message>,
}

impl Renderer {
    /// Create a renderer that has printed nothing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Print everything that changed in `app` since the last call.
    pub fn render<S: IdentityStore, W: Write>(
        &mut self,
        app: &App<S>,
        out: &mut W,
    ) -> io::Result<()> {
        if self.joined != Some(app.joined()) {
            self.joined = Some(app.joined());
            if app.joined() {
                writeln!(out, "-- joined as {}", app.username())?;
            } else {
                writeln!(out, "-- type /join <name> to enter the chat")?;
            }
        }

        if self.status.as_deref() != app.status_message() {
            self.status = app.status_message().map(str::to_string);
            if let Some(status) = &self.status {
                writeln!(out, "-- {status}")?;
            }
        }

        if self.rejected.as_deref() != app.rejected_input() {
            self.rejected = app.rejected_input().map(str::to_string);
            if let Some(text) = self.rejected.as_deref().filter(|t| !t.trim().is_empty()) {
                writeln!(out, "-- not sent: {text}")?;
            }
        }

        if self.users != app.users() {
            self.users = app.users().to_vec();
            if self.users.is_empty() {
                writeln!(out, "-- online: nobody")?;
            } else {
                writeln!(out, "-- online: {}", self.users.join(", "))?;
            }
        }

        let messages = app.messages();
        let fresh = if messages.starts_with(&self.shown) {
            &messages[self.shown.len()..]
        } else {
            if !messages.is_empty() {
                writeln!(out, "-- history")?;
            }
            self.shown.clear();
            messages
        };
        for message in fresh {
            write_message(out, message)?;
        }
        self.shown.extend_from_slice(fresh);

        out.flush()
    }
}

fn write_message<W: Write>(out: &mut W, message: &Message) -> io::Result<()> {
    if message.is_system() {
        writeln!(out, "* {}", message.text)
    } else {
        writeln!(out, "<{}> {}", message.sender, message.text)
    }
}

#[cfg(test)]
mod tests {
    use chatline_app::{AppEvent, UserIntent};
    use chatline_core::{ConnectionState, MemoryIdentityStore};
    use serde_json::json;

    use super::*;

    fn server(name: &str, args: serde_json::Value) -> AppEvent {
        let serde_json::Value::Array(args) = args else { unreachable!() };
        AppEvent::Server { name: name.to_string(), args }
    }

    fn render(renderer: &mut Renderer, app: &App<MemoryIdentityStore>) -> String {
        let mut out = Vec::new();
        renderer.render(app, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn first_render_prompts_for_a_name() {
        let app = App::new(MemoryIdentityStore::new());
        let mut renderer = Renderer::new();

        insta::assert_snapshot!(render(&mut renderer, &app), @"-- type /join <name> to enter the chat");
        assert_eq!(render(&mut renderer, &app), "");
    }

    #[test]
    fn only_changes_are_printed() {
        let mut app = App::new(MemoryIdentityStore::new());
        let mut renderer = Renderer::new();
        render(&mut renderer, &app);

        app.handle(AppEvent::ConnectionChanged(ConnectionState::Connected));
        app.join("alice").unwrap();
        app.handle(server("active-users", json!([["alice", "bob"]])));
        app.handle(server("new-message", json!([{"sender": "bob", "text": "hi"}])));
        app.handle(server("user-joined", json!([{"username": "carol"}])));

        insta::assert_snapshot!(render(&mut renderer, &app), @r"
        -- joined as alice
        -- online: alice, bob
        <bob> hi
        * carol joined the chat
        ");

        app.handle(server("new-message", json!([{"sender": "alice", "text": "hey"}])));
        assert_eq!(render(&mut renderer, &app), "<alice> hey\n");
    }

    #[test]
    fn replaced_history_is_reprinted() {
        let mut app = App::new(MemoryIdentityStore::new());
        let mut renderer = Renderer::new();
        app.join("alice").unwrap();
        app.handle(server("new-message", json!([{"sender": "bob", "text": "one"}])));
        render(&mut renderer, &app);

        app.handle(server(
            "previous-messages",
            json!([[{"sender": "carol", "text": "older"}, {"sender": "bob", "text": "one"}]]),
        ));

        insta::assert_snapshot!(render(&mut renderer, &app), @r"
        -- history
        <carol> older
        <bob> one
        ");
    }

    #[test]
    fn status_changes_are_printed_once() {
        let mut app = App::new(MemoryIdentityStore::new());
        let mut renderer = Renderer::new();
        render(&mut renderer, &app);

        app.handle(AppEvent::ConnectionChanged(ConnectionState::Reconnecting));
        assert_eq!(render(&mut renderer, &app), "-- Connection lost, reconnecting...\n");
        assert_eq!(render(&mut renderer, &app), "");
    }

    #[test]
    fn rejected_send_is_echoed() {
        let mut app = App::new(MemoryIdentityStore::new());
        let mut renderer = Renderer::new();
        render(&mut renderer, &app);

        app.handle(AppEvent::Intent(UserIntent::SendMessage("hello?".into())));

        insta::assert_snapshot!(render(&mut renderer, &app), @r"
        -- join the chat before sending messages
        -- not sent: hello?
        ");
        assert_eq!(render(&mut renderer, &app), "");
    }
}
