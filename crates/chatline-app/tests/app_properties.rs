//! Property-based tests for App state machine.
//!
//! Tests verify that session invariants hold under arbitrary event sequences:
//! - `joined` only becomes false through an explicit leave
//! - the message log is empty right after a leave
//! - restore is emitted at most once per established connection

use chatline_app::{App, AppAction, AppEvent, UserIntent};
use chatline_core::{ConnectionState, MemoryIdentityStore};
use chatline_proto::ClientCommand;
use proptest::prelude::*;
use serde_json::json;

fn connection_state_strategy() -> impl Strategy<Value = ConnectionState> {
    prop_oneof![
        Just(ConnectionState::Disconnected),
        Just(ConnectionState::Connecting),
        Just(ConnectionState::Connected),
        Just(ConnectionState::Reconnecting),
        Just(ConnectionState::DisconnectedPermanent),
    ]
}

/// Generate random app events (no quit, so the handler stays live).
fn event_strategy() -> impl Strategy<Value = AppEvent> {
    prop_oneof![
        1 => Just(AppEvent::Tick),
        2 => connection_state_strategy().prop_map(AppEvent::ConnectionChanged),
        2 => "[ a-z]{0,6}".prop_map(|raw| AppEvent::Intent(UserIntent::Join(raw))),
        2 => "[ a-z]{0,6}".prop_map(|raw| AppEvent::Intent(UserIntent::SendMessage(raw))),
        1 => Just(AppEvent::Intent(UserIntent::Leave)),
        3 => ("[a-z]{1,4}", "[a-z ]{0,8}").prop_map(|(sender, text)| AppEvent::Server {
            name: "new-message".into(),
            args: vec![json!({ "sender": sender, "text": text })],
        }),
        1 => prop::collection::vec("[a-z]{1,4}", 0..4).prop_map(|users| AppEvent::Server {
            name: "active-users".into(),
            args: vec![json!(users)],
        }),
    ]
}

fn restores(actions: &[AppAction]) -> usize {
    actions
        .iter()
        .filter(|a| matches!(a, AppAction::Emit(ClientCommand::RestoreSession { .. })))
        .count()
}

proptest! {
    #[test]
    fn prop_joined_cleared_only_by_leave(events in prop::collection::vec(event_strategy(), 0..60)) {
        let mut app = App::new(MemoryIdentityStore::new());

        for event in events {
            let was_joined = app.joined();
            let is_leave = matches!(event, AppEvent::Intent(UserIntent::Leave));
            let _ = app.handle(event);

            if was_joined && !app.joined() {
                prop_assert!(is_leave, "joined cleared without leave");
            }
            if is_leave {
                prop_assert!(!app.joined());
                prop_assert_eq!(app.store().peek(), None);
            }
            if !app.joined() {
                prop_assert!(app.messages().is_empty());
                prop_assert!(app.users().is_empty());
            }
        }
    }

    #[test]
    fn prop_restore_once_per_connection(events in prop::collection::vec(event_strategy(), 0..60)) {
        let mut app = App::new(MemoryIdentityStore::with_username("alice"));

        for event in events {
            let connected = matches!(event, AppEvent::ConnectionChanged(ConnectionState::Connected));
            let actions = app.handle(event);

            if connected {
                prop_assert_eq!(restores(&actions), usize::from(app.joined()));
            } else {
                prop_assert_eq!(restores(&actions), 0);
            }
        }
    }

    #[test]
    fn prop_sends_never_touch_the_log(text in "[a-z]{1,12}") {
        let mut app = App::new(MemoryIdentityStore::new());
        app.join("alice").unwrap();

        let actions = app.send_message(&text).unwrap();

        prop_assert_eq!(actions.len(), 1);
        prop_assert!(app.messages().is_empty());
    }
}
