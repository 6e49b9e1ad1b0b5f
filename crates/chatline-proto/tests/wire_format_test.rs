//! Wire format tests against captured Socket.IO traffic.
//!
//! The snapshots pin the exact text the chat server expects. A change here is a
//! compatibility break, not a refactor.

use chatline_proto::{
    ChatMessage, ClientCommand, Packet, ServerEvent, SocketPacket, decode_payload, names,
};
use proptest::prelude::*;

fn outbound(command: &ClientCommand) -> String {
    command.to_socket_packet().unwrap().into_packet().unwrap().encode().unwrap()
}

#[test]
fn client_commands_on_the_wire() {
    insta::assert_snapshot!(
        outbound(&ClientCommand::RestoreSession { username: "alice".into() }),
        @r#"42["restore-session","alice"]"#
    );
    insta::assert_snapshot!(
        outbound(&ClientCommand::Join { username: "alice".into() }),
        @r#"42["join","alice"]"#
    );
    insta::assert_snapshot!(
        outbound(&ClientCommand::Message(ChatMessage::new("alice", "hello"))),
        @r#"42["message",{"sender":"alice","text":"hello"}]"#
    );
    insta::assert_snapshot!(outbound(&ClientCommand::Leave), @r#"42["leave"]"#);
}

#[test]
fn server_burst_after_join() {
    // One long-polling response carrying the join burst
    let body = concat!(
        "42[\"previous-messages\",[{\"sender\":\"bob\",\"text\":\"hey\"}]]",
        "\u{1e}",
        "42[\"user-joined\",{\"username\":\"alice\"}]",
        "\u{1e}",
        "42[\"active-users\",[\"bob\",\"alice\"]]",
    );

    let events: Vec<ServerEvent> = decode_payload(body)
        .unwrap()
        .iter()
        .map(|packet| match SocketPacket::from_packet(packet).unwrap().unwrap() {
            SocketPacket::Event { name, args, .. } => {
                ServerEvent::decode(&name, &args).unwrap().unwrap()
            },
            other => panic!("expected event, got {other:?}"),
        })
        .collect();

    assert_eq!(events, vec![
        ServerEvent::PreviousMessages(vec![ChatMessage::new("bob", "hey")]),
        ServerEvent::UserJoined { username: "alice".into() },
        ServerEvent::ActiveUsers(vec!["bob".into(), "alice".into()]),
    ]);
}

#[test]
fn server_events_decode_what_they_encode() {
    let events = [
        ServerEvent::NewMessage(ChatMessage::new("a", "b")),
        ServerEvent::UserLeft { username: "carol".into() },
        ServerEvent::ActiveUsers(vec![]),
    ];

    for event in events {
        let SocketPacket::Event { name, args, .. } = event.to_socket_packet().unwrap() else {
            panic!("expected event packet");
        };
        assert_eq!(name, event.name());
        assert_eq!(ServerEvent::decode(&name, &args).unwrap(), Some(event));
    }
}

#[test]
fn command_names_match_catalog() {
    assert_eq!(ClientCommand::Leave.name(), names::LEAVE);
    assert_eq!(ClientCommand::Join { username: String::new() }.name(), names::JOIN);
}

proptest! {
    #[test]
    fn engine_decode_never_panics(text in ".*") {
        let _ = Packet::decode(&text);
        let _ = decode_payload(&text);
    }

    #[test]
    fn socket_decode_never_panics(text in ".*") {
        let _ = SocketPacket::decode(&text);
    }

    #[test]
    fn message_text_survives_framing(sender in "[a-z]{1,8}", text in "\\PC{0,64}") {
        let command = ClientCommand::Message(ChatMessage::new(sender, text));
        let wire = outbound(&command);

        let packet = Packet::decode(&wire).unwrap();
        let SocketPacket::Event { name, args, .. } = SocketPacket::from_packet(&packet).unwrap().unwrap() else {
            panic!("expected event packet");
        };
        prop_assert_eq!(ClientCommand::decode(&name, &args).unwrap(), Some(command));
    }
}
