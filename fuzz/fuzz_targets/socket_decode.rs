//! Fuzz target for Socket.IO packet decoding and event dispatch
//!
//! Hostile server text goes through the same path inbound messages take:
//! socket decode, then event catalog lookup. Neither step may panic.

#![no_main]

use chatline_proto::{ClientCommand, ServerEvent, SocketPacket};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    let Ok(socket) = SocketPacket::decode(data) else {
        return;
    };
    let _ = socket.connect_sid();

    if let SocketPacket::Event { name, args, .. } = &socket {
        let _ = ServerEvent::decode(name, args);
        let _ = ClientCommand::decode(name, args);
    }

    let _ = socket.encode();
});
