//! Fuzz target for Engine.IO packet and payload decoding
//!
//! Arbitrary text must never panic the decoder. Whatever decodes must
//! re-encode, and the re-encoded text must decode to the same packet.

#![no_main]

use chatline_proto::{Packet, decode_payload, encode_payload};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    if let Ok(packet) = Packet::decode(data) {
        let encoded = packet.encode().expect("decoded packet must re-encode");
        assert_eq!(Packet::decode(&encoded).ok(), Some(packet));
    }

    if let Ok(packets) = decode_payload(data) {
        let body = encode_payload(&packets).expect("decoded payload must re-encode");
        assert_eq!(decode_payload(&body).ok(), Some(packets));
    }
});
