//! Fuzz target for the connection state machine
//!
//! # Strategy
//!
//! - Drive one `Connection` with arbitrary user calls, transport events,
//!   server packets, and clock jumps
//! - Server packets mix well-formed handshakes and acks with raw text
//!
//! # Invariants
//!
//! - Never panics, whatever the server sends
//! - Reconnection attempts never exceed the configured cap
//! - A permanent disconnect schedules no retry
//! - Connected always has a handshake

#![no_main]

use std::time::{Duration, Instant};

use arbitrary::Arbitrary;
use chatline_core::{Connection, ConnectionConfig, ConnectionState};
use chatline_proto::{Handshake, Packet};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
enum Op {
    Connect,
    Disconnect,
    TransportFailed,
    TransportClosed,
    Advance { millis: u16 },
    Server(ServerPacket),
}

#[derive(Debug, Arbitrary)]
enum ServerPacket {
    Open { ping_interval: u16, ping_timeout: u16 },
    ConnectAck,
    ConnectError,
    Disconnect,
    Event,
    Ping,
    Close,
    Raw(String),
}

impl ServerPacket {
    fn into_packet(self) -> Packet {
        match self {
            Self::Open { ping_interval, ping_timeout } => Packet::Open(Handshake {
                sid: "fuzz".to_string(),
                upgrades: Vec::new(),
                ping_interval: u64::from(ping_interval),
                ping_timeout: u64::from(ping_timeout),
                max_payload: 1_000_000,
            }),
            Self::ConnectAck => Packet::Message(r#"0{"sid":"s"}"#.to_string()),
            Self::ConnectError => Packet::Message(r#"4{"message":"no"}"#.to_string()),
            Self::Disconnect => Packet::Message("1".to_string()),
            Self::Event => Packet::Message(r#"2["new-message",{"sender":"a","text":"b"}]"#.to_string()),
            Self::Ping => Packet::Ping,
            Self::Close => Packet::Close,
            Self::Raw(text) => Packet::Message(text),
        }
    }
}

#[derive(Debug, Arbitrary)]
struct Input {
    attempts: u8,
    seed: u64,
    ops: Vec<Op>,
}

fuzz_target!(|input: Input| {
    let config = ConnectionConfig {
        reconnection_attempts: u32::from(input.attempts % 8),
        connect_timeout: Duration::from_millis(500),
        ..ConnectionConfig::default()
    };
    let mut now = Instant::now();
    let mut conn = Connection::new(now, config, input.seed);

    for op in input.ops {
        match op {
            Op::Connect => {
                let _ = conn.connect(now);
            },
            Op::Disconnect => {
                conn.disconnect();
            },
            Op::TransportFailed => {
                conn.transport_failed("fuzz", now);
            },
            Op::TransportClosed => {
                conn.transport_closed("fuzz", now);
            },
            Op::Advance { millis } => {
                now += Duration::from_millis(u64::from(millis));
                conn.tick(now);
            },
            Op::Server(packet) => {
                let _ = conn.handle_packet(packet.into_packet(), now);
            },
        }

        assert!(conn.attempts() <= conn.config().reconnection_attempts);
        if conn.state() == ConnectionState::DisconnectedPermanent {
            assert!(!conn.retry_pending());
        }
        if conn.state() == ConnectionState::Connected {
            assert!(conn.handshake().is_some());
        }
    }
});
