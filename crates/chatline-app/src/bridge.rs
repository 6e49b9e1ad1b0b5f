//! Connection-to-Application translation layer.
//!
//! The [`Bridge`] wraps the sans-IO [`chatline_core::Connection`] and adapts it
//! to the high-level application lifecycle.
//!
//! # Responsibilities
//!
//! - Converts [`crate::AppAction`]s into connection calls and encoded packets.
//! - Accumulates [`TransportOp`]s for the driver to execute, in order, in the
//!   next I/O cycle.
//! - Converts connection actions back into [`crate::AppEvent`]s.
//! - Drops commands while the connection is not up, and counts them.

use chatline_core::{
    Connection, ConnectionAction, ConnectionConfig, ConnectionError, Environment, TransportKind,
};
use chatline_proto::{ClientCommand, Packet, SocketPacket};

use crate::{AppAction, AppEvent};

/// Transport operation for the driver.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportOp {
    /// Open a transport of this kind to the configured endpoint
    Open(TransportKind),
    /// Send a packet over the open transport
    Send(Packet),
    /// Close the open transport
    Close {
        /// Why the transport is closed
        reason: String,
    },
}

/// Bridge between App and the connection state machine.
///
/// Generic over Environment to support both production and simulation.
/// The Instant type is determined by the Environment's associated type.
pub struct Bridge<E: Environment> {
    env: E,
    connection: Connection<E::Instant>,
    outgoing: Vec<TransportOp>,
    dropped_commands: u64,
}

impl<E: Environment> Bridge<E> {
    /// Create a new Bridge. The reconnection jitter is seeded from `env`.
    pub fn new(env: E, config: ConnectionConfig) -> Self {
        let connection = Connection::new(env.now(), config, env.random_u64());
        Self { env, connection, outgoing: Vec::new(), dropped_commands: 0 }
    }

    /// Connection state machine.
    pub fn connection(&self) -> &Connection<E::Instant> {
        &self.connection
    }

    /// Commands dropped because the connection was not up.
    pub fn dropped_commands(&self) -> u64 {
        self.dropped_commands
    }

    /// Process an App action and return resulting App events.
    pub fn process_app_action(&mut self, action: AppAction) -> Vec<AppEvent> {
        match action {
            AppAction::Connect => match self.connection.connect(self.env.now()) {
                Ok(actions) => self.process_connection_actions(actions),
                Err(e) => vec![AppEvent::Error { message: e.to_string() }],
            },
            AppAction::Disconnect => {
                let actions = self.connection.disconnect();
                self.process_connection_actions(actions)
            },
            AppAction::Emit(command) => self.emit(&command),
            AppAction::Render | AppAction::Quit => vec![],
        }
    }

    fn emit(&mut self, command: &ClientCommand) -> Vec<AppEvent> {
        if !self.connection.state().is_connected() {
            self.dropped_commands += 1;
            tracing::debug!(
                command = command.name(),
                state = %self.connection.state(),
                "dropping command while not connected"
            );
            return vec![];
        }

        match command.to_socket_packet().and_then(SocketPacket::into_packet) {
            Ok(packet) => {
                self.outgoing.push(TransportOp::Send(packet));
                vec![]
            },
            Err(e) => vec![AppEvent::Error { message: e.to_string() }],
        }
    }

    /// Handle a packet from the server.
    pub fn handle_packet(&mut self, packet: Packet) -> Vec<AppEvent> {
        let result = self.connection.handle_packet(packet, self.env.now());
        self.handle_connection_result(result)
    }

    /// The driver failed to open the requested transport.
    pub fn transport_failed(&mut self, reason: &str) -> Vec<AppEvent> {
        let actions = self.connection.transport_failed(reason, self.env.now());
        self.process_connection_actions(actions)
    }

    /// The open transport closed.
    pub fn transport_closed(&mut self, reason: &str) -> Vec<AppEvent> {
        let actions = self.connection.transport_closed(reason, self.env.now());
        self.process_connection_actions(actions)
    }

    /// Process a time tick.
    pub fn handle_tick(&mut self, now: E::Instant) -> Vec<AppEvent> {
        let actions = self.connection.tick(now);
        self.process_connection_actions(actions)
    }

    /// Take pending transport operations.
    pub fn take_outgoing(&mut self) -> Vec<TransportOp> {
        std::mem::take(&mut self.outgoing)
    }

    /// Whether transport operations are waiting.
    pub fn has_outgoing(&self) -> bool {
        !self.outgoing.is_empty()
    }

    fn handle_connection_result(
        &mut self,
        result: Result<Vec<ConnectionAction>, ConnectionError>,
    ) -> Vec<AppEvent> {
        match result {
            Ok(actions) => self.process_connection_actions(actions),
            Err(e) if e.is_transient() => {
                tracing::debug!(error = %e, "dropping packet");
                vec![]
            },
            Err(e) => {
                tracing::warn!(error = %e, "dropping packet");
                vec![]
            },
        }
    }

    fn process_connection_actions(&mut self, actions: Vec<ConnectionAction>) -> Vec<AppEvent> {
        let mut events = Vec::new();

        for action in actions {
            match action {
                ConnectionAction::Open { kind } => self.outgoing.push(TransportOp::Open(kind)),
                ConnectionAction::Send(packet) => self.outgoing.push(TransportOp::Send(packet)),
                ConnectionAction::Close { reason } => {
                    self.outgoing.push(TransportOp::Close { reason });
                },
                ConnectionAction::StateChanged(state) => {
                    events.push(AppEvent::ConnectionChanged(state));
                },
                ConnectionAction::Deliver { name, args } => {
                    events.push(AppEvent::Server { name, args });
                },
            }
        }

        events
    }
}

#[cfg(test)]
mod tests {
    use std::{
        future::Future,
        pin::Pin,
        task::{Context, Poll},
        time::Duration,
    };

    use chatline_core::ConnectionState;
    use chatline_proto::{ChatMessage, Handshake};

    use super::*;

    struct ImmediateFuture;

    impl Future for ImmediateFuture {
        type Output = ();
        fn poll(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Self::Output> {
            Poll::Ready(())
        }
    }

    #[derive(Clone)]
    struct TestEnv;

    impl Environment for TestEnv {
        type Instant = std::time::Instant;
        fn now(&self) -> std::time::Instant {
            std::time::Instant::now()
        }

        fn sleep(&self, _duration: Duration) -> impl Future<Output = ()> + Send {
            ImmediateFuture
        }

        fn random_bytes(&self, buffer: &mut [u8]) {
            for (i, byte) in buffer.iter_mut().enumerate() {
                *byte = i as u8;
            }
        }
    }

    fn connected_bridge() -> Bridge<TestEnv> {
        let mut bridge = Bridge::new(TestEnv, ConnectionConfig::default());
        bridge.process_app_action(AppAction::Connect);
        bridge.handle_packet(Packet::Open(Handshake {
            sid: "eio".into(),
            upgrades: vec![],
            ping_interval: 25_000,
            ping_timeout: 20_000,
            max_payload: 1_000_000,
        }));
        let events = bridge.handle_packet(Packet::Message(r#"0{"sid":"s"}"#.into()));
        assert_eq!(events, vec![AppEvent::ConnectionChanged(ConnectionState::Connected)]);
        bridge.take_outgoing();
        bridge
    }

    #[test]
    fn connect_requests_websocket() {
        let mut bridge = Bridge::new(TestEnv, ConnectionConfig::default());
        let events = bridge.process_app_action(AppAction::Connect);

        assert_eq!(events, vec![AppEvent::ConnectionChanged(ConnectionState::Connecting)]);
        assert_eq!(bridge.take_outgoing(), vec![TransportOp::Open(TransportKind::WebSocket)]);
    }

    #[test]
    fn emit_while_connected_sends_packet() {
        let mut bridge = connected_bridge();
        let command = ClientCommand::Message(ChatMessage::new("alice", "hi"));

        bridge.process_app_action(AppAction::Emit(command));

        assert_eq!(bridge.take_outgoing(), vec![TransportOp::Send(Packet::Message(
            r#"2["message",{"sender":"alice","text":"hi"}]"#.into()
        ))]);
        assert_eq!(bridge.dropped_commands(), 0);
    }

    #[test]
    fn emit_while_disconnected_is_dropped() {
        let mut bridge = Bridge::new(TestEnv, ConnectionConfig::default());

        let events = bridge.process_app_action(AppAction::Emit(ClientCommand::Leave));

        assert!(events.is_empty());
        assert!(!bridge.has_outgoing());
        assert_eq!(bridge.dropped_commands(), 1);
    }

    #[test]
    fn server_events_become_app_events() {
        let mut bridge = connected_bridge();
        let events = bridge.handle_packet(Packet::Message(r#"2["active-users",["a"]]"#.into()));

        assert_eq!(events, vec![AppEvent::Server {
            name: "active-users".into(),
            args: vec![serde_json::json!(["a"])],
        }]);
    }

    #[test]
    fn malformed_packet_is_dropped() {
        let mut bridge = connected_bridge();
        let events = bridge.handle_packet(Packet::Message("2{not json".into()));
        assert!(events.is_empty());
    }

    #[test]
    fn disconnect_orders_goodbye_before_close() {
        let mut bridge = connected_bridge();
        bridge.process_app_action(AppAction::Disconnect);

        let ops = bridge.take_outgoing();
        assert!(matches!(ops[0], TransportOp::Send(Packet::Message(ref data)) if data == "1"));
        assert!(matches!(ops[1], TransportOp::Close { .. }));
    }

    #[test]
    fn empty_transport_list_reports_error() {
        let config = ConnectionConfig { transports: vec![], ..ConnectionConfig::default() };
        let mut bridge = Bridge::new(TestEnv, config);

        let events = bridge.process_app_action(AppAction::Connect);
        assert!(matches!(events[0], AppEvent::Error { .. }));
    }
}
