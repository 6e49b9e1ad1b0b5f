//! In-process chat server.
//!
//! Speaks just enough Engine.IO and Socket.IO to drive the client through a
//! full session, and keeps the chat backend state a real deployment would:
//! message history, the active user list, and one username per session.
//!
//! The server is sans-IO. The simulation driver feeds it client packets with
//! [`SimServer::receive`] and collects what the server sends with
//! [`SimServer::drain`].

use std::{
    collections::{BTreeMap, HashSet, VecDeque},
    time::Duration,
};

use chatline_core::TransportKind;
use chatline_proto::{
    ChatMessage, ClientCommand, DEFAULT_NAMESPACE, Handshake, Packet, ServerEvent, SocketPacket,
    packet::DEFAULT_MAX_PAYLOAD,
};
use serde_json::json;

/// Server-side handle for one Engine.IO session.
pub type SessionId = u64;

/// Socket.IO server default ping interval.
pub const DEFAULT_PING_INTERVAL: Duration = Duration::from_secs(25);

/// Socket.IO server default ping timeout.
pub const DEFAULT_PING_TIMEOUT: Duration = Duration::from_secs(20);

#[derive(Debug)]
struct Session {
    kind: TransportKind,
    socket_connected: bool,
    username: Option<String>,
    outbox: VecDeque<Packet>,
    next_ping: Duration,
}

/// Who receives a server event.
#[derive(Debug, Clone, Copy)]
enum Audience {
    One(SessionId),
    Everyone,
}

/// Simulated Socket.IO chat server.
#[derive(Debug)]
pub struct SimServer {
    ping_interval: Duration,
    ping_timeout: Duration,
    refused_transports: HashSet<TransportKind>,
    refused_namespace: Option<String>,
    silent: bool,
    next_session: SessionId,
    sessions: BTreeMap<SessionId, Session>,
    history: Vec<ChatMessage>,
    users: Vec<String>,
    received: Vec<ClientCommand>,
    opened: Vec<TransportKind>,
}

impl Default for SimServer {
    fn default() -> Self {
        Self::new()
    }
}

impl SimServer {
    /// Server with Socket.IO default heartbeat settings.
    pub fn new() -> Self {
        Self {
            ping_interval: DEFAULT_PING_INTERVAL,
            ping_timeout: DEFAULT_PING_TIMEOUT,
            refused_transports: HashSet::new(),
            refused_namespace: None,
            silent: false,
            next_session: 1,
            sessions: BTreeMap::new(),
            history: Vec::new(),
            users: Vec::new(),
            received: Vec::new(),
            opened: Vec::new(),
        }
    }

    /// Use a different heartbeat.
    #[must_use]
    pub fn with_heartbeat(mut self, ping_interval: Duration, ping_timeout: Duration) -> Self {
        self.ping_interval = ping_interval;
        self.ping_timeout = ping_timeout;
        self
    }

    /// Seed the message history.
    #[must_use]
    pub fn with_history(mut self, history: Vec<ChatMessage>) -> Self {
        self.history = history;
        self
    }

    /// Refuse or accept transports of `kind`.
    pub fn set_transport_refused(&mut self, kind: TransportKind, refused: bool) {
        if refused {
            self.refused_transports.insert(kind);
        } else {
            self.refused_transports.remove(&kind);
        }
    }

    /// Refuse every transport. The server looks unreachable.
    pub fn set_unreachable(&mut self, unreachable: bool) {
        for kind in [TransportKind::WebSocket, TransportKind::Polling] {
            self.set_transport_refused(kind, unreachable);
        }
    }

    /// Answer namespace connects with `CONNECT_ERROR` carrying `message`.
    pub fn refuse_namespace(&mut self, message: Option<String>) {
        self.refused_namespace = message;
    }

    /// Stop (or resume) sending heartbeat pings.
    pub fn set_silent(&mut self, silent: bool) {
        self.silent = silent;
    }

    /// Accept a transport of `kind` at virtual time `now`.
    ///
    /// # Errors
    ///
    /// Returns the refusal reason if transports of `kind` are refused.
    pub fn open(&mut self, kind: TransportKind, now: Duration) -> Result<SessionId, String> {
        if self.refused_transports.contains(&kind) {
            return Err(format!("{kind} refused"));
        }

        let id = self.next_session;
        self.next_session += 1;
        self.opened.push(kind);

        let handshake = Handshake {
            sid: format!("sim-{id}"),
            upgrades: Vec::new(),
            ping_interval: self.ping_interval.as_millis() as u64,
            ping_timeout: self.ping_timeout.as_millis() as u64,
            max_payload: DEFAULT_MAX_PAYLOAD,
        };
        let mut outbox = VecDeque::new();
        outbox.push_back(Packet::Open(handshake));

        self.sessions.insert(
            id,
            Session {
                kind,
                socket_connected: false,
                username: None,
                outbox,
                next_ping: now + self.ping_interval,
            },
        );
        tracing::debug!(session = id, %kind, "sim server accepted transport");
        Ok(id)
    }

    /// Handle a packet sent by the client on `session`.
    pub fn receive(&mut self, session: SessionId, packet: Packet) {
        if !self.sessions.contains_key(&session) {
            tracing::debug!(session, "packet for closed session");
            return;
        }

        match packet {
            Packet::Message(data) => match SocketPacket::decode(&data) {
                Ok(socket) => self.receive_socket(session, socket),
                Err(e) => tracing::warn!(session, error = %e, "sim server got malformed packet"),
            },
            Packet::Close => self.close(session),
            Packet::Pong | Packet::Ping | Packet::Noop | Packet::Upgrade | Packet::Open(_) => {},
        }
    }

    fn receive_socket(&mut self, session: SessionId, socket: SocketPacket) {
        match socket {
            SocketPacket::Connect { .. } => {
                let reply = match &self.refused_namespace {
                    Some(message) => SocketPacket::ConnectError {
                        namespace: DEFAULT_NAMESPACE.to_string(),
                        message: message.clone(),
                    },
                    None => {
                        if let Some(state) = self.sessions.get_mut(&session) {
                            state.socket_connected = true;
                        }
                        SocketPacket::Connect {
                            namespace: DEFAULT_NAMESPACE.to_string(),
                            data: Some(json!({ "sid": format!("sock-{session}") })),
                        }
                    },
                };
                self.push_socket(session, reply);
            },
            SocketPacket::Event { name, args, .. } => match ClientCommand::decode(&name, &args) {
                Ok(Some(command)) => self.handle_command(session, command),
                Ok(None) => tracing::debug!(session, event = %name, "sim server ignores event"),
                Err(e) => tracing::warn!(session, error = %e, "sim server got bad command"),
            },
            SocketPacket::Disconnect { .. } => self.close(session),
            SocketPacket::Ack { .. } | SocketPacket::ConnectError { .. } => {},
        }
    }

    fn handle_command(&mut self, session: SessionId, command: ClientCommand) {
        self.received.push(command.clone());

        match command {
            ClientCommand::Join { username } => {
                self.bind(session, &username);
                self.emit(Audience::One(session), &ServerEvent::PreviousMessages(self.history.clone()));
                self.emit(Audience::Everyone, &ServerEvent::UserJoined { username });
                self.emit(Audience::Everyone, &ServerEvent::ActiveUsers(self.users.clone()));
            },
            ClientCommand::RestoreSession { username } => {
                self.bind(session, &username);
                self.emit(Audience::One(session), &ServerEvent::PreviousMessages(self.history.clone()));
                self.emit(Audience::Everyone, &ServerEvent::ActiveUsers(self.users.clone()));
            },
            ClientCommand::Message(message) => {
                self.history.push(message.clone());
                self.emit(Audience::Everyone, &ServerEvent::NewMessage(message));
            },
            ClientCommand::Leave => self.unbind(session),
        }
    }

    fn bind(&mut self, session: SessionId, username: &str) {
        if let Some(state) = self.sessions.get_mut(&session) {
            state.username = Some(username.to_string());
        }
        if !self.users.iter().any(|user| user == username) {
            self.users.push(username.to_string());
        }
    }

    fn unbind(&mut self, session: SessionId) {
        let Some(username) = self.sessions.get_mut(&session).and_then(|s| s.username.take()) else {
            return;
        };

        let still_present =
            self.sessions.values().any(|s| s.username.as_deref() == Some(username.as_str()));
        if still_present {
            return;
        }

        self.users.retain(|user| *user != username);
        self.emit(Audience::Everyone, &ServerEvent::UserLeft { username });
        self.emit(Audience::Everyone, &ServerEvent::ActiveUsers(self.users.clone()));
    }

    /// The transport of `session` is gone. Its user leaves.
    pub fn close(&mut self, session: SessionId) {
        self.unbind(session);
        if self.sessions.remove(&session).is_some() {
            tracing::debug!(session, "sim server closed session");
        }
    }

    /// Disconnect `session` from the namespace, as a kick would.
    pub fn kick(&mut self, session: SessionId) {
        self.unbind(session);
        self.push_socket(session, SocketPacket::disconnect());
    }

    /// Send pings that are due.
    pub fn tick(&mut self, now: Duration) {
        if self.silent {
            return;
        }
        for session in self.sessions.values_mut() {
            if now >= session.next_ping {
                session.outbox.push_back(Packet::Ping);
                session.next_ping = now + self.ping_interval;
            }
        }
    }

    /// Take everything queued for `session`.
    pub fn drain(&mut self, session: SessionId) -> Vec<Packet> {
        self.sessions.get_mut(&session).map(|s| s.outbox.drain(..).collect()).unwrap_or_default()
    }

    /// Whether anything is queued for `session`.
    pub fn has_outgoing(&self, session: SessionId) -> bool {
        self.sessions.get(&session).is_some_and(|s| !s.outbox.is_empty())
    }

    fn emit(&mut self, audience: Audience, event: &ServerEvent) {
        let packet = match event.to_socket_packet().and_then(SocketPacket::into_packet) {
            Ok(packet) => packet,
            Err(e) => {
                tracing::warn!(event = event.name(), error = %e, "sim server cannot encode event");
                return;
            },
        };

        match audience {
            Audience::One(session) => {
                if let Some(state) = self.sessions.get_mut(&session) {
                    state.outbox.push_back(packet);
                }
            },
            Audience::Everyone => {
                for state in self.sessions.values_mut().filter(|s| s.socket_connected) {
                    state.outbox.push_back(packet.clone());
                }
            },
        }
    }

    fn push_socket(&mut self, session: SessionId, socket: SocketPacket) {
        match socket.into_packet() {
            Ok(packet) => {
                if let Some(state) = self.sessions.get_mut(&session) {
                    state.outbox.push_back(packet);
                }
            },
            Err(e) => tracing::warn!(session, error = %e, "sim server cannot encode packet"),
        }
    }

    /// Message history in arrival order.
    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    /// Active users in join order.
    pub fn users(&self) -> &[String] {
        &self.users
    }

    /// Every client command received, in order.
    pub fn received(&self) -> &[ClientCommand] {
        &self.received
    }

    /// Kinds of every transport accepted, in order.
    pub fn opened(&self) -> &[TransportKind] {
        &self.opened
    }

    /// Whether `session` is still open.
    pub fn is_open(&self, session: SessionId) -> bool {
        self.sessions.contains_key(&session)
    }

    /// Number of live sessions.
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Transport kind of `session`, if it is live.
    pub fn session_kind(&self, session: SessionId) -> Option<TransportKind> {
        self.sessions.get(&session).map(|s| s.kind)
    }
}
