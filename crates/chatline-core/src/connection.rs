//! Connection manager state machine.
//!
//! Manages transport negotiation, the Engine.IO/Socket.IO handshake,
//! heartbeats, and bounded reconnection. Uses the action pattern: methods take
//! time as input and return actions for the driver to execute. This keeps the
//! state machine pure (no I/O) and makes testing straightforward.
//!
//! # State Machine
//!
//! ```text
//!                 connect()
//! ┌──────────────┐ ───────> ┌────────────┐  CONNECT ack  ┌───────────┐
//! │ Disconnected │          │ Connecting │──────────────>│ Connected │
//! └──────────────┘ <──┐     └────────────┘               └───────────┘
//!        ^            │            │ all transports failed      │ drop / ping timeout
//!        │ disconnect │            ↓                            ↓
//!        │            │     ┌──────────────┐ <──────────────────┘
//!        └────────────┴─────│ Reconnecting │───── CONNECT ack ──> Connected
//!                           └──────────────┘
//!                                  │ attempts exhausted
//!                                  ↓
//!                       ┌────────────────────────┐
//!                       │ DisconnectedPermanent  │ (terminal until connect())
//!                       └────────────────────────┘
//! ```
//!
//! Within one attempt the transports are tried in preference order: a failure
//! to open the first kind falls through to the next before the attempt counts
//! as failed.

use std::{
    fmt,
    ops::Sub,
    str::FromStr,
    time::{Duration, Instant},
};

use chatline_proto::{DEFAULT_NAMESPACE, Handshake, Packet, SocketPacket};
use serde_json::Value;

use crate::{
    backoff::Backoff,
    error::{ConnectionError, UnknownTransport},
};

/// Reconnection attempts before giving up.
pub const DEFAULT_RECONNECTION_ATTEMPTS: u32 = 5;

/// Delay before the first reconnection attempt.
pub const DEFAULT_RECONNECTION_DELAY: Duration = Duration::from_secs(1);

/// Upper bound on the delay between reconnection attempts.
pub const DEFAULT_RECONNECTION_DELAY_MAX: Duration = Duration::from_secs(5);

/// Fraction of each delay that is randomized.
pub const DEFAULT_RANDOMIZATION_FACTOR: f64 = 0.5;

/// Time allowed to open a transport and finish the namespace handshake.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(20);

/// Kind of transport carrying Engine.IO packets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportKind {
    /// Persistent bidirectional WebSocket stream
    WebSocket,
    /// HTTP long-polling
    Polling,
}

impl TransportKind {
    /// Name used in the `transport` query parameter.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::WebSocket => "websocket",
            Self::Polling => "polling",
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransportKind {
    type Err = UnknownTransport;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "websocket" | "ws" => Ok(Self::WebSocket),
            "polling" => Ok(Self::Polling),
            _ => Err(UnknownTransport(s.to_string())),
        }
    }
}

/// Observable connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No transport and no retry pending
    #[default]
    Disconnected,
    /// First connection attempt in progress
    Connecting,
    /// Namespace handshake complete, events flow
    Connected,
    /// Transport lost, retry loop running
    Reconnecting,
    /// Retries exhausted. Only a manual `connect` leaves this state.
    DisconnectedPermanent,
}

impl ConnectionState {
    /// Whether commands can reach the server.
    pub fn is_connected(self) -> bool {
        self == Self::Connected
    }

    /// Whether the retry loop has given up.
    pub fn is_terminal(self) -> bool {
        self == Self::DisconnectedPermanent
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Reconnecting => "reconnecting",
            Self::DisconnectedPermanent => "disconnected-permanent",
        })
    }
}

/// Connection configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionConfig {
    /// Transport kinds in preference order
    pub transports: Vec<TransportKind>,
    /// Reconnection attempts before giving up
    pub reconnection_attempts: u32,
    /// Delay before the first reconnection attempt
    pub reconnection_delay: Duration,
    /// Maximum delay between attempts
    pub reconnection_delay_max: Duration,
    /// Fraction of each delay that is randomized (0 disables jitter)
    pub randomization_factor: f64,
    /// Timeout for opening a transport and completing the handshake
    pub connect_timeout: Duration,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            transports: vec![TransportKind::WebSocket, TransportKind::Polling],
            reconnection_attempts: DEFAULT_RECONNECTION_ATTEMPTS,
            reconnection_delay: DEFAULT_RECONNECTION_DELAY,
            reconnection_delay_max: DEFAULT_RECONNECTION_DELAY_MAX,
            randomization_factor: DEFAULT_RANDOMIZATION_FACTOR,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}

/// Actions returned by the connection state machine.
///
/// The driver executes these in order:
/// - `Open`: Open a transport of this kind to the endpoint
/// - `Send`: Encode and send the packet over the open transport
/// - `Close`: Close the open transport
/// - `StateChanged`: Publish the new state to observers
/// - `Deliver`: Hand a server event to the inbound handler
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionAction {
    /// Open a transport
    Open {
        /// Kind to open
        kind: TransportKind,
    },

    /// Send this packet to the server
    Send(Packet),

    /// Close the transport
    Close {
        /// Reason for closing
        reason: String,
    },

    /// Observable state changed
    StateChanged(ConnectionState),

    /// Server event for the inbound handler
    Deliver {
        /// Event name
        name: String,
        /// Event arguments
        args: Vec<Value>,
    },
}

/// Where the current transport is in its lifecycle.
#[derive(Debug, Clone, Copy)]
enum Link<I> {
    /// No transport
    Down,
    /// Open requested, waiting for the Engine.IO handshake
    Opening { kind_index: usize, since: I },
    /// Engine.IO open, waiting for the namespace CONNECT ack
    Handshaking { kind_index: usize, since: I },
    /// Fully connected
    Up { kind_index: usize },
}

#[derive(Debug, Clone, Copy)]
struct Retry<I> {
    since: I,
    delay: Duration,
}

/// Connection state machine
///
/// Owns at most one transport at a time. This is a pure state machine: no I/O,
/// no clock. Time is passed as parameters to methods that need it.
///
/// Generic over `Instant` to support both real time and virtual time for
/// deterministic testing.
#[derive(Debug, Clone)]
pub struct Connection<I = Instant>
where
    I: Copy + Ord + Send + Sync + Sub<Output = Duration>,
{
    /// Observable state
    state: ConnectionState,
    /// Configuration
    config: ConnectionConfig,
    /// Delay schedule between attempts
    backoff: Backoff,
    /// Current transport
    link: Link<I>,
    /// Reconnection attempts started since the last successful connect
    attempts: u32,
    /// Pending reconnection timer
    retry: Option<Retry<I>>,
    /// Engine.IO handshake of the current transport
    handshake: Option<Handshake>,
    /// Last heartbeat from the server
    last_ping: I,
    /// Socket.IO session id assigned by the server
    sid: Option<String>,
}

impl<I> Connection<I>
where
    I: Copy + Ord + Send + Sync + Sub<Output = Duration>,
{
    /// Create a connection in [`ConnectionState::Disconnected`].
    ///
    /// `seed` feeds the reconnection jitter.
    pub fn new(now: I, config: ConnectionConfig, seed: u64) -> Self {
        let backoff = Backoff::new(
            config.reconnection_delay,
            config.reconnection_delay_max,
            config.randomization_factor,
            seed,
        );
        Self {
            state: ConnectionState::Disconnected,
            config,
            backoff,
            link: Link::Down,
            attempts: 0,
            retry: None,
            handshake: None,
            last_ping: now,
            sid: None,
        }
    }

    /// Current connection state
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Configuration in use
    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Reconnection attempts started since the last successful connect.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Transport kind currently carrying the session. `None` unless connected.
    pub fn transport(&self) -> Option<TransportKind> {
        match self.link {
            Link::Up { kind_index } => self.kind(kind_index),
            _ => None,
        }
    }

    /// Socket.IO session id. `None` unless connected.
    pub fn session_id(&self) -> Option<&str> {
        self.sid.as_deref()
    }

    /// Engine.IO handshake of the current transport.
    pub fn handshake(&self) -> Option<&Handshake> {
        self.handshake.as_ref()
    }

    /// Whether a reconnection timer is pending.
    pub fn retry_pending(&self) -> bool {
        self.retry.is_some()
    }

    fn kind(&self, index: usize) -> Option<TransportKind> {
        self.config.transports.get(index).copied()
    }

    fn transition(&mut self, next: ConnectionState) -> Vec<ConnectionAction> {
        if self.state == next {
            return Vec::new();
        }
        tracing::debug!(from = %self.state, to = %next, "connection state changed");
        self.state = next;
        vec![ConnectionAction::StateChanged(next)]
    }

    fn reset_link(&mut self) {
        self.link = Link::Down;
        self.handshake = None;
        self.sid = None;
    }

    /// Start connecting with the first preferred transport.
    ///
    /// No-op while connected or already trying. Leaves
    /// [`ConnectionState::DisconnectedPermanent`] with a fresh attempt budget.
    ///
    /// # Errors
    ///
    /// - `ConnectionError::NoTransports` if the configuration lists none
    pub fn connect(&mut self, now: I) -> Result<Vec<ConnectionAction>, ConnectionError> {
        match self.state {
            ConnectionState::Connecting
            | ConnectionState::Connected
            | ConnectionState::Reconnecting => return Ok(Vec::new()),
            ConnectionState::Disconnected | ConnectionState::DisconnectedPermanent => {},
        }

        let Some(kind) = self.kind(0) else {
            return Err(ConnectionError::NoTransports);
        };

        self.attempts = 0;
        self.retry = None;
        self.link = Link::Opening { kind_index: 0, since: now };

        let mut actions = self.transition(ConnectionState::Connecting);
        actions.push(ConnectionAction::Open { kind });
        Ok(actions)
    }

    /// Close the transport and cancel any pending retry.
    ///
    /// Safe to call repeatedly. Leaves the terminal state untouched.
    pub fn disconnect(&mut self) -> Vec<ConnectionAction> {
        self.retry = None;
        if self.state == ConnectionState::DisconnectedPermanent {
            return Vec::new();
        }

        let mut actions = Vec::new();
        match self.link {
            Link::Up { .. } => {
                match SocketPacket::disconnect().into_packet() {
                    Ok(packet) => actions.push(ConnectionAction::Send(packet)),
                    Err(e) => tracing::warn!(error = %e, "failed to encode disconnect"),
                }
                actions.push(ConnectionAction::Close { reason: "client disconnect".to_string() });
            },
            Link::Opening { .. } | Link::Handshaking { .. } => {
                actions.push(ConnectionAction::Close { reason: "client disconnect".to_string() });
            },
            Link::Down => {},
        }

        self.reset_link();
        self.attempts = 0;
        actions.extend(self.transition(ConnectionState::Disconnected));
        actions
    }

    /// Process an incoming Engine.IO packet.
    ///
    /// # Errors
    ///
    /// - `ConnectionError::UnexpectedPacket` if the packet is invalid for the
    ///   current transport phase
    /// - `ConnectionError::Protocol` if an embedded Socket.IO packet is
    ///   malformed
    pub fn handle_packet(
        &mut self,
        packet: Packet,
        now: I,
    ) -> Result<Vec<ConnectionAction>, ConnectionError> {
        match (self.link, packet) {
            (Link::Opening { kind_index, .. }, Packet::Open(handshake)) => {
                tracing::debug!(
                    sid = %handshake.sid,
                    ping_interval = handshake.ping_interval,
                    ping_timeout = handshake.ping_timeout,
                    "transport open"
                );
                self.handshake = Some(handshake);
                self.last_ping = now;
                self.link = Link::Handshaking { kind_index, since: now };

                let connect = SocketPacket::connect().into_packet()?;
                Ok(vec![ConnectionAction::Send(connect)])
            },

            (Link::Down | Link::Opening { .. }, packet) => {
                Err(ConnectionError::UnexpectedPacket {
                    state: self.state,
                    packet: packet.packet_type(),
                })
            },

            (_, Packet::Ping) => {
                self.last_ping = now;
                Ok(vec![ConnectionAction::Send(Packet::Pong)])
            },

            (_, Packet::Pong | Packet::Noop) => Ok(Vec::new()),

            (_, Packet::Close) => Ok(self.transport_closed("server closed transport", now)),

            (Link::Handshaking { kind_index, .. }, Packet::Message(data)) => {
                self.handle_handshake_message(kind_index, &data, now)
            },

            (Link::Up { .. }, Packet::Message(data)) => self.handle_session_message(&data),

            (_, packet @ (Packet::Open(_) | Packet::Upgrade)) => {
                Err(ConnectionError::UnexpectedPacket {
                    state: self.state,
                    packet: packet.packet_type(),
                })
            },
        }
    }

    fn handle_handshake_message(
        &mut self,
        kind_index: usize,
        data: &str,
        now: I,
    ) -> Result<Vec<ConnectionAction>, ConnectionError> {
        let socket = SocketPacket::decode(data)?;
        let sid = socket.connect_sid().map(str::to_string);

        match socket {
            SocketPacket::Connect { .. } => {
                self.link = Link::Up { kind_index };
                self.sid = sid;
                self.attempts = 0;
                self.retry = None;
                self.last_ping = now;

                tracing::info!(
                    transport = ?self.kind(kind_index),
                    sid = ?self.sid,
                    "connected"
                );
                Ok(self.transition(ConnectionState::Connected))
            },
            SocketPacket::ConnectError { message, .. } => {
                tracing::warn!(%message, "server refused namespace connect");
                let mut actions = vec![ConnectionAction::Close {
                    reason: ConnectionError::Refused(message).to_string(),
                }];
                actions.extend(self.attempt_failed(now));
                Ok(actions)
            },
            other => Err(ConnectionError::Protocol(format!(
                "expected CONNECT ack during handshake, got {other:?}"
            ))),
        }
    }

    fn handle_session_message(
        &mut self,
        data: &str,
    ) -> Result<Vec<ConnectionAction>, ConnectionError> {
        let socket = SocketPacket::decode(data)?;

        if socket.namespace() != DEFAULT_NAMESPACE {
            tracing::debug!(namespace = socket.namespace(), "ignoring packet for other namespace");
            return Ok(Vec::new());
        }

        match socket {
            SocketPacket::Event { name, args, .. } => {
                Ok(vec![ConnectionAction::Deliver { name, args }])
            },
            SocketPacket::Disconnect { .. } => {
                // Server-initiated disconnects are deliberate, so no retry
                tracing::info!("server closed the session");
                self.reset_link();
                self.retry = None;
                let mut actions =
                    vec![ConnectionAction::Close { reason: "server disconnect".to_string() }];
                actions.extend(self.transition(ConnectionState::Disconnected));
                Ok(actions)
            },
            other => {
                tracing::debug!(packet = ?other, "ignoring socket packet");
                Ok(Vec::new())
            },
        }
    }

    /// The driver could not open the requested transport, or it died before
    /// the handshake finished.
    ///
    /// Falls through to the next preferred kind. When none is left the whole
    /// attempt fails.
    pub fn transport_failed(&mut self, reason: &str, now: I) -> Vec<ConnectionAction> {
        match self.link {
            Link::Opening { kind_index, .. } | Link::Handshaking { kind_index, .. } => {
                tracing::warn!(transport = ?self.kind(kind_index), %reason, "transport failed");

                let next = kind_index + 1;
                if let Some(kind) = self.kind(next) {
                    self.handshake = None;
                    self.link = Link::Opening { kind_index: next, since: now };
                    return vec![ConnectionAction::Open { kind }];
                }
                self.attempt_failed(now)
            },
            Link::Up { .. } => self.transport_closed(reason, now),
            Link::Down => Vec::new(),
        }
    }

    /// The open transport closed underneath us.
    pub fn transport_closed(&mut self, reason: &str, now: I) -> Vec<ConnectionAction> {
        match self.link {
            Link::Opening { .. } | Link::Handshaking { .. } => self.transport_failed(reason, now),
            Link::Up { .. } => {
                tracing::warn!(%reason, "connection lost");
                self.attempt_failed(now)
            },
            Link::Down => Vec::new(),
        }
    }

    fn attempt_failed(&mut self, now: I) -> Vec<ConnectionAction> {
        self.reset_link();

        if self.attempts >= self.config.reconnection_attempts {
            self.retry = None;
            tracing::warn!(
                error = %ConnectionError::Exhausted { attempts: self.attempts },
                "giving up"
            );
            return self.transition(ConnectionState::DisconnectedPermanent);
        }

        self.schedule_retry(now);
        self.transition(ConnectionState::Reconnecting)
    }

    fn schedule_retry(&mut self, now: I) {
        let delay = self.backoff.delay(self.attempts);
        tracing::debug!(attempt = self.attempts + 1, ?delay, "reconnect scheduled");
        self.retry = Some(Retry { since: now, delay });
    }

    /// Process periodic maintenance (timeouts, heartbeats, retry timer).
    ///
    /// Call this periodically. Resolution of the timers equals the tick
    /// interval.
    pub fn tick(&mut self, now: I) -> Vec<ConnectionAction> {
        match self.link {
            Link::Opening { since, .. } | Link::Handshaking { since, .. } => {
                let elapsed = now - since;
                if elapsed <= self.config.connect_timeout {
                    return Vec::new();
                }
                let reason = ConnectionError::ConnectTimeout { elapsed }.to_string();
                let mut actions = vec![ConnectionAction::Close { reason: reason.clone() }];
                actions.extend(self.transport_failed(&reason, now));
                actions
            },
            Link::Up { .. } => {
                let Some(deadline) = self.handshake.as_ref().map(Handshake::heartbeat_deadline)
                else {
                    return Vec::new();
                };
                let elapsed = now - self.last_ping;
                if elapsed <= deadline {
                    return Vec::new();
                }
                let reason = ConnectionError::PingTimeout { elapsed }.to_string();
                let mut actions = vec![ConnectionAction::Close { reason: reason.clone() }];
                actions.extend(self.transport_closed(&reason, now));
                actions
            },
            Link::Down => {
                let Some(retry) = self.retry else {
                    return Vec::new();
                };
                if now - retry.since < retry.delay {
                    return Vec::new();
                }
                let Some(kind) = self.kind(0) else {
                    return Vec::new();
                };

                self.retry = None;
                self.attempts += 1;
                self.link = Link::Opening { kind_index: 0, since: now };
                tracing::info!(
                    attempt = self.attempts,
                    max = self.config.reconnection_attempts,
                    transport = %kind,
                    "reconnecting"
                );
                vec![ConnectionAction::Open { kind }]
            },
        }
    }
}
