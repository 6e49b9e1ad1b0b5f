//! Simulation driver implementing the Driver trait.
//!
//! `SimDriver` provides the same interface as the CLI's `StdioDriver` but for
//! deterministic testing. It implements [`Driver`] so the same
//! [`chatline_app::Runtime`] orchestration code runs in both production and
//! simulation.
//!
//! Inputs come from three places, in this order of priority: transport
//! events already queued, packets the [`SimServer`] has for the open session,
//! and scripted user intents. When all three are empty the driver advances
//! the virtual clock by one tick.

#![allow(clippy::disallowed_types, reason = "Synchronous locking operations only")]

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use chatline_app::{App, Driver, DriverInput, TransportEvent, UserIntent};
use chatline_core::{Environment, IdentityStore, TransportKind};
use chatline_proto::{Packet, ServerEvent, SocketPacket};
use thiserror::Error;

use crate::{
    sim_env::{SimEnv, SimInstant},
    sim_server::{SessionId, SimServer},
};

/// Server shared between the driver and the test.
pub type SharedSimServer = Arc<Mutex<SimServer>>;

/// Wrap a server for sharing.
pub fn create_shared_server(server: SimServer) -> SharedSimServer {
    Arc::new(Mutex::new(server))
}

/// Virtual time per idle tick.
pub const IDLE_TICK: Duration = Duration::from_millis(100);

/// Error type for simulation driver.
#[derive(Debug, Clone, Error)]
#[error("sim driver: {0}")]
pub struct SimDriverError(pub String);

/// Shared state for input injection.
#[derive(Debug, Default)]
struct SharedState {
    pending: VecDeque<DriverInput>,
    intents: VecDeque<UserIntent>,
    session: Option<SessionId>,
    opened: Vec<SessionId>,
    sent: Vec<Packet>,
    delivered: Vec<ServerEvent>,
    closes: Vec<String>,
    renders: usize,
    render_failure: Option<String>,
    input_closed: bool,
}

/// Simulation driver for deterministic testing.
///
/// Clones of the server handle and the environment are shared with the test,
/// so the test can script the network while the runtime owns the driver.
#[derive(Debug)]
pub struct SimDriver {
    env: SimEnv,
    server: SharedSimServer,
    state: Arc<Mutex<SharedState>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl SimDriver {
    /// Create a driver talking to `server` on the clock of `env`.
    pub fn new(env: SimEnv, server: SharedSimServer) -> Self {
        Self { env, server, state: Arc::new(Mutex::new(SharedState::default())) }
    }

    /// Queue a user intent.
    pub fn inject_intent(&self, intent: UserIntent) {
        lock(&self.state).intents.push_back(intent);
    }

    /// Make the input side report exhaustion once scripted intents run out.
    pub fn close_input(&self) {
        lock(&self.state).input_closed = true;
    }

    /// Make every following render fail with `reason`.
    pub fn fail_renders(&self, reason: impl Into<String>) {
        lock(&self.state).render_failure = Some(reason.into());
    }

    /// Cut the open transport as a network failure would.
    ///
    /// The server sees the session close and the runtime sees
    /// [`TransportEvent::Closed`]. Returns `false` if nothing was open.
    pub fn drop_connection(&self) -> bool {
        let mut state = lock(&self.state);
        let Some(session) = state.session.take() else {
            return false;
        };
        state.pending.push_back(DriverInput::Transport(TransportEvent::Closed {
            reason: "connection dropped".to_string(),
        }));
        drop(state);

        lock(&self.server).close(session);
        true
    }

    /// Session id of the open transport on the server.
    pub fn session(&self) -> Option<SessionId> {
        lock(&self.state).session
    }

    /// Whether a transport is open.
    pub fn is_connected(&self) -> bool {
        self.session().is_some()
    }

    /// Transports this driver opened that the server still holds.
    pub fn open_transports(&self) -> usize {
        let opened = lock(&self.state).opened.clone();
        let server = lock(&self.server);
        opened.into_iter().filter(|&id| server.is_open(id)).count()
    }

    /// Whether nothing but clock ticks remain.
    pub fn is_idle(&self) -> bool {
        let (pending, session) = {
            let state = lock(&self.state);
            (!state.pending.is_empty() || !state.intents.is_empty(), state.session)
        };
        if pending {
            return false;
        }
        session.is_none_or(|id| !lock(&self.server).has_outgoing(id))
    }

    /// Take every packet sent to the server so far.
    pub fn take_sent(&self) -> Vec<Packet> {
        std::mem::take(&mut lock(&self.state).sent)
    }

    /// Reasons of every transport close the runtime asked for.
    pub fn closes(&self) -> Vec<String> {
        lock(&self.state).closes.clone()
    }

    /// Number of renders so far.
    pub fn renders(&self) -> usize {
        lock(&self.state).renders
    }

    /// Take every server event handed to the runtime since the last call.
    pub fn take_delivered(&self) -> Vec<ServerEvent> {
        std::mem::take(&mut lock(&self.state).delivered)
    }

    /// Run `f` against the server.
    pub fn with_server<R>(&self, f: impl FnOnce(&mut SimServer) -> R) -> R {
        f(&mut lock(&self.server))
    }

    /// The virtual clock.
    pub fn env(&self) -> &SimEnv {
        &self.env
    }

    fn next_packet(&self) -> Option<DriverInput> {
        let session = lock(&self.state).session?;
        let packets = lock(&self.server).drain(session);
        if packets.is_empty() {
            return None;
        }

        let mut state = lock(&self.state);
        state
            .pending
            .extend(packets.into_iter().map(|p| DriverInput::Transport(TransportEvent::Packet(p))));
        state.pending.pop_front()
    }

    fn record_delivery(&self, input: &DriverInput) {
        let DriverInput::Transport(TransportEvent::Packet(packet)) = input else {
            return;
        };
        let Some(Ok(SocketPacket::Event { name, args, .. })) = SocketPacket::from_packet(packet) else {
            return;
        };
        if let Ok(Some(event)) = ServerEvent::decode(&name, &args) {
            lock(&self.state).delivered.push(event);
        }
    }
}

impl Driver for SimDriver {
    type Error = SimDriverError;
    type Instant = SimInstant;

    async fn next_input(&mut self) -> Result<Option<DriverInput>, Self::Error> {
        let queued = lock(&self.state).pending.pop_front();
        if let Some(input) = queued.or_else(|| self.next_packet()) {
            self.record_delivery(&input);
            return Ok(Some(input));
        }

        {
            let mut state = lock(&self.state);
            if let Some(intent) = state.intents.pop_front() {
                return Ok(Some(DriverInput::Intent(intent)));
            }
            if state.input_closed {
                return Ok(None);
            }
        }

        self.env.advance(IDLE_TICK);
        lock(&self.server).tick(self.env.elapsed());
        Ok(Some(DriverInput::Tick))
    }

    async fn open_transport(&mut self, kind: TransportKind) -> Result<(), Self::Error> {
        self.close_transport("replaced");

        let opened = lock(&self.server).open(kind, self.env.elapsed());
        let mut state = lock(&self.state);
        match opened {
            Ok(session) => {
                state.session = Some(session);
                state.opened.push(session);
            },
            Err(reason) => {
                state.pending.push_back(DriverInput::Transport(TransportEvent::Failed { reason }));
            },
        }
        Ok(())
    }

    async fn send_packet(&mut self, packet: Packet) -> Result<(), Self::Error> {
        let session = {
            let mut state = lock(&self.state);
            state.sent.push(packet.clone());
            state.session
        };
        match session {
            Some(session) => lock(&self.server).receive(session, packet),
            None => tracing::debug!("no transport, packet dropped"),
        }
        Ok(())
    }

    fn close_transport(&mut self, reason: &str) {
        let session = {
            let mut state = lock(&self.state);
            let session = state.session.take();
            if session.is_some() {
                state.closes.push(reason.to_string());
            }
            session
        };
        if let Some(session) = session {
            lock(&self.server).close(session);
        }
    }

    fn now(&self) -> SimInstant {
        self.env.now()
    }

    fn render<S: IdentityStore>(&mut self, _app: &App<S>) -> Result<(), Self::Error> {
        let mut state = lock(&self.state);
        state.renders += 1;
        match &state.render_failure {
            Some(reason) => Err(SimDriverError(reason.clone())),
            None => Ok(()),
        }
    }

    fn stop(&mut self) {
        self.close_transport("stopped");
    }
}
