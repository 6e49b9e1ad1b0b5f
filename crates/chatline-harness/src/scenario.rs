//! Scripted end-to-end simulations.
//!
//! A [`Simulation`] owns one [`Runtime`] wired to a [`SimDriver`], a shared
//! [`SimServer`], and an in-memory identity store. Every step pulls one input
//! through the real runtime and then checks the invariant registry, so any
//! scenario doubles as an invariant test.

use std::time::Duration;

use chatline_app::{App, Bridge, Runtime, UserIntent};
use chatline_core::{ConnectionConfig, ConnectionState, MemoryIdentityStore, Message};
use chatline_proto::ServerEvent;

use crate::{
    invariants::{ClientSnapshot, InvariantRegistry, SystemSnapshot},
    sim_driver::{SharedSimServer, SimDriver, SimDriverError, create_shared_server},
    sim_env::SimEnv,
    sim_server::SimServer,
};

/// Steps allowed by the `run_*` helpers before they give up.
pub const DEFAULT_STEP_LIMIT: usize = 100_000;

/// One simulated client session.
pub struct Simulation {
    id: u64,
    runtime: Runtime<SimDriver, SimEnv, MemoryIdentityStore>,
    env: SimEnv,
    server: SharedSimServer,
    store: MemoryIdentityStore,
    invariants: InvariantRegistry,
    epochs: Vec<u64>,
    last_log: Option<Vec<Message>>,
    expected_users: Vec<String>,
    quit: bool,
}

impl std::fmt::Debug for Simulation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Simulation")
            .field("id", &self.id)
            .field("elapsed", &self.env.elapsed())
            .field("quit", &self.quit)
            .finish_non_exhaustive()
    }
}

impl Simulation {
    /// Client with its own server and clock.
    pub fn new(
        seed: u64,
        server: SimServer,
        store: MemoryIdentityStore,
        config: ConnectionConfig,
    ) -> Self {
        Self::attach(0, SimEnv::with_seed(seed), create_shared_server(server), store, config)
    }

    /// Client on an existing clock and server.
    pub fn attach(
        id: u64,
        env: SimEnv,
        server: SharedSimServer,
        store: MemoryIdentityStore,
        config: ConnectionConfig,
    ) -> Self {
        let driver = SimDriver::new(env.clone(), server.clone());
        let runtime = Runtime::new(driver, env.clone(), store.clone(), config);
        Self {
            id,
            runtime,
            env,
            server,
            store,
            invariants: InvariantRegistry::standard(),
            epochs: Vec::new(),
            last_log: None,
            expected_users: Vec::new(),
            quit: false,
        }
    }

    /// Another client sharing this simulation's clock and server.
    pub fn add_client(&self, id: u64, store: MemoryIdentityStore, config: ConnectionConfig) -> Self {
        Self::attach(id, self.env.clone(), self.server.clone(), store, config)
    }

    /// Check `registry` instead of the standard invariants.
    #[must_use]
    pub fn with_invariants(mut self, registry: InvariantRegistry) -> Self {
        self.invariants = registry;
        self
    }

    /// Render and start connecting.
    ///
    /// # Errors
    ///
    /// Returns an error if the driver fails.
    pub async fn start(&mut self) -> Result<(), SimDriverError> {
        self.quit = self.runtime.start().await?;
        self.check("after start");
        Ok(())
    }

    /// Process one input. Returns `true` once the runtime wants to quit.
    ///
    /// # Errors
    ///
    /// Returns an error if the driver fails.
    pub async fn step(&mut self) -> Result<bool, SimDriverError> {
        if self.quit {
            return Ok(true);
        }
        self.quit = self.runtime.process_cycle().await?;
        self.check("after step");
        Ok(self.quit)
    }

    /// Step until `done` holds. Returns whether it did.
    ///
    /// # Errors
    ///
    /// Returns an error if the driver fails.
    pub async fn run_until(
        &mut self,
        mut done: impl FnMut(&Self) -> bool,
    ) -> Result<bool, SimDriverError> {
        for _ in 0..DEFAULT_STEP_LIMIT {
            if done(self) {
                return Ok(true);
            }
            if self.step().await? {
                return Ok(done(self));
            }
        }
        Ok(done(self))
    }

    /// Step until the virtual clock has moved by `duration`.
    ///
    /// # Errors
    ///
    /// Returns an error if the driver fails.
    pub async fn run_for(&mut self, duration: Duration) -> Result<(), SimDriverError> {
        let deadline = self.env.elapsed() + duration;
        self.run_until(|sim| sim.env.elapsed() >= deadline).await?;
        Ok(())
    }

    /// Step until only clock ticks remain.
    ///
    /// # Errors
    ///
    /// Returns an error if the driver fails.
    pub async fn settle(&mut self) -> Result<(), SimDriverError> {
        self.run_until(|sim| sim.driver().is_idle()).await?;
        Ok(())
    }

    /// Step until the connection reaches `state`. Returns whether it did.
    ///
    /// # Errors
    ///
    /// Returns an error if the driver fails.
    pub async fn run_until_state(&mut self, state: ConnectionState) -> Result<bool, SimDriverError> {
        self.run_until(|sim| sim.app().connection_state() == state).await
    }

    /// Queue a user intent.
    pub fn intent(&self, intent: UserIntent) {
        self.driver().inject_intent(intent);
    }

    /// Queue a user intent and step until it and everything it caused is done.
    ///
    /// # Errors
    ///
    /// Returns an error if the driver fails.
    pub async fn perform(&mut self, intent: UserIntent) -> Result<(), SimDriverError> {
        self.intent(intent);
        self.settle().await
    }

    /// Cut the network under the open transport.
    pub fn drop_connection(&self) -> bool {
        self.driver().drop_connection()
    }

    /// Run `f` against the server.
    pub fn with_server<R>(&self, f: impl FnOnce(&mut SimServer) -> R) -> R {
        self.driver().with_server(f)
    }

    /// Dispose, disconnect, and stop the driver.
    pub async fn shutdown(&mut self) {
        self.runtime.shutdown().await;
        self.quit = true;
    }

    /// Capture the observable state of this client.
    pub fn snapshot(&self) -> ClientSnapshot {
        ClientSnapshot::capture(self.id, self.app(), self.bridge())
            .with_epoch_history(self.epochs.clone())
    }

    fn check(&mut self, context: &str) {
        self.epochs.push(self.app().epoch());

        let delivered = self.driver().take_delivered();
        let joined = self.app().joined();
        if joined {
            let latest = delivered.iter().rev().find_map(|event| match event {
                ServerEvent::ActiveUsers(users) => Some(users),
                _ => None,
            });
            if let Some(users) = latest {
                self.expected_users.clone_from(users);
            }
        } else {
            self.expected_users.clear();
        }
        let replaced = delivered.iter().any(|event| matches!(event, ServerEvent::PreviousMessages(_)));

        let client = self
            .snapshot()
            .with_log_before(self.last_log.take(), replaced)
            .with_expected_users(self.expected_users.clone())
            .with_open_transports(self.driver().open_transports());
        self.invariants
            .assert_all(&SystemSnapshot::single(client), &format!("{context} at {:?}", self.env.elapsed()));

        self.last_log = joined.then(|| self.app().messages().to_vec());
    }

    /// The application.
    pub fn app(&self) -> &App<MemoryIdentityStore> {
        self.runtime.app()
    }

    /// The connection bridge.
    pub fn bridge(&self) -> &Bridge<SimEnv> {
        self.runtime.bridge()
    }

    /// The simulation driver.
    pub fn driver(&self) -> &SimDriver {
        self.runtime.driver()
    }

    /// The identity store, shared with the application.
    pub fn store(&self) -> &MemoryIdentityStore {
        &self.store
    }

    /// The virtual clock.
    pub fn env(&self) -> &SimEnv {
        &self.env
    }

    /// Whether the runtime has quit.
    pub fn has_quit(&self) -> bool {
        self.quit
    }
}
