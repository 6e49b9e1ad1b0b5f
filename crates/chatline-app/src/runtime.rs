//! Generic runtime for application orchestration.
//!
//! The Runtime drives the application event loop, coordinating between:
//! - [`App`]: Session state machine
//! - [`Bridge`]: Connection bridge
//! - [`Driver`]: Platform-specific I/O
//!
//! Inputs are handled one at a time. Every transition an input causes runs to
//! completion before the next input is pulled, so session state is only ever
//! touched from this loop.

use std::collections::VecDeque;

use chatline_core::{ConnectionConfig, Environment, IdentityStore};

use crate::{App, AppAction, AppEvent, Bridge, Driver, DriverInput, TransportEvent, TransportOp};

/// Generic runtime that orchestrates App, Bridge, and Driver.
///
/// # Type Parameters
///
/// - `D`: Platform-specific I/O driver
/// - `E`: Environment for time and randomness
/// - `S`: Identity store
pub struct Runtime<D, E, S>
where
    D: Driver,
    E: Environment,
    S: IdentityStore,
{
    driver: D,
    app: App<S>,
    bridge: Bridge<E>,
}

impl<D, E, S> Runtime<D, E, S>
where
    D: Driver<Instant = E::Instant>,
    E: Environment,
    S: IdentityStore,
{
    /// Create a new runtime. Loads the persisted identity from `store`.
    pub fn new(driver: D, env: E, store: S, config: ConnectionConfig) -> Self {
        let app = App::new(store);
        let bridge = Bridge::new(env, config);
        Self { driver, app, bridge }
    }

    /// Run the main event loop until quit or input exhaustion.
    ///
    /// # Errors
    ///
    /// Returns an error if the driver encounters an I/O error.
    pub async fn run(mut self) -> Result<(), D::Error> {
        let result = self.drive().await;
        self.shutdown().await;
        result
    }

    async fn drive(&mut self) -> Result<(), D::Error> {
        if self.start().await? {
            return Ok(());
        }
        while !self.process_cycle().await? {}
        Ok(())
    }

    /// Render once and start connecting.
    ///
    /// Returns `true` if the application should quit.
    ///
    /// # Errors
    ///
    /// Returns an error if the driver encounters an I/O error.
    pub async fn start(&mut self) -> Result<bool, D::Error> {
        self.driver.render(&self.app)?;
        let actions = self.app.connect();
        self.process_actions(actions).await
    }

    /// Pull one input from the driver and run everything it causes.
    ///
    /// Returns `true` if the application should quit.
    ///
    /// # Errors
    ///
    /// Returns an error if the driver encounters an I/O error.
    pub async fn process_cycle(&mut self) -> Result<bool, D::Error> {
        let Some(input) = self.driver.next_input().await? else {
            tracing::debug!("input closed");
            return Ok(true);
        };

        let events = match input {
            DriverInput::Intent(intent) => vec![AppEvent::Intent(intent)],
            DriverInput::Transport(TransportEvent::Packet(packet)) => {
                self.bridge.handle_packet(packet)
            },
            DriverInput::Transport(TransportEvent::Failed { reason }) => {
                self.bridge.transport_failed(&reason)
            },
            DriverInput::Transport(TransportEvent::Closed { reason }) => {
                self.bridge.transport_closed(&reason)
            },
            DriverInput::Tick => {
                let now = self.driver.now();
                let mut events = self.bridge.handle_tick(now);
                events.push(AppEvent::Tick);
                events
            },
        };

        self.flush_transport().await?;
        self.process_events(events).await
    }

    /// Apply events to the App until no follow-up work remains.
    async fn process_events(&mut self, events: Vec<AppEvent>) -> Result<bool, D::Error> {
        let mut pending: VecDeque<AppEvent> = events.into();
        let mut quit = false;

        // Drain fully even after Quit so the App sees the final disconnect
        while let Some(event) = pending.pop_front() {
            let actions = self.app.handle(event);
            for action in actions {
                match action {
                    AppAction::Render => self.driver.render(&self.app)?,
                    AppAction::Quit => quit = true,
                    AppAction::Connect | AppAction::Disconnect | AppAction::Emit(_) => {
                        pending.extend(self.bridge.process_app_action(action));
                        self.flush_transport().await?;
                    },
                }
            }
        }

        Ok(quit)
    }

    /// Process actions returned by the App.
    ///
    /// Returns `true` if should quit.
    async fn process_actions(&mut self, actions: Vec<AppAction>) -> Result<bool, D::Error> {
        let mut events = Vec::new();
        let mut quit = false;
        for action in actions {
            match action {
                AppAction::Render => self.driver.render(&self.app)?,
                AppAction::Quit => quit = true,
                AppAction::Connect | AppAction::Disconnect | AppAction::Emit(_) => {
                    events.extend(self.bridge.process_app_action(action));
                },
            }
        }
        self.flush_transport().await?;
        Ok(self.process_events(events).await? || quit)
    }

    /// Execute pending transport operations in order.
    async fn flush_transport(&mut self) -> Result<(), D::Error> {
        for op in self.bridge.take_outgoing() {
            match op {
                TransportOp::Open(kind) => self.driver.open_transport(kind).await?,
                TransportOp::Send(packet) => self.driver.send_packet(packet).await?,
                TransportOp::Close { reason } => self.driver.close_transport(&reason),
            }
        }
        Ok(())
    }

    /// Dispose the inbound handler, disconnect, and stop the driver.
    ///
    /// Safe to call more than once.
    pub async fn shutdown(&mut self) {
        self.app.dispose();

        let events = self.bridge.process_app_action(AppAction::Disconnect);
        for event in events {
            // Only connection notices remain; their actions are moot now
            let _ = self.app.handle(event);
        }
        if let Err(e) = self.flush_transport().await {
            tracing::warn!(error = %e, "failed to flush transport during shutdown");
        }

        self.driver.stop();
        tracing::debug!("runtime stopped");
    }

    /// Get a reference to the App
    pub fn app(&self) -> &App<S> {
        &self.app
    }

    /// Get a reference to the Bridge
    pub fn bridge(&self) -> &Bridge<E> {
        &self.bridge
    }

    /// Get a reference to the Driver
    pub fn driver(&self) -> &D {
        &self.driver
    }
}
