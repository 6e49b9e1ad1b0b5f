//! Stdio driver for the CLI.
//!
//! Implements the [`Driver`] trait over stdin lines, a tokio interval for
//! timers, and the production transports from `chatline-client`. Output goes
//! to stdout through the [`Renderer`].

use std::{
    io::{self, Stdout, Write},
    time::{Duration, Instant},
};

use chatline_app::{App, Driver, DriverInput, TransportEvent};
use chatline_client::{ConnectedTransport, Inbound, TransportError, transport};
use chatline_core::{IdentityStore, TransportKind};
use chatline_proto::Packet;
use tokio::{
    io::{AsyncBufReadExt, BufReader, Lines, Stdin},
    task::{JoinError, JoinHandle},
    time::{Interval, MissedTickBehavior},
};
use url::Url;

use crate::{
    CliError, Renderer,
    input::{HELP, LineInput, parse_line},
};

type Opened = Result<ConnectedTransport, TransportError>;
type Opening = JoinHandle<Opened>;

enum Ready {
    Line(io::Result<Option<String>>),
    Tick,
    Opened(Result<Opened, JoinError>),
    Inbound(Option<Inbound>),
}

/// Driver reading commands from stdin and printing to stdout.
///
/// At most one transport exists at a time. Opening a new one or closing
/// drops the previous transport together with its channels, so nothing from
/// a stale transport reaches the runtime.
pub struct StdioDriver {
    endpoint: Url,
    lines: Lines<BufReader<Stdin>>,
    stdin_open: bool,
    ticker: Interval,
    opening: Option<Opening>,
    transport: Option<ConnectedTransport>,
    renderer: Renderer,
    out: Stdout,
}

impl StdioDriver {
    /// Create a driver for the chat server at `endpoint`.
    ///
    /// Must be called inside a tokio runtime.
    pub fn new(endpoint: Url, tick: Duration) -> Self {
        let mut ticker = tokio::time::interval(tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        Self {
            endpoint,
            lines: BufReader::new(tokio::io::stdin()).lines(),
            stdin_open: true,
            ticker,
            opening: None,
            transport: None,
            renderer: Renderer::new(),
            out: io::stdout(),
        }
    }

    /// Whether a transport is open.
    pub fn is_connected(&self) -> bool {
        self.transport.is_some()
    }

    fn drop_transport(&mut self) {
        if let Some(opening) = self.opening.take() {
            opening.abort();
        }
        if let Some(transport) = self.transport.take() {
            transport.stop();
        }
    }

    fn print_help(&mut self) -> Result<(), CliError> {
        writeln!(self.out, "-- {HELP}")?;
        self.out.flush()?;
        Ok(())
    }
}

async fn opened(opening: &mut Option<Opening>) -> Result<Opened, JoinError> {
    match opening {
        Some(handle) => handle.await,
        None => std::future::pending().await,
    }
}

async fn inbound(transport: &mut Option<ConnectedTransport>) -> Option<Inbound> {
    match transport {
        Some(transport) => transport.from_server.recv().await,
        None => std::future::pending().await,
    }
}

impl Driver for StdioDriver {
    type Error = CliError;
    type Instant = Instant;

    async fn next_input(&mut self) -> Result<Option<DriverInput>, Self::Error> {
        loop {
            let ready = tokio::select! {
                // Transport first so server traffic is never starved by typing
                biased;

                event = inbound(&mut self.transport) => Ready::Inbound(event),
                result = opened(&mut self.opening) => Ready::Opened(result),
                line = self.lines.next_line(), if self.stdin_open => Ready::Line(line),
                _ = self.ticker.tick() => Ready::Tick,
            };

            match ready {
                Ready::Inbound(Some(Inbound::Packet(packet))) => {
                    return Ok(Some(DriverInput::Transport(TransportEvent::Packet(packet))));
                },
                Ready::Inbound(closed) => {
                    self.transport = None;
                    let reason = match closed {
                        Some(Inbound::Closed(reason)) => reason,
                        _ => "transport channel closed".to_string(),
                    };
                    return Ok(Some(DriverInput::Transport(TransportEvent::Closed { reason })));
                },
                Ready::Opened(result) => {
                    self.opening = None;
                    match result {
                        Ok(Ok(transport)) => {
                            tracing::debug!(kind = %transport.kind(), "transport open");
                            self.transport = Some(transport);
                        },
                        Ok(Err(e)) => {
                            let reason = e.to_string();
                            return Ok(Some(DriverInput::Transport(TransportEvent::Failed { reason })));
                        },
                        Err(e) if e.is_cancelled() => {},
                        Err(e) => {
                            let reason = format!("transport task failed: {e}");
                            return Ok(Some(DriverInput::Transport(TransportEvent::Failed { reason })));
                        },
                    }
                },
                Ready::Line(Ok(Some(line))) => match parse_line(&line) {
                    LineInput::Intent(intent) => return Ok(Some(DriverInput::Intent(intent))),
                    LineInput::Help => self.print_help()?,
                    LineInput::Nothing => {},
                },
                Ready::Line(Ok(None)) => {
                    tracing::debug!("stdin closed");
                    self.stdin_open = false;
                    return Ok(None);
                },
                Ready::Line(Err(e)) => return Err(e.into()),
                Ready::Tick => return Ok(Some(DriverInput::Tick)),
            }
        }
    }

    async fn open_transport(&mut self, kind: TransportKind) -> Result<(), Self::Error> {
        self.drop_transport();

        let endpoint = self.endpoint.clone();
        self.opening = Some(tokio::spawn(async move { transport::connect(kind, &endpoint).await }));
        Ok(())
    }

    async fn send_packet(&mut self, packet: Packet) -> Result<(), Self::Error> {
        match &self.transport {
            Some(transport) => {
                if !transport.send(packet) {
                    tracing::debug!("transport gone, packet dropped");
                }
            },
            None => tracing::debug!("no transport, packet dropped"),
        }
        Ok(())
    }

    fn close_transport(&mut self, reason: &str) {
        tracing::debug!(%reason, "closing transport");
        self.drop_transport();
    }

    fn now(&self) -> Self::Instant {
        Instant::now()
    }

    fn render<S: IdentityStore>(&mut self, app: &App<S>) -> Result<(), Self::Error> {
        self.renderer.render(app, &mut self.out)?;
        Ok(())
    }

    fn stop(&mut self) {
        self.drop_transport();
        let _ = self.out.flush();
    }
}

impl Drop for StdioDriver {
    fn drop(&mut self) {
        self.stop();
    }
}
