//! Engine.IO transports for the client.
//!
//! Provides [`ConnectedTransport`] which moves Engine.IO packets between the
//! runtime and the server. This is a thin layer that only frames and ships
//! packets. Handshake, heartbeat, and reconnection logic remain in the sans-IO
//! [`chatline_core::Connection`].

mod polling;
mod websocket;

use chatline_core::TransportKind;
use chatline_proto::{Packet, packet::PROTOCOL_VERSION};
use thiserror::Error;
use tokio::{sync::mpsc, task::AbortHandle};
use url::Url;

/// Path the Engine.IO server listens on.
pub const ENGINE_PATH: &str = "socket.io/";

/// Transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Endpoint URL cannot be used.
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// Connection failed.
    #[error("connection failed: {0}")]
    Connection(String),

    /// Server answered with something that is not Engine.IO.
    #[error("protocol error: {0}")]
    Protocol(String),
}

/// Something that came off the wire.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// A decoded packet
    Packet(Packet),
    /// The transport is gone. Nothing follows.
    Closed(String),
}

/// Handle to an open transport.
///
/// Packets are sent and received via the channels, and internal tasks handle
/// the I/O. Dropping the handle stops the tasks.
#[derive(Debug)]
pub struct ConnectedTransport {
    kind: TransportKind,
    /// Send packets to the server.
    pub to_server: mpsc::UnboundedSender<Packet>,
    /// Receive packets from the server.
    pub from_server: mpsc::UnboundedReceiver<Inbound>,
    /// Abort handles of the I/O tasks.
    tasks: Vec<AbortHandle>,
}

impl ConnectedTransport {
    /// Kind of this transport.
    pub fn kind(&self) -> TransportKind {
        self.kind
    }

    /// Queue a packet. Returns `false` if the transport is already gone.
    pub fn send(&self, packet: Packet) -> bool {
        self.to_server.send(packet).is_ok()
    }

    /// Stop the transport tasks.
    pub fn stop(&self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

impl Drop for ConnectedTransport {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Open a transport of `kind` to the Engine.IO server at `endpoint`.
///
/// Returns once the transport is open. The server's open packet is the first
/// thing delivered on `from_server`.
///
/// # Errors
///
/// - `TransportError::InvalidEndpoint` if the URL cannot be adapted to `kind`
/// - `TransportError::Connection` if the server is unreachable or refuses
/// - `TransportError::Protocol` if the polling handshake is not Engine.IO
pub async fn connect(
    kind: TransportKind,
    endpoint: &Url,
) -> Result<ConnectedTransport, TransportError> {
    tracing::debug!(%kind, %endpoint, "opening transport");
    match kind {
        TransportKind::WebSocket => websocket::connect(endpoint).await,
        TransportKind::Polling => polling::connect(endpoint).await,
    }
}

/// Engine.IO URL for `kind`, optionally bound to an established `sid`.
///
/// `http://host:port` becomes `ws://host:port/socket.io/?EIO=4&transport=websocket`
/// for WebSocket, keeping any path prefix and query already present.
///
/// # Errors
///
/// - `TransportError::InvalidEndpoint` for schemes other than http(s)/ws(s)
pub fn engine_url(
    endpoint: &Url,
    kind: TransportKind,
    sid: Option<&str>,
) -> Result<Url, TransportError> {
    let mut url = endpoint.clone();

    let scheme = match (kind, endpoint.scheme()) {
        (TransportKind::WebSocket, "http" | "ws") => "ws",
        (TransportKind::WebSocket, "https" | "wss") => "wss",
        (TransportKind::Polling, "http" | "ws") => "http",
        (TransportKind::Polling, "https" | "wss") => "https",
        (_, other) => {
            return Err(TransportError::InvalidEndpoint(format!("unsupported scheme {other:?}")));
        },
    };
    url.set_scheme(scheme)
        .map_err(|()| TransportError::InvalidEndpoint(format!("cannot use scheme {scheme}")))?;

    let prefix = url.path().trim_end_matches('/');
    let path = if prefix.ends_with(ENGINE_PATH.trim_end_matches('/')) {
        format!("{prefix}/")
    } else {
        format!("{prefix}/{ENGINE_PATH}")
    };
    url.set_path(&path);

    {
        let mut query = url.query_pairs_mut();
        query.append_pair("EIO", &PROTOCOL_VERSION.to_string());
        query.append_pair("transport", kind.as_str());
        if let Some(sid) = sid {
            query.append_pair("sid", sid);
        }
    }

    Ok(url)
}
