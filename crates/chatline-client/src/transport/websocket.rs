//! Engine.IO over WebSocket. One text frame per packet.

use chatline_core::TransportKind;
use chatline_proto::Packet;
use futures::{SinkExt, StreamExt};
use tokio::{net::TcpStream, sync::mpsc};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};
use url::Url;

use super::{ConnectedTransport, Inbound, TransportError, engine_url};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub(super) async fn connect(endpoint: &Url) -> Result<ConnectedTransport, TransportError> {
    let url = engine_url(endpoint, TransportKind::WebSocket, None)?;

    let (ws, _response) = connect_async(url.as_str())
        .await
        .map_err(|e| TransportError::Connection(format!("websocket connect: {e}")))?;

    let (to_server_tx, to_server_rx) = mpsc::unbounded_channel();
    let (from_server_tx, from_server_rx) = mpsc::unbounded_channel();

    let handle = tokio::spawn(run_websocket(ws, to_server_rx, from_server_tx));

    Ok(ConnectedTransport {
        kind: TransportKind::WebSocket,
        to_server: to_server_tx,
        from_server: from_server_rx,
        tasks: vec![handle.abort_handle()],
    })
}

/// Pump packets between the channels and the socket until either side ends.
async fn run_websocket(
    ws: WsStream,
    mut to_server: mpsc::UnboundedReceiver<Packet>,
    from_server: mpsc::UnboundedSender<Inbound>,
) {
    let (mut ws_tx, mut ws_rx) = ws.split();

    let reason = loop {
        tokio::select! {
            packet = to_server.recv() => {
                let Some(packet) = packet else {
                    let _ = ws_tx.send(Message::Close(None)).await;
                    break "closed by client".to_string();
                };
                let text = match packet.encode() {
                    Ok(text) => text,
                    Err(e) => {
                        tracing::warn!(error = %e, "dropping unencodable packet");
                        continue;
                    },
                };
                if let Err(e) = ws_tx.send(Message::text(text)).await {
                    break format!("websocket send: {e}");
                }
            }
            message = ws_rx.next() => {
                match message {
                    Some(Ok(Message::Text(text))) => match Packet::decode(text.as_str()) {
                        Ok(packet) => {
                            if from_server.send(Inbound::Packet(packet)).is_err() {
                                break "receiver dropped".to_string();
                            }
                        },
                        Err(e) => tracing::warn!(error = %e, "dropping malformed frame"),
                    },
                    Some(Ok(Message::Close(frame))) => {
                        break frame.map_or_else(
                            || "closed by server".to_string(),
                            |frame| format!("closed by server: {}", frame.reason),
                        );
                    },
                    Some(Ok(_)) => {},
                    Some(Err(e)) => break format!("websocket receive: {e}"),
                    None => break "websocket stream ended".to_string(),
                }
            }
        }
    };

    tracing::debug!(%reason, "websocket transport finished");
    let _ = from_server.send(Inbound::Closed(reason));
}
