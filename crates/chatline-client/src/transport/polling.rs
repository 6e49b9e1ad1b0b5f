//! Engine.IO over HTTP long-polling.
//!
//! A handshake GET returns the open packet and the session id. After that a
//! poller task keeps one GET outstanding for server packets and a writer task
//! POSTs client packets, batching whatever is queued into one payload.

use std::time::Duration;

use chatline_core::TransportKind;
use chatline_proto::{Packet, decode_payload, encode_payload};
use reqwest::header::CONTENT_TYPE;
use tokio::sync::mpsc;
use url::Url;

use super::{ConnectedTransport, Inbound, TransportError, engine_url};

const PAYLOAD_CONTENT_TYPE: &str = "text/plain;charset=UTF-8";

pub(super) async fn connect(endpoint: &Url) -> Result<ConnectedTransport, TransportError> {
    let http = reqwest::Client::builder()
        .build()
        .map_err(|e| TransportError::Connection(format!("http client: {e}")))?;

    let handshake_url = engine_url(endpoint, TransportKind::Polling, None)?;
    let body = get(&http, handshake_url, None).await?;
    let packets = decode_payload(&body)
        .map_err(|e| TransportError::Protocol(format!("handshake payload: {e}")))?;

    let Some(Packet::Open(handshake)) = packets.first() else {
        return Err(TransportError::Protocol("handshake did not start with open".to_string()));
    };
    let poll_url = engine_url(endpoint, TransportKind::Polling, Some(&handshake.sid))?;
    let poll_timeout = handshake.heartbeat_deadline();

    let (to_server_tx, to_server_rx) = mpsc::unbounded_channel();
    let (from_server_tx, from_server_rx) = mpsc::unbounded_channel();

    for packet in packets {
        let _ = from_server_tx.send(Inbound::Packet(packet));
    }

    let poller =
        tokio::spawn(run_poller(http.clone(), poll_url.clone(), poll_timeout, from_server_tx.clone()));
    let writer = tokio::spawn(run_writer(http, poll_url, to_server_rx, from_server_tx));

    Ok(ConnectedTransport {
        kind: TransportKind::Polling,
        to_server: to_server_tx,
        from_server: from_server_rx,
        tasks: vec![poller.abort_handle(), writer.abort_handle()],
    })
}

async fn get(
    http: &reqwest::Client,
    url: Url,
    timeout: Option<Duration>,
) -> Result<String, TransportError> {
    let mut request = http.get(url);
    if let Some(timeout) = timeout {
        request = request.timeout(timeout);
    }

    let response =
        request.send().await.map_err(|e| TransportError::Connection(format!("poll: {e}")))?;
    let status = response.status();
    if !status.is_success() {
        return Err(TransportError::Connection(format!("poll returned {status}")));
    }

    response.text().await.map_err(|e| TransportError::Connection(format!("poll body: {e}")))
}

/// Keep one GET outstanding until the server closes or a request fails.
async fn run_poller(
    http: reqwest::Client,
    url: Url,
    timeout: Duration,
    from_server: mpsc::UnboundedSender<Inbound>,
) {
    let reason = loop {
        let body = match get(&http, url.clone(), Some(timeout)).await {
            Ok(body) => body,
            Err(e) => break e.to_string(),
        };

        let packets = match decode_payload(&body) {
            Ok(packets) => packets,
            Err(e) => {
                tracing::warn!(error = %e, "dropping malformed poll payload");
                continue;
            },
        };

        let mut closed = false;
        for packet in packets {
            closed |= packet == Packet::Close;
            if from_server.send(Inbound::Packet(packet)).is_err() {
                return;
            }
        }
        if closed {
            break "closed by server".to_string();
        }
    };

    tracing::debug!(%reason, "polling transport finished");
    let _ = from_server.send(Inbound::Closed(reason));
}

/// POST queued packets, batching everything that is ready.
async fn run_writer(
    http: reqwest::Client,
    url: Url,
    mut to_server: mpsc::UnboundedReceiver<Packet>,
    from_server: mpsc::UnboundedSender<Inbound>,
) {
    while let Some(first) = to_server.recv().await {
        let mut batch = vec![first];
        while let Ok(next) = to_server.try_recv() {
            batch.push(next);
        }

        let body = match encode_payload(&batch) {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!(error = %e, "dropping unencodable batch");
                continue;
            },
        };

        let result = http
            .post(url.clone())
            .header(CONTENT_TYPE, PAYLOAD_CONTENT_TYPE)
            .body(body)
            .send()
            .await;

        let failure = match result {
            Ok(response) if response.status().is_success() => continue,
            Ok(response) => format!("post returned {}", response.status()),
            Err(e) => format!("post: {e}"),
        };
        let _ = from_server.send(Inbound::Closed(failure));
        return;
    }
}
