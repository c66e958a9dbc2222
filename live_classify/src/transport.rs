//! WebSocket transport task. Owns the socket, reconnects with a fixed delay,
//! and talks to the connection manager only through channels.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

/// Frames are fire-and-forget; a full queue means the link is stuck.
const OUTBOUND_CAPACITY: usize = 4;
const INBOUND_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum TransportEvent {
    Up,
    Down,
    Text(String),
}

pub(crate) struct TransportLink {
    pub outbound: mpsc::Sender<String>,
    pub inbound: mpsc::Receiver<TransportEvent>,
    pub task: JoinHandle<()>,
}

enum PumpExit {
    /// The manager dropped its end of a channel; stop for good.
    Released,
    Lost(String),
}

pub(crate) fn spawn(endpoint: String, reconnect_delay: Duration) -> TransportLink {
    let (outbound, outbound_rx) = mpsc::channel(OUTBOUND_CAPACITY);
    let (inbound_tx, inbound) = mpsc::channel(INBOUND_CAPACITY);
    let task = tokio::spawn(run(endpoint, reconnect_delay, outbound_rx, inbound_tx));
    TransportLink {
        outbound,
        inbound,
        task,
    }
}

async fn run(
    endpoint: String,
    reconnect_delay: Duration,
    mut outbound: mpsc::Receiver<String>,
    inbound: mpsc::Sender<TransportEvent>,
) {
    loop {
        match connect_async(endpoint.as_str()).await {
            Ok((stream, _)) => {
                info!("Connected to {endpoint}");
                // Anything queued while the link was down is no longer current.
                while outbound.try_recv().is_ok() {}
                if inbound.send(TransportEvent::Up).await.is_err() {
                    return;
                }

                match pump(stream, &mut outbound, &inbound).await {
                    PumpExit::Released => return,
                    PumpExit::Lost(reason) => warn!("Disconnected from {endpoint}: {reason}"),
                }
                if inbound.send(TransportEvent::Down).await.is_err() {
                    return;
                }
            }
            Err(e) => debug!("Connecting to {endpoint} failed: {e}"),
        }

        if inbound.is_closed() {
            return;
        }
        tokio::time::sleep(reconnect_delay).await;
    }
}

async fn pump(
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    outbound: &mut mpsc::Receiver<String>,
    inbound: &mpsc::Sender<TransportEvent>,
) -> PumpExit {
    let (mut sink, mut source) = stream.split();
    loop {
        tokio::select! {
            msg = outbound.recv() => match msg {
                Some(text) => {
                    if let Err(e) = sink.send(Message::Text(text)).await {
                        return PumpExit::Lost(e.to_string());
                    }
                }
                None => {
                    let _ = sink.close().await;
                    return PumpExit::Released;
                }
            },
            frame = source.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    if inbound.send(TransportEvent::Text(text)).await.is_err() {
                        return PumpExit::Released;
                    }
                }
                Some(Ok(Message::Close(_))) | None => {
                    return PumpExit::Lost("closed by peer".to_string());
                }
                // ping/pong are answered by tungstenite; binary is not part of the protocol
                Some(Ok(_)) => {}
                Some(Err(e)) => return PumpExit::Lost(e.to_string()),
            },
        }
    }
}
