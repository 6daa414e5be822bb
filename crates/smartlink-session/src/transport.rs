//! Physical link abstraction.
//!
//! A [`Connector`] produces one [`Connection`] per successful attempt. A
//! connection is a pair of text-frame channels:
//!
//! - dropping `outbound` closes the link from our side
//! - `inbound` yields `None` once the link is gone, whoever closed it
//!
//! [`WsConnector`] is the production implementation over `tokio-tungstenite`;
//! [`crate::testing::MockConnector`] is the in-memory one used by tests.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, trace};

use crate::errors::TransportError;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// One established link.
#[derive(Debug)]
pub struct Connection {
    /// Text frames to write. Dropping the sender closes the link.
    pub outbound: mpsc::UnboundedSender<String>,
    /// Text frames read from the peer, in arrival order.
    pub inbound: mpsc::UnboundedReceiver<String>,
}

/// Opens links to the device.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Attempt one connection.
    async fn connect(&self, url: &str) -> Result<Connection, TransportError>;
}

/// WebSocket connector.
#[derive(Clone, Copy, Debug, Default)]
pub struct WsConnector;

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, url: &str) -> Result<Connection, TransportError> {
        let (ws, _) = connect_async(url)
            .await
            .map_err(|e| TransportError::Connect {
                url: url.to_owned(),
                reason: e.to_string(),
            })?;

        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        let (inbound_tx, inbound) = mpsc::unbounded_channel();
        let _ = tokio::spawn(pump(ws, outbound_rx, inbound_tx));

        Ok(Connection { outbound, inbound })
    }
}

/// Shuttle frames between the socket and the connection channels until
/// either side goes away.
async fn pump(
    ws: WsStream,
    mut outbound: mpsc::UnboundedReceiver<String>,
    inbound: mpsc::UnboundedSender<String>,
) {
    let (mut ws_tx, mut ws_rx) = ws.split();

    loop {
        tokio::select! {
            text = outbound.recv() => {
                let Some(text) = text else {
                    let _ = ws_tx.send(Message::Close(None)).await;
                    break;
                };
                if let Err(e) = ws_tx.send(Message::Text(text.into())).await {
                    debug!(error = %e, "websocket write failed");
                    break;
                }
            }
            frame = ws_rx.next() => {
                let text = match frame {
                    Some(Ok(Message::Text(text))) => text.as_str().to_owned(),
                    Some(Ok(Message::Binary(bytes))) => {
                        if let Ok(text) = String::from_utf8(bytes.to_vec()) {
                            text
                        } else {
                            debug!(len = bytes.len(), "dropping non-UTF-8 binary frame");
                            continue;
                        }
                    }
                    Some(Ok(Message::Close(frame))) => {
                        debug!(?frame, "peer closed websocket");
                        break;
                    }
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        debug!(error = %e, "websocket read failed");
                        break;
                    }
                    None => break,
                };
                trace!(len = text.len(), "frame received");
                if inbound.send(text).is_err() {
                    break;
                }
            }
        }
    }
}
