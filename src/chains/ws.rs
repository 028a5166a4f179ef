//! WebSocket session plumbing shared by the streaming chain probes.

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use crate::collector::ProbeError;

/// One live subscription session: the socket plus the server-assigned
/// subscription id, filled in by the probe's subscribe step.
pub struct WsSession {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    pub subscription_id: Option<serde_json::Value>,
}

impl WsSession {
    /// Open a websocket connection to `endpoint`.
    pub async fn connect(endpoint: &str) -> Result<Self, ProbeError> {
        let (stream, _response) = connect_async(endpoint).await?;
        tracing::debug!(endpoint = %endpoint, "websocket connected");
        Ok(Self {
            stream,
            subscription_id: None,
        })
    }

    /// Send a JSON payload as a text frame.
    pub async fn send_json(&mut self, payload: &serde_json::Value) -> Result<(), ProbeError> {
        self.stream
            .send(Message::Text(payload.to_string().into()))
            .await?;
        Ok(())
    }

    /// Receive the next JSON text frame, skipping control frames.
    pub async fn recv_json(&mut self) -> Result<serde_json::Value, ProbeError> {
        loop {
            let message = self
                .stream
                .next()
                .await
                .ok_or_else(|| ProbeError::Transport("websocket closed by peer".to_string()))??;
            match message {
                Message::Text(text) => return Ok(serde_json::from_str(text.as_str())?),
                Message::Close(_) => {
                    return Err(ProbeError::Transport(
                        "websocket closed by peer".to_string(),
                    ));
                }
                // Ping/pong and binary frames carry no subscription data.
                _ => continue,
            }
        }
    }

    /// Close the socket, ignoring faults on an already-dead connection.
    pub async fn close(mut self) {
        if let Err(e) = self.stream.close(None).await {
            tracing::debug!(error = %e, "websocket close failed");
        }
    }
}
