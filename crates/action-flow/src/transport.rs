//! Request/response seam between the coordinator and the orchestration server

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use retrace_core_types::{ClientMessage, ServerMessage};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info};

use crate::errors::FlowError;

/// One turn: send a client message, await the single reply.
#[async_trait]
pub trait TurnTransport: Send {
    async fn exchange(&mut self, message: &ClientMessage) -> Result<ServerMessage, FlowError>;

    async fn close(&mut self) -> Result<(), FlowError>;
}

/// WebSocket client for the `/ws` endpoint.
pub struct WebSocketTransport {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl WebSocketTransport {
    pub async fn connect(url: &str) -> Result<Self, FlowError> {
        let (stream, response) = connect_async(url).await?;
        info!(target: "ws", url, status = %response.status(), "connected");
        Ok(Self { stream })
    }

    /// Next text frame; control frames are skipped.
    async fn next_text(&mut self) -> Result<String, FlowError> {
        while let Some(frame) = self.stream.next().await {
            match frame? {
                Message::Text(text) => return Ok(text),
                Message::Binary(bytes) => {
                    return String::from_utf8(bytes)
                        .map_err(|err| {
                            FlowError::Protocol(format!("binary frame is not UTF-8: {err}"))
                        })
                }
                Message::Close(frame) => {
                    debug!(target: "ws", ?frame, "server closed");
                    return Err(FlowError::ConnectionClosed);
                }
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => continue,
            }
        }
        Err(FlowError::ConnectionClosed)
    }
}

#[async_trait]
impl TurnTransport for WebSocketTransport {
    async fn exchange(&mut self, message: &ClientMessage) -> Result<ServerMessage, FlowError> {
        let body = serde_json::to_string(message)
            .map_err(|err| FlowError::Protocol(format!("cannot encode message: {err}")))?;
        self.stream.send(Message::Text(body)).await?;
        let reply = self.next_text().await?;
        serde_json::from_str(&reply)
            .map_err(|err| FlowError::Protocol(format!("unexpected reply: {err}")))
    }

    async fn close(&mut self) -> Result<(), FlowError> {
        match self.stream.close(None).await {
            Ok(())
            | Err(tokio_tungstenite::tungstenite::Error::ConnectionClosed)
            | Err(tokio_tungstenite::tungstenite::Error::AlreadyClosed) => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}
