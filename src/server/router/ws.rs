use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
    routing::get,
    Router,
};
use futures::{stream::SplitStream, SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::server::ServeState;
use crate::session::OrchestrationSession;

pub(crate) fn router() -> Router<ServeState> {
    Router::new().route("/ws", get(websocket_handler))
}

async fn websocket_handler(
    State(state): State<ServeState>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| async move {
        handle_socket(socket, state.new_session()).await;
    })
}

/// Frames are read on a separate task so a disconnect is noticed while a
/// decision is still pending. Text frames are handled strictly in arrival
/// order, one at a time.
async fn handle_socket(socket: WebSocket, mut session: OrchestrationSession) {
    let session_id = session.id().clone();
    info!(target: "ws", session_id = %session_id, "client connected");

    let (mut sender, receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let disconnected = CancellationToken::new();
    let reader = tokio::spawn(read_frames(receiver, tx, disconnected.clone()));

    loop {
        let text = tokio::select! {
            biased;
            _ = disconnected.cancelled() => break,
            text = rx.recv() => match text {
                Some(text) => text,
                None => break,
            },
        };

        let reply = tokio::select! {
            biased;
            _ = disconnected.cancelled() => {
                info!(
                    target: "ws",
                    session_id = %session_id,
                    "client left during a pending decision"
                );
                break;
            }
            reply = session.handle_text(&text) => reply,
        };
        let Some(reply) = reply else {
            continue;
        };

        let body = match serde_json::to_string(&reply.message) {
            Ok(body) => body,
            Err(err) => {
                error!(target: "ws", session_id = %session_id, ?err, "failed to encode reply");
                break;
            }
        };
        if sender.send(Message::Text(body)).await.is_err() {
            debug!(target: "ws", session_id = %session_id, "send failed; client gone");
            break;
        }
        if reply.close {
            let _ = sender.send(Message::Close(None)).await;
            break;
        }
    }

    reader.abort();
    info!(
        target: "ws",
        session_id = %session_id,
        turns = session.history().len(),
        "connection closed"
    );
}

async fn read_frames(
    mut receiver: SplitStream<WebSocket>,
    tx: mpsc::UnboundedSender<String>,
    disconnected: CancellationToken,
) {
    while let Some(frame) = receiver.next().await {
        match frame {
            Ok(Message::Text(text)) => {
                if tx.send(text).is_err() {
                    break;
                }
            }
            Ok(Message::Binary(_)) => {
                warn!(target: "ws", "ignoring binary frame");
            }
            Ok(Message::Close(frame)) => {
                debug!(target: "ws", ?frame, "WebSocket closed by client");
                break;
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
            Err(err) => {
                debug!(target: "ws", ?err, "WebSocket read error");
                break;
            }
        }
    }
    disconnected.cancel();
}
