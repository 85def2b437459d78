use super::messages::{ClientMessage, ServerMessage};
use super::registry::ConnectionId;
use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

const OUTBOUND_CAPACITY: usize = 64;

/// Trait for handling the life of one WebSocket connection.
pub trait ConnectionHandler: Send + Sync + 'static {
    /// A connection opened; `tx` feeds its outbound frames.
    fn handle_connect(&self, conn: ConnectionId, tx: broadcast::Sender<ServerMessage>);

    /// Handle a decoded client message
    fn handle_message(
        self: Arc<Self>,
        conn: ConnectionId,
        msg: ClientMessage,
    ) -> impl Future<Output = ()> + Send;

    /// The connection is gone, for whatever reason.
    fn handle_disconnect(&self, conn: ConnectionId);
}

/// Run a WebSocket connection with the given handler.
///
/// Splits the socket into a writer task draining the outbound channel and a
/// reader loop decoding frames. Whichever side ends first tears the other down,
/// and the handler always sees the disconnect.
pub async fn run_connection<H: ConnectionHandler>(socket: WebSocket, handler: Arc<H>) {
    let conn = ConnectionId::new();
    info!(connection = %conn, "WebSocket connection opened");

    let (mut sender, receiver) = socket.split();
    let (tx, mut rx) = broadcast::channel::<ServerMessage>(OUTBOUND_CAPACITY);
    handler.handle_connect(conn, tx);

    let mut send_task = tokio::spawn(async move {
        loop {
            let msg = match rx.recv().await {
                Ok(msg) => msg,
                Err(RecvError::Lagged(skipped)) => {
                    warn!(connection = %conn, skipped, "Client too slow, dropped messages");
                    continue;
                }
                Err(RecvError::Closed) => break,
            };
            debug!(connection = %conn, ?msg, "Sending message to client");
            let json = match serde_json::to_string(&msg) {
                Ok(json) => json,
                Err(error) => {
                    warn!(connection = %conn, %error, "Failed to encode server message");
                    continue;
                }
            };
            if sender.send(Message::Text(json)).await.is_err() {
                break;
            }
        }
    });

    let mut recv_task = tokio::spawn(receive_loop(conn, receiver, handler.clone()));

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    handler.handle_disconnect(conn);
    info!(connection = %conn, "WebSocket connection closed");
}

async fn receive_loop<H: ConnectionHandler>(
    conn: ConnectionId,
    mut receiver: futures_util::stream::SplitStream<WebSocket>,
    handler: Arc<H>,
) {
    while let Some(Ok(msg)) = receiver.next().await {
        let text = match msg {
            Message::Text(text) => text,
            Message::Close(_) => break,
            _ => {
                debug!("Received non-text message, ignoring");
                continue;
            }
        };

        debug!(connection = %conn, raw = %text, "Received message");

        let client_msg = match serde_json::from_str::<ClientMessage>(&text) {
            Ok(msg) => msg,
            Err(error) => {
                warn!(connection = %conn, raw = %text, %error, "Failed to parse client message");
                continue;
            }
        };

        handler.clone().handle_message(conn, client_msg).await;
    }
}
