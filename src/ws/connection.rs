//! Per-connection protocol loop.
//!
//! Registers the socket with the [`ConnectionManager`], then multiplexes
//! inbound client commands and the connection's outbound queue until either
//! side goes away.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use super::messages::{ClientCommand, ServerMessage, parse_command};
use crate::domain::ConnectionId;
use crate::service::ConnectionManager;

/// Runs the read/write loop for a single WebSocket connection.
///
/// - Inbound text frames are parsed as commands and dispatched.
/// - Frames queued by the manager are written to the socket in order.
///
/// The loop ends on client close, transport error, or when the manager drops
/// the queue (failed send or shutdown). The connection is removed on exit.
pub async fn run_connection(
    socket: WebSocket,
    manager: Arc<ConnectionManager>,
    channels: Vec<String>,
    queue_capacity: usize,
) {
    let (outbound_tx, mut outbound_rx) = mpsc::channel(queue_capacity.max(1));
    let connection_id = manager.accept(outbound_tx, &channels).await;
    let (mut ws_tx, mut ws_rx) = socket.split();

    loop {
        tokio::select! {
            // Incoming message from client
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        manager.touch(connection_id).await;
                        handle_text_message(&manager, connection_id, text.as_str()).await;
                    }
                    Some(Ok(Message::Binary(_))) => {
                        manager.touch(connection_id).await;
                        let reply = ServerMessage::error("binary frames are not supported");
                        manager.send(connection_id, &reply).await;
                    }
                    Some(Ok(Message::Ping(_) | Message::Pong(_))) => {
                        manager.touch(connection_id).await;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        tracing::debug!(%connection_id, error = %e, "ws receive failed");
                        break;
                    }
                }
            }
            // Frame queued by the manager
            frame = outbound_rx.recv() => {
                let Some(frame) = frame else {
                    tracing::debug!(%connection_id, "outbound queue closed by manager");
                    break;
                };
                if ws_tx.send(Message::text(frame.to_string())).await.is_err() {
                    break;
                }
            }
        }
    }

    manager.remove(connection_id).await;
    if let Err(e) = ws_tx.close().await {
        tracing::debug!(%connection_id, error = %e, "ws close failed");
    }
    tracing::debug!(%connection_id, "ws connection closed");
}

/// Handles a text frame from the client.
///
/// Replies go through the manager so they are ordered with broadcasts on the
/// same queue. Unrecognized input produces an `error` reply and never ends
/// the connection.
pub async fn handle_text_message(manager: &ConnectionManager, id: ConnectionId, text: &str) {
    match parse_command(text) {
        Ok(ClientCommand::Subscribe { channels }) => {
            manager.subscribe(id, &channels).await;
        }
        Ok(ClientCommand::Unsubscribe { channels }) => {
            manager.unsubscribe(id, &channels).await;
        }
        Ok(ClientCommand::Ping) => {
            manager.send(id, &ServerMessage::Pong).await;
        }
        Ok(ClientCommand::GetStats) => {
            let data = manager.stats().await;
            manager.send(id, &ServerMessage::Stats { data }).await;
        }
        Err(e) => {
            tracing::debug!(connection_id = %id, error = %e, "rejected client message");
            manager.send(id, &ServerMessage::error(e.to_string())).await;
        }
    }
}
