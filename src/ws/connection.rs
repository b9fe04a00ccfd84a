//! Per-connection task.
//!
//! One task per client: it reads inbound frames, turns them into
//! [`ConnectionEvent`]s for the [`RelayEngine`], and drains the
//! connection's outbound queue to the socket.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};

use crate::error::RelayError;
use crate::service::{ConnectionEvent, RelayEngine};

/// Runs the read/write loop for a single WebSocket connection.
///
/// - Registers the connection and queues its acknowledgement.
/// - Feeds inbound frames to the engine in arrival order.
/// - Writes queued outbound frames to the client.
///
/// Always finishes with [`ConnectionEvent::Closed`], so the connection
/// leaves the registry whichever way the loop ends.
pub async fn run_connection(socket: WebSocket, engine: Arc<RelayEngine>, remote_addr: SocketAddr) {
    let (conn, mut outbound_rx) = engine.on_accept(remote_addr).await;
    let (mut ws_tx, mut ws_rx) = socket.split();

    loop {
        tokio::select! {
            // Incoming frame from client
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        let raw = Bytes::copy_from_slice(text.as_str().as_bytes());
                        engine.handle(&conn, ConnectionEvent::MessageReceived(raw)).await;
                    }
                    Some(Ok(Message::Binary(raw))) => {
                        engine.handle(&conn, ConnectionEvent::MessageReceived(raw)).await;
                    }
                    Some(Ok(Message::Close(frame))) => {
                        tracing::debug!(
                            conn_id = %conn.id(),
                            code = frame.as_ref().map(|f| f.code),
                            "close frame received"
                        );
                        engine.handle(&conn, ConnectionEvent::Closing).await;
                    }
                    Some(Err(err)) => {
                        engine.handle(&conn, ConnectionEvent::Errored(RelayError::Transport(err))).await;
                        break;
                    }
                    None => break,
                    // Ping/pong are answered by the transport.
                    Some(Ok(_)) => {}
                }
            }
            // Frame queued for this client
            frame = outbound_rx.recv() => {
                let Some(frame) = frame else { break };
                if let Err(err) = ws_tx.send(Message::text(frame)).await {
                    engine.handle(&conn, ConnectionEvent::Errored(RelayError::Transport(err))).await;
                    break;
                }
            }
        }
    }

    engine.handle(&conn, ConnectionEvent::Closed).await;
    tracing::debug!(conn_id = %conn.id(), "ws connection closed");
}
