//! Relay engine: per-connection lifecycle and the decode/broadcast policy.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Bytes;
use tokio::sync::mpsc;

use crate::domain::{
    AckFrame, BroadcastReport, Connection, ConnectionRegistry, ConnectionState, RelayMessage,
};
use crate::error::RelayError;

/// Events a connection's task feeds to the engine, in arrival order.
#[derive(Debug)]
pub enum ConnectionEvent {
    /// A text or binary frame arrived.
    MessageReceived(Bytes),
    /// The peer started the close handshake.
    Closing,
    /// The transport is gone.
    Closed,
    /// The transport reported an error.
    Errored(RelayError),
}

/// Single point of decode, validate and broadcast policy.
///
/// Stateless apart from the shared [`ConnectionRegistry`]. Each
/// connection's task calls [`RelayEngine::on_accept`] once and then feeds
/// its events through [`RelayEngine::handle`], so events for one
/// connection are processed strictly in order.
#[derive(Debug, Clone)]
pub struct RelayEngine {
    registry: Arc<ConnectionRegistry>,
    outbound_queue_capacity: usize,
}

impl RelayEngine {
    /// Creates a new `RelayEngine`.
    #[must_use]
    pub fn new(registry: Arc<ConnectionRegistry>, outbound_queue_capacity: usize) -> Self {
        Self {
            registry,
            outbound_queue_capacity,
        }
    }

    /// Returns a reference to the inner [`ConnectionRegistry`].
    #[must_use]
    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Registers a freshly upgraded connection and queues its
    /// acknowledgement.
    ///
    /// The connection stays `Accepted` (invisible to broadcasts) until the
    /// acknowledgement is queued, so the acknowledgement is always the
    /// first frame the client sees. A failure to queue it is logged and the
    /// connection remains registered.
    pub async fn on_accept(&self, remote_addr: SocketAddr) -> (Arc<Connection>, mpsc::Receiver<String>) {
        let (conn, outbound_rx) = Connection::new(remote_addr, self.outbound_queue_capacity);
        let conn = Arc::new(conn);
        self.registry.register(&conn).await;

        let ack = AckFrame::CONNECTED
            .encode()
            .and_then(|frame| {
                conn.send_ack(frame).map_err(|source| RelayError::Delivery {
                    conn_id: conn.id(),
                    source,
                })
            });
        if let Err(err) = ack {
            tracing::warn!(conn_id = %conn.id(), error = %err, "failed to send acknowledgement");
        }
        conn.advance(ConnectionState::Open);

        tracing::info!(conn_id = %conn.id(), remote = %remote_addr, "client connected");
        (conn, outbound_rx)
    }

    /// Dispatches one connection event.
    pub async fn handle(&self, conn: &Connection, event: ConnectionEvent) {
        match event {
            ConnectionEvent::MessageReceived(raw) => {
                self.on_message(conn, &raw).await;
            }
            ConnectionEvent::Closing => self.on_closing(conn),
            ConnectionEvent::Closed => self.on_close(conn).await,
            ConnectionEvent::Errored(err) => self.on_error(conn, &err).await,
        }
    }

    /// Decodes an inbound frame and broadcasts it to every open member.
    ///
    /// Malformed frames are logged together with their raw payload and
    /// dropped; the connection stays open. Frames arriving while the
    /// connection is not open are ignored. Returns the broadcast report
    /// when a broadcast happened.
    pub async fn on_message(&self, conn: &Connection, raw: &[u8]) -> Option<BroadcastReport> {
        if !conn.is_open() {
            tracing::debug!(conn_id = %conn.id(), state = ?conn.state(), "ignoring frame on non-open connection");
            return None;
        }

        match RelayMessage::decode(raw) {
            Ok(message) => {
                tracing::debug!(conn_id = %conn.id(), payload = %message.value(), "received message");
                Some(self.registry.broadcast(&message).await)
            }
            Err(err) => {
                tracing::warn!(
                    conn_id = %conn.id(),
                    error = %err,
                    raw = %String::from_utf8_lossy(raw),
                    "dropping malformed message"
                );
                None
            }
        }
    }

    /// Marks the connection as closing; broadcasts skip it from now on.
    pub fn on_closing(&self, conn: &Connection) {
        if conn.advance(ConnectionState::Closing) {
            tracing::debug!(conn_id = %conn.id(), "client closing");
        }
    }

    /// Marks the connection closed and removes it from the registry.
    /// Safe to call more than once.
    pub async fn on_close(&self, conn: &Connection) {
        conn.advance(ConnectionState::Closed);
        if self.registry.deregister(conn.id()).await {
            tracing::info!(
                conn_id = %conn.id(),
                remote = %conn.remote_addr(),
                connected_secs = conn.age().num_seconds(),
                "client disconnected"
            );
        }
    }

    /// Logs a transport error and removes the connection from the registry.
    ///
    /// Deregistering here does not depend on the transport following the
    /// error with a close; a later [`RelayEngine::on_close`] is a no-op.
    pub async fn on_error(&self, conn: &Connection, err: &RelayError) {
        tracing::warn!(conn_id = %conn.id(), remote = %conn.remote_addr(), error = %err, "websocket error");
        self.registry.deregister(conn.id()).await;
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    const ACK: &str = r#"{"type":"connection","status":"connected"}"#;

    fn make_engine(capacity: usize) -> RelayEngine {
        RelayEngine::new(Arc::new(ConnectionRegistry::new()), capacity)
    }

    fn peer(port: u16) -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], port))
    }

    fn drain(rx: &mut mpsc::Receiver<String>) -> Vec<String> {
        let mut frames = Vec::new();
        while let Ok(frame) = rx.try_recv() {
            frames.push(frame);
        }
        frames
    }

    #[tokio::test]
    async fn accept_registers_and_acknowledges() {
        let engine = make_engine(8);
        let (conn, mut rx) = engine.on_accept(peer(50_000)).await;

        assert!(conn.is_open());
        assert!(engine.registry().contains(conn.id()).await);
        assert_eq!(drain(&mut rx), vec![ACK.to_string()]);
    }

    #[tokio::test]
    async fn well_formed_message_reaches_everyone_including_sender() {
        let engine = make_engine(8);
        let (a, mut rx_a) = engine.on_accept(peer(50_001)).await;
        let (_b, mut rx_b) = engine.on_accept(peer(50_002)).await;
        drain(&mut rx_a);
        drain(&mut rx_b);

        let Some(report) = engine.on_message(&a, br#"{"x":1}"#).await else {
            panic!("well-formed message must be broadcast");
        };
        assert_eq!(report.delivered, 2);
        assert_eq!(drain(&mut rx_a), vec![r#"{"x":1}"#.to_string()]);
        assert_eq!(drain(&mut rx_b), vec![r#"{"x":1}"#.to_string()]);
    }

    #[tokio::test]
    async fn malformed_message_is_dropped_and_connection_stays_open() {
        let engine = make_engine(8);
        let (a, mut rx_a) = engine.on_accept(peer(50_003)).await;
        let (b, mut rx_b) = engine.on_accept(peer(50_004)).await;
        drain(&mut rx_a);
        drain(&mut rx_b);

        assert!(engine.on_message(&b, b"definitely not json").await.is_none());
        assert!(engine.on_message(&b, &[0xc3, 0x28]).await.is_none());

        assert!(drain(&mut rx_a).is_empty());
        assert!(drain(&mut rx_b).is_empty());
        assert!(b.is_open());
        assert!(engine.registry().contains(b.id()).await);
        assert!(a.is_open());
    }

    #[tokio::test]
    async fn close_deregisters_and_stops_broadcasts() {
        let engine = make_engine(8);
        let (a, mut rx_a) = engine.on_accept(peer(50_005)).await;
        let (b, mut rx_b) = engine.on_accept(peer(50_006)).await;
        drain(&mut rx_a);
        drain(&mut rx_b);

        engine.handle(&b, ConnectionEvent::Closing).await;
        engine.handle(&b, ConnectionEvent::Closed).await;
        assert_eq!(b.state(), ConnectionState::Closed);
        assert!(!engine.registry().contains(b.id()).await);

        let Some(report) = engine.on_message(&a, br#"{"after":"close"}"#).await else {
            panic!("well-formed message must be broadcast");
        };
        assert_eq!(report.delivered, 1);
        assert!(drain(&mut rx_b).is_empty());
        assert_eq!(drain(&mut rx_a).len(), 1);

        // Closing twice is harmless.
        engine.on_close(&b).await;
        assert_eq!(engine.registry().len().await, 1);
    }

    #[tokio::test]
    async fn closing_connection_is_skipped_and_ignores_input() {
        let engine = make_engine(8);
        let (a, mut rx_a) = engine.on_accept(peer(50_007)).await;
        let (b, mut rx_b) = engine.on_accept(peer(50_008)).await;
        drain(&mut rx_a);
        drain(&mut rx_b);

        engine.on_closing(&b);
        assert!(engine.on_message(&b, br#"{"x":1}"#).await.is_none());
        let Some(report) = engine.on_message(&a, br#"{"x":2}"#).await else {
            panic!("well-formed message must be broadcast");
        };
        assert_eq!(report.skipped, 1);
        assert!(drain(&mut rx_b).is_empty());
    }

    #[tokio::test]
    async fn error_deregisters_without_a_close() {
        let engine = make_engine(8);
        let (conn, _rx) = engine.on_accept(peer(50_009)).await;

        let err = RelayError::Transport(axum::Error::new(std::io::Error::other("connection reset")));
        engine.handle(&conn, ConnectionEvent::Errored(err)).await;
        assert!(engine.registry().is_empty().await);

        engine.handle(&conn, ConnectionEvent::Closed).await;
        assert!(engine.registry().is_empty().await);
    }

    #[tokio::test]
    async fn per_sender_order_is_preserved() {
        let engine = make_engine(16);
        let (a, mut rx_a) = engine.on_accept(peer(50_010)).await;
        let (_b, mut rx_b) = engine.on_accept(peer(50_011)).await;
        drain(&mut rx_a);
        drain(&mut rx_b);

        for seq in 0..5 {
            let frame = format!(r#"{{"seq":{seq}}}"#);
            engine
                .handle(&a, ConnectionEvent::MessageReceived(Bytes::from(frame)))
                .await;
        }

        let expected: Vec<String> = (0..5).map(|seq| format!(r#"{{"seq":{seq}}}"#)).collect();
        assert_eq!(drain(&mut rx_a), expected);
        assert_eq!(drain(&mut rx_b), expected);
    }

    #[tokio::test]
    async fn slow_recipient_does_not_stall_others() {
        let engine = make_engine(2);
        let (a, mut rx_a) = engine.on_accept(peer(50_012)).await;
        let (_slow, mut rx_slow) = engine.on_accept(peer(50_013)).await;
        drain(&mut rx_a);

        // The slow client still holds its ack plus one frame.
        for seq in 0..3 {
            let frame = format!(r#"{{"seq":{seq}}}"#);
            let _ = engine.on_message(&a, frame.as_bytes()).await;
            drain(&mut rx_a);
        }

        let slow_frames = drain(&mut rx_slow);
        assert_eq!(slow_frames.len(), 2);
        assert_eq!(slow_frames.first().map(String::as_str), Some(ACK));
    }

    #[tokio::test]
    async fn ack_is_first_even_with_concurrent_traffic() {
        let engine = make_engine(8);
        let (a, mut rx_a) = engine.on_accept(peer(50_014)).await;
        drain(&mut rx_a);

        let late = engine.on_accept(peer(50_015));
        let chatter = engine.on_message(&a, br#"{"x":1}"#);
        let ((_late_conn, mut rx_late), _) = tokio::join!(late, chatter);

        assert_eq!(drain(&mut rx_late).first().map(String::as_str), Some(ACK));
    }
}
