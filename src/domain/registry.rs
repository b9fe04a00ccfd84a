//! Concurrent set of live connections.
//!
//! [`ConnectionRegistry`] stores non-owning [`Weak`] references keyed by
//! [`ConnectionId`] behind a [`tokio::sync::RwLock`]. Broadcasts take a
//! snapshot under the read lock and release it before writing, so slow
//! recipients never hold up register/deregister.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use serde::Serialize;
use tokio::sync::RwLock;

use super::{Connection, ConnectionId, RelayMessage};
use crate::error::RelayError;

/// Outcome of one broadcast, for logging and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BroadcastReport {
    /// Members the frame was queued for.
    pub delivered: usize,
    /// Members skipped because they were not open or already dropped.
    pub skipped: usize,
    /// Members whose write failed.
    pub failed: usize,
}

/// Authoritative membership of currently active connections.
///
/// # Concurrency
///
/// - `register` / `deregister` take the write lock briefly.
/// - `broadcast` copies the membership under the read lock, then delivers
///   without holding any lock.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    members: RwLock<HashMap<ConnectionId, Weak<Connection>>>,
}

impl ConnectionRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a connection. No-op if it is already a member.
    pub async fn register(&self, conn: &Arc<Connection>) {
        let mut members = self.members.write().await;
        members
            .entry(conn.id())
            .or_insert_with(|| Arc::downgrade(conn));
    }

    /// Removes a connection. Returns `false` if it was not a member.
    pub async fn deregister(&self, conn_id: ConnectionId) -> bool {
        self.members.write().await.remove(&conn_id).is_some()
    }

    /// Returns `true` if the connection is a member.
    pub async fn contains(&self, conn_id: ConnectionId) -> bool {
        self.members.read().await.contains_key(&conn_id)
    }

    /// Returns the number of members.
    pub async fn len(&self) -> usize {
        self.members.read().await.len()
    }

    /// Returns `true` if there are no members.
    pub async fn is_empty(&self) -> bool {
        self.members.read().await.is_empty()
    }

    /// Delivers `message` to every open member of a membership snapshot.
    ///
    /// The message is encoded separately for each recipient. Members that
    /// are not open are skipped. A failed write is logged and counted; it
    /// never stops delivery to the remaining members and never removes the
    /// failing member.
    pub async fn broadcast(&self, message: &RelayMessage) -> BroadcastReport {
        let snapshot: Vec<Weak<Connection>> = {
            let members = self.members.read().await;
            members.values().map(Weak::clone).collect()
        };
        let members = snapshot.len();

        let mut report = BroadcastReport::default();
        for member in snapshot {
            let Some(conn) = member.upgrade() else {
                report.skipped += 1;
                continue;
            };
            if !conn.is_open() {
                report.skipped += 1;
                continue;
            }
            match conn.send(message.encode()) {
                Ok(()) => report.delivered += 1,
                Err(source) => {
                    report.failed += 1;
                    let err = RelayError::Delivery {
                        conn_id: conn.id(),
                        source,
                    };
                    tracing::warn!(
                        conn_id = %conn.id(),
                        remote = %conn.remote_addr(),
                        error = %err,
                        "broadcast delivery failed"
                    );
                }
            }
        }

        tracing::debug!(
            members,
            delivered = report.delivered,
            skipped = report.skipped,
            failed = report.failed,
            "broadcast complete"
        );
        report
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::net::SocketAddr;

    use serde_json::json;
    use tokio::sync::mpsc;

    use super::*;
    use crate::domain::ConnectionState;

    fn open_connection(capacity: usize) -> (Arc<Connection>, mpsc::Receiver<String>) {
        let (conn, rx) = Connection::new(SocketAddr::from(([127, 0, 0, 1], 40_001)), capacity);
        conn.advance(ConnectionState::Open);
        (Arc::new(conn), rx)
    }

    fn message() -> RelayMessage {
        RelayMessage::from(json!({"x": 1}))
    }

    #[tokio::test]
    async fn register_is_idempotent() {
        let registry = ConnectionRegistry::new();
        let (conn, _rx) = open_connection(4);
        registry.register(&conn).await;
        registry.register(&conn).await;
        assert_eq!(registry.len().await, 1);
        assert!(registry.contains(conn.id()).await);
    }

    #[tokio::test]
    async fn deregister_absent_is_noop() {
        let registry = ConnectionRegistry::new();
        let (conn, _rx) = open_connection(4);
        assert!(!registry.deregister(conn.id()).await);
        registry.register(&conn).await;
        assert!(registry.deregister(conn.id()).await);
        assert!(!registry.deregister(conn.id()).await);
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn broadcast_reaches_every_open_member() {
        let registry = ConnectionRegistry::new();
        let (a, mut rx_a) = open_connection(4);
        let (b, mut rx_b) = open_connection(4);
        registry.register(&a).await;
        registry.register(&b).await;

        let report = registry.broadcast(&message()).await;
        assert_eq!(report.delivered, 2);
        assert_eq!(rx_a.try_recv().ok().as_deref(), Some(r#"{"x":1}"#));
        assert_eq!(rx_b.try_recv().ok().as_deref(), Some(r#"{"x":1}"#));
    }

    #[tokio::test]
    async fn broadcast_skips_members_not_open() {
        let registry = ConnectionRegistry::new();
        let (open, mut rx_open) = open_connection(4);
        let (closing, mut rx_closing) = open_connection(4);
        closing.advance(ConnectionState::Closing);
        registry.register(&open).await;
        registry.register(&closing).await;

        let report = registry.broadcast(&message()).await;
        assert_eq!(
            report,
            BroadcastReport {
                delivered: 1,
                skipped: 1,
                failed: 0
            }
        );
        assert!(rx_open.try_recv().is_ok());
        assert!(rx_closing.try_recv().is_err());
    }

    #[tokio::test]
    async fn broadcast_skips_dropped_connections() {
        let registry = ConnectionRegistry::new();
        let (conn, _rx) = open_connection(4);
        registry.register(&conn).await;
        drop(conn);

        let report = registry.broadcast(&message()).await;
        assert_eq!(report.delivered, 0);
        assert_eq!(report.skipped, 1);
    }

    #[tokio::test]
    async fn failed_write_does_not_block_other_members() {
        let registry = ConnectionRegistry::new();
        let (full, mut rx_full) = open_connection(1);
        let (gone, rx_gone) = open_connection(4);
        let (healthy, mut rx_healthy) = open_connection(4);
        assert!(full.send("filler".to_string()).is_ok());
        drop(rx_gone);
        registry.register(&full).await;
        registry.register(&gone).await;
        registry.register(&healthy).await;

        let report = registry.broadcast(&message()).await;
        assert_eq!(report.delivered, 1);
        assert_eq!(report.failed, 2);
        assert_eq!(rx_healthy.try_recv().ok().as_deref(), Some(r#"{"x":1}"#));
        assert_eq!(rx_full.try_recv().ok().as_deref(), Some("filler"));
        assert!(rx_full.try_recv().is_err());
        // Failures never deregister.
        assert_eq!(registry.len().await, 3);
    }
}
