//! Server-side view of one client session.
//!
//! A [`Connection`] pairs the session's identity and lifecycle state with
//! the sending half of a bounded outbound queue. The connection's own task
//! drains the queue to the socket, so writers never touch the transport
//! directly and never block on a slow recipient.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU8, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use super::ConnectionId;
use crate::error::DeliveryError;

/// Lifecycle of a connection.
///
/// `Accepted → Open → Closing → Closed`. Transitions only move forward and
/// `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum ConnectionState {
    /// Registered, acknowledgement not yet queued.
    Accepted = 0,
    /// Inbound messages are processed and broadcasts delivered.
    Open = 1,
    /// Close handshake in progress.
    Closing = 2,
    /// Transport torn down.
    Closed = 3,
}

impl ConnectionState {
    const fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::Accepted,
            1 => Self::Open,
            2 => Self::Closing,
            _ => Self::Closed,
        }
    }
}

/// One live client session.
///
/// Owned by the connection's task through an `Arc`; the registry only
/// holds a weak reference, so dropping the task's handle ends membership.
#[derive(Debug)]
pub struct Connection {
    id: ConnectionId,
    remote_addr: SocketAddr,
    connected_at: DateTime<Utc>,
    state: AtomicU8,
    outbound: mpsc::Sender<String>,
}

impl Connection {
    /// Creates a connection in the [`ConnectionState::Accepted`] state.
    ///
    /// Returns the connection and the receiving half of its outbound
    /// queue. `queue_capacity` is clamped to at least 1.
    #[must_use]
    pub fn new(remote_addr: SocketAddr, queue_capacity: usize) -> (Self, mpsc::Receiver<String>) {
        let (outbound, rx) = mpsc::channel(queue_capacity.max(1));
        let conn = Self {
            id: ConnectionId::new(),
            remote_addr,
            connected_at: Utc::now(),
            state: AtomicU8::new(ConnectionState::Accepted as u8),
            outbound,
        };
        (conn, rx)
    }

    /// Returns the connection's identifier.
    #[must_use]
    pub const fn id(&self) -> ConnectionId {
        self.id
    }

    /// Returns the peer's socket address.
    #[must_use]
    pub const fn remote_addr(&self) -> SocketAddr {
        self.remote_addr
    }

    /// Returns when the connection was accepted.
    #[must_use]
    pub const fn connected_at(&self) -> DateTime<Utc> {
        self.connected_at
    }

    /// Returns how long ago the connection was accepted.
    #[must_use]
    pub fn age(&self) -> chrono::Duration {
        Utc::now() - self.connected_at()
    }

    /// Returns the current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Returns `true` if the connection is [`ConnectionState::Open`].
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.state() == ConnectionState::Open
    }

    /// Moves the connection forward to `next`.
    ///
    /// Returns `false` (and leaves the state untouched) if the connection
    /// is already at or past `next`.
    pub fn advance(&self, next: ConnectionState) -> bool {
        self.state
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                (current < next as u8).then_some(next as u8)
            })
            .is_ok()
    }

    /// Queues a frame for an open connection.
    ///
    /// # Errors
    ///
    /// - [`DeliveryError::NotOpen`] if the connection is not open.
    /// - [`DeliveryError::QueueFull`] if the outbound queue is at capacity;
    ///   the frame is dropped.
    /// - [`DeliveryError::Closed`] if the connection's writer has exited.
    pub fn send(&self, frame: String) -> Result<(), DeliveryError> {
        if !self.is_open() {
            return Err(DeliveryError::NotOpen);
        }
        self.enqueue(frame)
    }

    /// Queues the acknowledgement frame.
    ///
    /// Only valid while the connection is still
    /// [`ConnectionState::Accepted`], so the acknowledgement is always the
    /// first frame in the queue.
    ///
    /// # Errors
    ///
    /// Same as [`Connection::send`], with [`DeliveryError::NotOpen`]
    /// returned when the connection has already left `Accepted`.
    pub fn send_ack(&self, frame: String) -> Result<(), DeliveryError> {
        if self.state() != ConnectionState::Accepted {
            return Err(DeliveryError::NotOpen);
        }
        self.enqueue(frame)
    }

    fn enqueue(&self, frame: String) -> Result<(), DeliveryError> {
        self.outbound.try_send(frame).map_err(|err| match err {
            TrySendError::Full(_) => DeliveryError::QueueFull,
            TrySendError::Closed(_) => DeliveryError::Closed,
        })
    }
}
