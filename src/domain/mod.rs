//! Domain layer: connection identity and lifecycle, the message codec,
//! and the connection registry that fans messages out.

pub mod connection;
pub mod connection_id;
pub mod message;
pub mod registry;

pub use connection::{Connection, ConnectionState};
pub use connection_id::ConnectionId;
pub use message::{AckFrame, RelayMessage};
pub use registry::{BroadcastReport, ConnectionRegistry};
