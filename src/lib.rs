//! # relay-gateway
//!
//! Real-time WebSocket relay. Clients open a persistent connection, send
//! JSON messages, and every well-formed message is rebroadcast to every
//! connected client, the sender included. Malformed messages are logged
//! and dropped.
//!
//! ## Architecture
//!
//! ```text
//! Clients (WebSocket, HTTP)
//!     │
//!     ├── WS Handler + per-connection task (ws/)
//!     ├── Bootstrap page, health (api/)
//!     │
//!     ├── RelayEngine (service/)
//!     │
//!     └── ConnectionRegistry, RelayMessage (domain/)
//! ```

pub mod api;
pub mod app_state;
pub mod config;
pub mod domain;
pub mod error;
pub mod server;
pub mod service;
pub mod ws;
