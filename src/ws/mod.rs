//! WebSocket layer: upgrade handling and the per-connection task.
//!
//! The relay endpoint lives at `/`. Upgrade requests become relay
//! connections; plain GETs receive the bootstrap page.

pub mod connection;
pub mod handler;
