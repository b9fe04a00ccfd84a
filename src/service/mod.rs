//! Service layer: connection lifecycle orchestration.
//!
//! [`RelayEngine`] accepts connections into the
//! [`super::domain::ConnectionRegistry`], decodes inbound frames and fans
//! well-formed messages out to every open member.

pub mod relay_engine;

pub use relay_engine::{ConnectionEvent, RelayEngine};
