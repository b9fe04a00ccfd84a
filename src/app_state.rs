//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::config::RelayConfig;
use crate::service::RelayEngine;

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Relay engine owning the connection lifecycle.
    pub engine: Arc<RelayEngine>,
    /// Runtime configuration.
    pub config: Arc<RelayConfig>,
}

impl AppState {
    /// Builds the state for a fresh, empty relay.
    #[must_use]
    pub fn new(config: RelayConfig) -> Self {
        let registry = Arc::new(crate::domain::ConnectionRegistry::new());
        let engine = Arc::new(RelayEngine::new(registry, config.outbound_queue_capacity));
        Self {
            engine,
            config: Arc::new(config),
        }
    }
}
