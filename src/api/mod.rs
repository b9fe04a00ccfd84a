//! HTTP layer: the bootstrap page and service endpoints that sit beside
//! the relay.

pub mod handlers;

use axum::Router;

use crate::app_state::AppState;

/// Builds the router for all plain HTTP endpoints.
pub fn build_router() -> Router<AppState> {
    handlers::routes()
}
