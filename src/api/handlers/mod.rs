//! HTTP endpoint handlers.

pub mod page;
pub mod system;

use axum::Router;

use crate::app_state::AppState;

/// Composes all plain HTTP routes.
///
/// `/` is not mounted here: it is shared with the WebSocket upgrade and
/// routed through [`crate::ws::handler::ws_handler`].
pub fn routes() -> Router<AppState> {
    Router::new().merge(system::routes())
}
