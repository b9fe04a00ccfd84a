//! Axum WebSocket upgrade handler.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::{ConnectInfo, State};
use axum::http::header::{SEC_WEBSOCKET_PROTOCOL, UPGRADE};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};

use super::connection::run_connection;
use crate::api::handlers::page;
use crate::app_state::AppState;
use crate::error::RelayError;

/// Subprotocol selected for every client that offers one.
pub const SUBPROTOCOL: &str = "arduino";

/// `GET /` — Upgrade to a relay connection, or serve the bootstrap page.
///
/// A request without an `Upgrade` header is an ordinary page load. An
/// upgrade attempt that fails validation is answered with the rejection's
/// status and no connection is created.
///
/// If the client offers any `Sec-WebSocket-Protocol`, the response selects
/// [`SUBPROTOCOL`] regardless of what was offered. No compression
/// extension is ever negotiated.
pub async fn ws_handler(
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
    ConnectInfo(remote_addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Response {
    let ws = match ws {
        Ok(ws) => ws,
        Err(_) if !headers.contains_key(UPGRADE) => return page::index_handler().await.into_response(),
        Err(rejection) => {
            let err = RelayError::Accept {
                status: rejection.status(),
                reason: rejection.body_text(),
            };
            tracing::warn!(remote = %remote_addr, error = %err, "websocket upgrade rejected");
            return err.into_response();
        }
    };

    let engine = Arc::clone(&state.engine);
    let mut response = ws
        .max_message_size(state.config.max_message_bytes)
        .max_frame_size(state.config.max_message_bytes)
        .on_failed_upgrade(move |error: axum::Error| {
            let err = RelayError::Accept {
                status: StatusCode::SWITCHING_PROTOCOLS,
                reason: error.to_string(),
            };
            tracing::warn!(remote = %remote_addr, error = %err, "websocket upgrade failed");
        })
        .on_upgrade(move |socket| run_connection(socket, engine, remote_addr));

    if headers.contains_key(SEC_WEBSOCKET_PROTOCOL) {
        response
            .headers_mut()
            .insert(SEC_WEBSOCKET_PROTOCOL, HeaderValue::from_static(SUBPROTOCOL));
    }
    response
}
