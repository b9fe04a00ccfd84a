//! Relay error types.
//!
//! [`RelayError`] carries the relay's error taxonomy. None of these errors
//! is fatal to the process: decode, delivery and transport failures are
//! logged and recovered where they happen. Only [`RelayError::Accept`]
//! ever reaches a client, as the HTTP response to a rejected upgrade.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::domain::ConnectionId;

/// Structured JSON error response body.
///
/// ```json
/// {
///   "error": {
///     "code": 4001,
///     "message": "upgrade rejected: Connection header did not include 'upgrade'"
///   }
/// }
/// ```
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Numeric error code.
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
}

/// Why a single outbound write could not be queued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DeliveryError {
    /// The connection is not in a state that accepts this write.
    #[error("connection is not open")]
    NotOpen,

    /// The recipient's outbound queue is at capacity.
    #[error("outbound queue is full")]
    QueueFull,

    /// The recipient's writer has gone away.
    #[error("outbound queue is closed")]
    Closed,
}

/// Relay error enum.
///
/// # Error Code Ranges
///
/// | Range     | Category   |
/// |-----------|------------|
/// | 1000–1999 | Decode     |
/// | 2000–2999 | Delivery   |
/// | 3000–3999 | Transport  |
/// | 4000–4999 | Accept     |
/// | 5000–5999 | Server     |
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// Inbound frame is not valid JSON.
    #[error("malformed message: {0}")]
    Decode(#[from] serde_json::Error),

    /// An outbound frame could not be serialized.
    #[error("failed to encode frame: {0}")]
    Encode(#[source] serde_json::Error),

    /// A write to one broadcast recipient failed.
    #[error("delivery to {conn_id} failed: {source}")]
    Delivery {
        /// Recipient that could not be written to.
        conn_id: ConnectionId,
        /// Underlying cause.
        #[source]
        source: DeliveryError,
    },

    /// The connection's transport reported an error.
    #[error("transport error: {0}")]
    Transport(#[from] axum::Error),

    /// The WebSocket upgrade could not be completed.
    #[error("upgrade rejected: {reason}")]
    Accept {
        /// HTTP status returned to the client.
        status: StatusCode,
        /// Human-readable rejection reason.
        reason: String,
    },

    /// A configuration value could not be used.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Socket-level I/O failure (bind, serve).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl RelayError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::Decode(_) => 1001,
            Self::Encode(_) => 1002,
            Self::Delivery { source, .. } => match source {
                DeliveryError::NotOpen => 2001,
                DeliveryError::QueueFull => 2002,
                DeliveryError::Closed => 2003,
            },
            Self::Transport(_) => 3001,
            Self::Accept { .. } => 4001,
            Self::Config(_) => 5001,
            Self::Io(_) => 5002,
        }
    }

    /// Returns the HTTP status code for this variant.
    ///
    /// Only [`RelayError::Accept`] is ever turned into a response; every
    /// other variant is log-only and maps to 500 should it surface.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::Accept { status, .. } => *status,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.error_code(),
                message: self.to_string(),
            },
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}
