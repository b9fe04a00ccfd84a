//! Relay message codec.
//!
//! Inbound frames are decoded into a [`RelayMessage`]; the decoded value,
//! not the original bytes, is what gets re-encoded and sent onward. The
//! per-connection acknowledgement is [`AckFrame`].

use serde::Serialize;

use crate::error::RelayError;

/// A well-formed inbound message.
///
/// Any JSON document decodes successfully: objects, arrays and scalars
/// alike. Re-encoding is compact JSON: object keys keep the order the
/// sender used, whitespace and other formatting are not preserved.
#[derive(Debug, Clone, PartialEq)]
pub struct RelayMessage(serde_json::Value);

impl RelayMessage {
    /// Decodes a raw frame payload.
    ///
    /// Text frames and binary frames are treated alike: the payload must
    /// be UTF-8 JSON.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Decode`] if the payload is not valid JSON.
    pub fn decode(raw: &[u8]) -> Result<Self, RelayError> {
        let value = serde_json::from_slice(raw)?;
        Ok(Self(value))
    }

    /// Serializes the decoded value as compact JSON text.
    #[must_use]
    pub fn encode(&self) -> String {
        self.0.to_string()
    }

    /// Returns the decoded value.
    #[must_use]
    pub const fn value(&self) -> &serde_json::Value {
        &self.0
    }
}

impl From<serde_json::Value> for RelayMessage {
    fn from(value: serde_json::Value) -> Self {
        Self(value)
    }
}

/// Acknowledgement sent once to each connection right after accept.
///
/// Serializes as `{"type":"connection","status":"connected"}`.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct AckFrame {
    #[serde(rename = "type")]
    kind: &'static str,
    status: &'static str,
}

impl AckFrame {
    /// The connection acknowledgement.
    pub const CONNECTED: Self = Self {
        kind: "connection",
        status: "connected",
    };

    /// Serializes the frame as compact JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Encode`] if serialization fails.
    pub fn encode(&self) -> Result<String, RelayError> {
        serde_json::to_string(self).map_err(RelayError::Encode)
    }
}
