//! Relay configuration loaded from environment variables.
//!
//! Follows 12-factor style: every setting comes from the environment (or
//! a `.env` file via `dotenvy`) and falls back to a built-in default.
//!
//! | Variable                  | Default         |
//! |---------------------------|-----------------|
//! | `LISTEN_ADDR`             | `0.0.0.0:3015`  |
//! | `OUTBOUND_QUEUE_CAPACITY` | `256`           |
//! | `MAX_MESSAGE_BYTES`       | `104857600`     |
//! | `LOG_FORMAT`              | `text`          |

use std::net::SocketAddr;

use crate::error::RelayError;

/// Default bind address: all interfaces, port 3015.
pub const DEFAULT_LISTEN_ADDR: SocketAddr =
    SocketAddr::new(std::net::IpAddr::V4(std::net::Ipv4Addr::UNSPECIFIED), 3015);

/// Default per-connection outbound queue capacity, in frames.
pub const DEFAULT_OUTBOUND_QUEUE_CAPACITY: usize = 256;

/// Default largest accepted inbound message (100 MiB).
pub const DEFAULT_MAX_MESSAGE_BYTES: usize = 100 * 1024 * 1024;

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}

/// Top-level relay configuration.
///
/// Loaded once at startup via [`RelayConfig::from_env`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayConfig {
    /// Socket address to bind the HTTP server to.
    pub listen_addr: SocketAddr,

    /// Frames each connection may have queued before new ones are dropped.
    pub outbound_queue_capacity: usize,

    /// Largest inbound WebSocket message accepted, in bytes.
    pub max_message_bytes: usize,

    /// Log output format.
    pub log_format: LogFormat,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            listen_addr: DEFAULT_LISTEN_ADDR,
            outbound_queue_capacity: DEFAULT_OUTBOUND_QUEUE_CAPACITY,
            max_message_bytes: DEFAULT_MAX_MESSAGE_BYTES,
            log_format: LogFormat::Text,
        }
    }
}

impl RelayConfig {
    /// Loads configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv().ok()` to optionally load a `.env` file.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Config`] if `LISTEN_ADDR` is set but cannot be
    /// parsed as a [`SocketAddr`].
    pub fn from_env() -> Result<Self, RelayError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds configuration from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Config`] if `LISTEN_ADDR` is present but
    /// invalid.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, RelayError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let listen_addr = match lookup("LISTEN_ADDR") {
            Some(raw) => raw
                .parse()
                .map_err(|e| RelayError::Config(format!("LISTEN_ADDR={raw}: {e}")))?,
            None => DEFAULT_LISTEN_ADDR,
        };

        let outbound_queue_capacity = parse_or(
            lookup("OUTBOUND_QUEUE_CAPACITY"),
            DEFAULT_OUTBOUND_QUEUE_CAPACITY,
        )
        .max(1);
        let max_message_bytes = parse_or(lookup("MAX_MESSAGE_BYTES"), DEFAULT_MAX_MESSAGE_BYTES);

        let log_format = match lookup("LOG_FORMAT").as_deref() {
            Some("json") | Some("JSON") => LogFormat::Json,
            _ => LogFormat::Text,
        };

        Ok(Self {
            listen_addr,
            outbound_queue_capacity,
            max_message_bytes,
            log_format,
        })
    }
}

/// Parses `raw` as `T`, returning `default` on missing or invalid values.
fn parse_or<T: std::str::FromStr>(raw: Option<String>, default: T) -> T {
    raw.and_then(|v| v.parse().ok()).unwrap_or(default)
}
