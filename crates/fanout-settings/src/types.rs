//! Settings type definitions.
//!
//! All types use camelCase on the wire and `#[serde(default)]`, so a partial
//! settings file only needs the keys it changes.

use serde::{Deserialize, Serialize};

/// Root settings type.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FanoutSettings {
    /// Listener and per-connection limits.
    pub server: ServerSettings,
    /// Log output configuration.
    pub logging: LoggingSettings,
}

/// Listener and per-connection settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Bind address.
    pub host: String,
    /// HTTP / WebSocket port.
    pub port: u16,
    /// Outbound mailbox bound per connection. A full mailbox evicts its owner.
    pub mailbox_capacity: usize,
    /// Largest inbound frame payload in bytes.
    pub max_message_size: usize,
    /// Read deadline in milliseconds; reset by every inbound frame.
    pub pong_wait_ms: u64,
    /// Per-write deadline in milliseconds.
    pub write_wait_ms: u64,
    /// Merge already-queued payloads into one outbound frame.
    pub coalesce: bool,
    /// Router command queue bound.
    pub command_queue_capacity: usize,
    /// How long shutdown waits for the server task.
    pub shutdown_timeout_ms: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            mailbox_capacity: 256,
            max_message_size: 512,
            pong_wait_ms: 60_000,
            write_wait_ms: 10_000,
            coalesce: true,
            command_queue_capacity: 1024,
            shutdown_timeout_ms: 5_000,
        }
    }
}

/// Log level names accepted in settings.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Trace-level (most verbose).
    Trace,
    /// Debug-level.
    Debug,
    /// Info-level (default).
    #[default]
    Info,
    /// Warning-level.
    Warn,
    /// Error-level.
    Error,
}

impl LogLevel {
    /// Convert to a tracing filter string.
    pub fn as_filter_str(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }

    /// Parse a level name (case-insensitive).
    pub fn parse(val: &str) -> Option<Self> {
        match val.to_lowercase().as_str() {
            "trace" => Some(Self::Trace),
            "debug" => Some(Self::Debug),
            "info" => Some(Self::Info),
            "warn" | "warning" => Some(Self::Warn),
            "error" => Some(Self::Error),
            _ => None,
        }
    }
}

/// Logging configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default level when `RUST_LOG` is unset.
    pub level: LogLevel,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}
