//! Server configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::ServerError;

/// Shortest accepted read deadline; the keepalive period is derived from it.
pub const MIN_PONG_WAIT_MS: u64 = 10;

/// Runtime configuration for the fanout server.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind (default `"127.0.0.1"`).
    pub host: String,
    /// Port to bind (default `0` for auto-assign).
    pub port: u16,
    /// Outbound mailbox bound per connection.
    pub mailbox_capacity: usize,
    /// Max inbound frame payload in bytes.
    pub max_message_size: usize,
    /// Read deadline in milliseconds, reset by every inbound frame.
    pub pong_wait_ms: u64,
    /// Deadline for a single outbound write in milliseconds.
    pub write_wait_ms: u64,
    /// Merge already-queued payloads into one outbound frame.
    pub coalesce: bool,
    /// Router command queue bound.
    pub command_queue_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
            mailbox_capacity: 256,
            max_message_size: 512,
            pong_wait_ms: 60_000,
            write_wait_ms: 10_000,
            coalesce: true,
            command_queue_capacity: 1024,
        }
    }
}

impl ServerConfig {
    /// How long a connection may stay silent before it is considered dead.
    pub fn pong_wait(&self) -> Duration {
        Duration::from_millis(self.pong_wait_ms)
    }

    /// Keepalive period: nine tenths of the read deadline.
    pub fn ping_period(&self) -> Duration {
        self.pong_wait() * 9 / 10
    }

    /// Deadline for a single outbound write.
    pub fn write_wait(&self) -> Duration {
        Duration::from_millis(self.write_wait_ms)
    }

    /// Reject values the session pumps cannot run with.
    pub fn validate(&self) -> Result<(), ServerError> {
        let invalid = |msg: &str| Err(ServerError::InvalidConfig(msg.to_owned()));
        if self.pong_wait_ms < MIN_PONG_WAIT_MS {
            return invalid("pong_wait_ms must be at least 10");
        }
        if self.write_wait_ms == 0 {
            return invalid("write_wait_ms must be at least 1");
        }
        if self.mailbox_capacity == 0 {
            return invalid("mailbox_capacity must be at least 1");
        }
        if self.max_message_size == 0 {
            return invalid("max_message_size must be at least 1");
        }
        if self.command_queue_capacity == 0 {
            return invalid("command_queue_capacity must be at least 1");
        }
        Ok(())
    }
}
