//! Session termination reasons and server errors.

use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;

/// Why a session's pumps stopped.
///
/// Every variant is contained to the one session; none reach the router.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CloseReason {
    /// Nothing arrived within the liveness window.
    #[error("no frame received within {0:?}")]
    ReadTimeout(Duration),
    /// Inbound frame exceeded the configured limit.
    #[error("frame of {size} bytes exceeds limit of {limit}")]
    FrameTooLarge {
        /// Payload length of the offending frame.
        size: usize,
        /// Configured maximum.
        limit: usize,
    },
    /// The transport reported a read error.
    #[error("transport read failed: {0}")]
    Read(String),
    /// The peer sent a close frame or the stream ended.
    #[error("transport closed by peer")]
    PeerClosed,
    /// The transport reported a write error.
    #[error("transport write failed: {0}")]
    Write(String),
    /// A write did not complete within the write deadline.
    #[error("write timed out after {0:?}")]
    WriteTimeout(Duration),
    /// The hub closed the mailbox (eviction, unregister or shutdown).
    #[error("mailbox closed by hub")]
    MailboxClosed,
    /// The other pump of the same session stopped first.
    #[error("session cancelled")]
    Cancelled,
}

impl CloseReason {
    /// Whether this is an ordinary way for a connection to end.
    pub fn is_expected(&self) -> bool {
        matches!(self, Self::PeerClosed | Self::MailboxClosed | Self::Cancelled)
    }

    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ReadTimeout(_) => "read_timeout",
            Self::FrameTooLarge { .. } => "frame_too_large",
            Self::Read(_) => "read_error",
            Self::PeerClosed => "peer_closed",
            Self::Write(_) => "write_error",
            Self::WriteTimeout(_) => "write_timeout",
            Self::MailboxClosed => "mailbox_closed",
            Self::Cancelled => "cancelled",
        }
    }
}

/// Errors raised while starting or running the HTTP listener.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The listener could not bind.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// Requested address.
        addr: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// The configured host/port did not form a socket address.
    #[error("invalid listen address {0}")]
    InvalidAddress(String),
    /// A configuration value is out of range.
    #[error("invalid server config: {0}")]
    InvalidConfig(String),
    /// The bound listener could not report its address.
    #[error("listener address unavailable: {0}")]
    LocalAddr(std::io::Error),
}

impl ServerError {
    /// Shorthand used by `listen` when binding fails.
    pub(crate) fn bind(addr: SocketAddr, source: std::io::Error) -> Self {
        Self::Bind {
            addr: addr.to_string(),
            source,
        }
    }
}
