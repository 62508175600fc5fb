//! # fanout-server
//!
//! Real-time message fan-out over WebSocket.
//!
//! - Hub: one router task owns the membership map and makes every routing decision
//! - Mailboxes: bounded per-connection queues with a close-once primitive; a full
//!   mailbox evicts its owner instead of stalling the router
//! - Sessions: an inbound pump (decode, stamp sender, route) and an outbound pump
//!   (drain, coalesce, keepalive) per connection
//! - HTTP: `/ws` upgrade, `/ping`, `/health`, `/clients`, `/metrics`
//! - Graceful shutdown via `CancellationToken`

#![deny(unsafe_code)]

pub mod config;
pub mod errors;
pub mod health;
pub mod hub;
pub mod metrics;
pub mod server;
pub mod shutdown;
pub mod websocket;

pub use config::ServerConfig;
pub use errors::{CloseReason, ServerError};
pub use hub::{HubHandle, HubRouter};
pub use server::FanoutServer;
