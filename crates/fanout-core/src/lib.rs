//! # fanout-core
//!
//! Shared vocabulary for the fanout hub:
//!
//! - **Identity**: [`ClientId`], a newtype over the UUID string assigned at acceptance
//! - **Envelope**: the routable unit exchanged with every connection, plus the
//!   inbound decode rule (malformed input degrades to a raw broadcast)
//! - **Errors**: [`EnvelopeError`] via `thiserror`

#![deny(unsafe_code)]

pub mod envelope;
pub mod errors;
pub mod ids;

pub use envelope::{Envelope, MessageKind};
pub use errors::EnvelopeError;
pub use ids::ClientId;
