//! Per-connection session: inbound pump, outbound pump and liveness.

pub mod inbound;
pub mod liveness;
pub mod outbound;
pub mod session;

pub use liveness::Liveness;
pub use outbound::OutboundOptions;
pub use session::{SessionConfig, run_session, serve_socket};
