//! Connection registry and message router.

pub mod mailbox;
pub mod registry;
pub mod router;

pub use mailbox::{EnqueueError, Mailbox, Payload};
pub use registry::{Registry, RouteOutcome};
pub use router::{HubCommand, HubHandle, HubRouter};
