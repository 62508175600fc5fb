//! The router task and the handle sessions use to reach it.
//!
//! All membership changes and routing decisions happen inside
//! [`HubRouter::run`], one command at a time. Commands from one session are
//! applied in the order it submitted them because they share one queue.

use std::sync::Arc;

use fanout_core::{ClientId, Envelope};
use metrics::{counter, gauge};
use parking_lot::RwLock;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, trace};

use super::mailbox::Mailbox;
use super::registry::Registry;
use crate::metrics::{
    HUB_CLIENTS_REGISTERED, HUB_EVICTIONS_TOTAL, HUB_MESSAGES_DROPPED_TOTAL,
    HUB_MESSAGES_ROUTED_TOTAL,
};

/// Work submitted to the router.
#[derive(Debug)]
pub enum HubCommand {
    /// Add a member. `ack` fires once the member is visible to routing.
    Register {
        /// Mailbox of the new member; its owner is the member identity.
        mailbox: Arc<Mailbox>,
        /// Completed after the registry was updated.
        ack: oneshot::Sender<()>,
    },
    /// Remove a member and close its mailbox. No-op when absent.
    Unregister(ClientId),
    /// Deliver an envelope to its target or to everyone.
    Route(Envelope),
    /// Completed once every command queued before it was applied.
    Flush(oneshot::Sender<()>),
}

/// Owner of the registry. Run it with [`HubRouter::run`].
pub struct HubRouter {
    rx: mpsc::Receiver<HubCommand>,
    registry: Arc<RwLock<Registry>>,
    shutdown: CancellationToken,
}

/// Cloneable submission side of the router.
#[derive(Clone)]
pub struct HubHandle {
    tx: mpsc::Sender<HubCommand>,
    registry: Arc<RwLock<Registry>>,
}

impl HubHandle {
    /// Create a router and a handle to it.
    ///
    /// `capacity` bounds the command queue; submitters wait when it is full.
    /// The router stops when `shutdown` is cancelled or every handle is gone.
    pub fn new(capacity: usize, shutdown: CancellationToken) -> (Self, HubRouter) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let registry = Arc::new(RwLock::new(Registry::new()));
        let handle = Self {
            tx,
            registry: registry.clone(),
        };
        let router = HubRouter {
            rx,
            registry,
            shutdown,
        };
        (handle, router)
    }

    /// Register a mailbox and wait until it is routable.
    ///
    /// Returns `false` if the router has stopped; the caller should then
    /// abandon the connection.
    pub async fn register(&self, mailbox: Arc<Mailbox>) -> bool {
        let (ack, done) = oneshot::channel();
        if self
            .tx
            .send(HubCommand::Register { mailbox, ack })
            .await
            .is_err()
        {
            return false;
        }
        done.await.is_ok()
    }

    /// Ask the router to remove a member. Safe to call for absent members
    /// and after the router stopped.
    pub async fn unregister(&self, id: ClientId) {
        if self.tx.send(HubCommand::Unregister(id)).await.is_err() {
            trace!("router stopped, unregister ignored");
        }
    }

    /// Submit an envelope for delivery.
    pub async fn route(&self, envelope: Envelope) {
        if self.tx.send(HubCommand::Route(envelope)).await.is_err() {
            trace!("router stopped, envelope discarded");
        }
    }

    /// Wait until every command submitted before this call was applied.
    pub async fn flush(&self) {
        let (ack, done) = oneshot::channel();
        if self.tx.send(HubCommand::Flush(ack)).await.is_ok() {
            let _ = done.await;
        }
    }

    /// Snapshot of registered identities, sorted.
    pub fn clients(&self) -> Vec<ClientId> {
        self.registry.read().ids()
    }

    /// Number of registered members.
    pub fn client_count(&self) -> usize {
        self.registry.read().len()
    }

    /// Whether the router has stopped accepting commands.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl std::fmt::Debug for HubHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HubHandle")
            .field("clients", &self.client_count())
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl HubRouter {
    /// Apply commands until shutdown, then close every mailbox.
    #[instrument(skip_all, name = "hub_router")]
    pub async fn run(mut self) {
        info!("hub router started");
        loop {
            tokio::select! {
                biased;
                () = self.shutdown.cancelled() => break,
                cmd = self.rx.recv() => match cmd {
                    Some(cmd) => self.apply(cmd),
                    None => break,
                },
            }
        }
        self.rx.close();
        let closed = self.registry.write().close_all();
        record_registered(0);
        info!(closed, "hub router stopped");
    }

    fn apply(&self, cmd: HubCommand) {
        match cmd {
            HubCommand::Register { mailbox, ack } => {
                let id = mailbox.owner().clone();
                let count = {
                    let mut registry = self.registry.write();
                    registry.register(mailbox);
                    registry.len()
                };
                debug!(client_id = %id, count, "registered");
                record_registered(count);
                let _ = ack.send(());
            }
            HubCommand::Unregister(id) => {
                let (removed, count) = {
                    let mut registry = self.registry.write();
                    (registry.unregister(&id), registry.len())
                };
                if removed {
                    debug!(client_id = %id, count, "unregistered");
                    record_registered(count);
                }
            }
            HubCommand::Route(envelope) => {
                trace!(from = %envelope.from, broadcast = envelope.is_broadcast(), "routing");
                let (outcome, count) = {
                    let mut registry = self.registry.write();
                    (registry.route(&envelope), registry.len())
                };
                counter!(HUB_MESSAGES_ROUTED_TOTAL).increment(outcome.delivered as u64);
                if outcome.unresolved {
                    counter!(HUB_MESSAGES_DROPPED_TOTAL).increment(1);
                }
                if !outcome.evicted.is_empty() {
                    counter!(HUB_EVICTIONS_TOTAL).increment(outcome.evicted.len() as u64);
                    record_registered(count);
                }
            }
            HubCommand::Flush(ack) => {
                let _ = ack.send(());
            }
        }
    }
}

#[allow(clippy::cast_precision_loss)]
fn record_registered(count: usize) {
    gauge!(HUB_CLIENTS_REGISTERED).set(count as f64);
}
