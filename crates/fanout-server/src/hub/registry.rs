//! Membership map and routing decisions.
//!
//! `Registry` is plain data: it is only mutated from the router task, which
//! holds the write lock for the duration of a single command.

use std::collections::HashMap;
use std::sync::Arc;

use fanout_core::{ClientId, Envelope};
use tracing::{debug, warn};

use super::mailbox::{EnqueueError, Mailbox, Payload};

/// Result of routing one envelope.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RouteOutcome {
    /// Mailboxes that accepted the payload.
    pub delivered: usize,
    /// Members removed because their mailbox was full or already closed.
    pub evicted: Vec<ClientId>,
    /// A directed envelope named an identity that is not registered.
    pub unresolved: bool,
}

/// Identity → mailbox map.
#[derive(Debug, Default)]
pub struct Registry {
    members: HashMap<ClientId, Arc<Mailbox>>,
}

impl Registry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a member keyed by its mailbox owner.
    ///
    /// Identities are unique upstream; if one is registered again the old
    /// mailbox is closed so the map never points at two queues for one id.
    pub fn register(&mut self, mailbox: Arc<Mailbox>) {
        let id = mailbox.owner().clone();
        if let Some(previous) = self.members.insert(id, mailbox) {
            warn!(client_id = %previous.owner(), "identity registered twice, closing previous mailbox");
            let _ = previous.close();
        }
    }

    /// Remove a member and close its mailbox. Absent identities are a no-op.
    ///
    /// Returns whether a member was removed.
    pub fn unregister(&mut self, id: &str) -> bool {
        match self.members.remove(id) {
            Some(mailbox) => {
                let _ = mailbox.close();
                true
            }
            None => false,
        }
    }

    /// Deliver an envelope: to its target if set, otherwise to every member
    /// (the sender included).
    pub fn route(&mut self, envelope: &Envelope) -> RouteOutcome {
        let payload: Payload = match envelope.to_json() {
            Ok(json) => Arc::from(json),
            Err(e) => {
                warn!(from = %envelope.from, error = %e, "failed to serialize envelope");
                return RouteOutcome::default();
            }
        };

        match &envelope.target {
            Some(target) => self.deliver_direct(target, payload),
            None => self.deliver_broadcast(&payload),
        }
    }

    fn deliver_direct(&mut self, target: &ClientId, payload: Payload) -> RouteOutcome {
        let mut outcome = RouteOutcome::default();
        let Some(mailbox) = self.members.get(target) else {
            debug!(target = %target, "direct target not registered, dropping");
            outcome.unresolved = true;
            return outcome;
        };
        match mailbox.try_enqueue(payload) {
            Ok(()) => outcome.delivered = 1,
            Err(e) => {
                let _ = self.evict(target, e);
                outcome.evicted.push(target.clone());
            }
        }
        outcome
    }

    fn deliver_broadcast(&mut self, payload: &Payload) -> RouteOutcome {
        let mut outcome = RouteOutcome::default();
        self.members.retain(|id, mailbox| match mailbox.try_enqueue(payload.clone()) {
            Ok(()) => {
                outcome.delivered += 1;
                true
            }
            Err(e) => {
                log_eviction(id, e);
                let _ = mailbox.close();
                outcome.evicted.push(id.clone());
                false
            }
        });
        outcome
    }

    fn evict(&mut self, id: &ClientId, cause: EnqueueError) -> bool {
        log_eviction(id, cause);
        self.unregister(id)
    }

    /// Close every mailbox and empty the map. Returns how many were closed.
    pub fn close_all(&mut self) -> usize {
        let count = self.members.len();
        for (_, mailbox) in self.members.drain() {
            let _ = mailbox.close();
        }
        count
    }

    /// Whether an identity is registered.
    #[cfg(test)]
    pub(crate) fn contains(&self, id: &str) -> bool {
        self.members.contains_key(id)
    }

    /// Number of registered members.
    pub(crate) fn len(&self) -> usize {
        self.members.len()
    }

    /// Whether no one is registered.
    #[cfg(test)]
    pub(crate) fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Copy of the registered identities, sorted.
    pub fn ids(&self) -> Vec<ClientId> {
        let mut ids: Vec<ClientId> = self.members.keys().cloned().collect();
        ids.sort();
        ids
    }
}

fn log_eviction(id: &ClientId, cause: EnqueueError) {
    match cause {
        EnqueueError::Full => warn!(client_id = %id, "mailbox full, evicting slow consumer"),
        EnqueueError::Closed => debug!(client_id = %id, "mailbox already closed, removing"),
    }
}
