//! Bounded outbound mailbox with a close-once primitive.
//!
//! The router enqueues with [`Mailbox::try_enqueue`] and never waits. The
//! mailbox can be closed from several places (eviction, unregister,
//! shutdown); [`Mailbox::close`] takes the sender out under a lock so only
//! the first caller actually closes it.

use std::sync::Arc;

use fanout_core::ClientId;
use parking_lot::Mutex;
use tokio::sync::mpsc;

/// A serialized envelope queued for one connection.
pub type Payload = Arc<str>;

/// Why a non-blocking enqueue did not happen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueError {
    /// The mailbox is at capacity.
    Full,
    /// The mailbox was already closed.
    Closed,
}

/// Producer side of a connection's outbound queue.
pub struct Mailbox {
    owner: ClientId,
    tx: Mutex<Option<mpsc::Sender<Payload>>>,
    capacity: usize,
}

impl Mailbox {
    /// Create a mailbox and the receiver drained by the outbound pump.
    ///
    /// `capacity` is clamped to at least 1.
    pub fn channel(owner: ClientId, capacity: usize) -> (Arc<Self>, mpsc::Receiver<Payload>) {
        let capacity = capacity.max(1);
        let (tx, rx) = mpsc::channel(capacity);
        let mailbox = Self {
            owner,
            tx: Mutex::new(Some(tx)),
            capacity,
        };
        (Arc::new(mailbox), rx)
    }

    /// Identity of the connection this mailbox feeds.
    pub fn owner(&self) -> &ClientId {
        &self.owner
    }

    /// Configured bound.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append a payload if there is room. Never waits.
    pub fn try_enqueue(&self, payload: Payload) -> Result<(), EnqueueError> {
        let guard = self.tx.lock();
        let Some(tx) = guard.as_ref() else {
            return Err(EnqueueError::Closed);
        };
        tx.try_send(payload).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => EnqueueError::Full,
            mpsc::error::TrySendError::Closed(_) => EnqueueError::Closed,
        })
    }

    /// Close the mailbox. Returns `true` only for the call that closed it.
    ///
    /// Payloads already queued are still drained by the receiver, which then
    /// observes the end of the stream.
    pub fn close(&self) -> bool {
        self.tx.lock().take().is_some()
    }

    /// Whether [`Mailbox::close`] has run.
    pub fn is_closed(&self) -> bool {
        self.tx.lock().is_none()
    }

    /// Payloads currently waiting in the queue.
    pub fn queued(&self) -> usize {
        self.tx
            .lock()
            .as_ref()
            .map_or(0, |tx| tx.max_capacity() - tx.capacity())
    }
}

impl std::fmt::Debug for Mailbox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mailbox")
            .field("owner", &self.owner)
            .field("capacity", &self.capacity)
            .field("queued", &self.queued())
            .field("closed", &self.is_closed())
            .finish()
    }
}
