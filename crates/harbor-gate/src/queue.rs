use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::{oneshot, watch};

struct Waiter {
    id: u64,
    tx: oneshot::Sender<()>,
}

/// FIFO of parked callers, one single-use signal each.
///
/// Every mutation publishes the new depth on a watch channel. The lock is
/// only held for the queue operation itself, including the non-blocking
/// oneshot send of a hand-off, so "removed" and "handed a slot" can never be
/// observed half-way.
pub(crate) struct WaitQueue {
    waiters:  Mutex<VecDeque<Waiter>>,
    next_id:  AtomicU64,
    depth_tx: watch::Sender<usize>,
}

impl WaitQueue {
    pub(crate) fn new() -> Self {
        Self {
            waiters:  Mutex::new(VecDeque::new()),
            next_id:  AtomicU64::new(0),
            depth_tx: watch::Sender::new(0),
        }
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<Waiter>> {
        self.waiters.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, depth: usize) {
        self.depth_tx.send_if_modified(|current| {
            let changed = *current != depth;
            *current = depth;
            changed
        });
    }

    pub(crate) fn len(&self) -> usize { self.lock().len() }

    pub(crate) fn is_empty(&self) -> bool { self.lock().is_empty() }

    pub(crate) fn subscribe(&self) -> watch::Receiver<usize> { self.depth_tx.subscribe() }

    /// Append a waiter at the tail.
    pub(crate) fn push(&self) -> (u64, oneshot::Receiver<()>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();

        let mut waiters = self.lock();
        waiters.push_back(Waiter { id, tx });
        self.publish(waiters.len());

        (id, rx)
    }

    /// Hand a slot to the oldest live waiter.
    ///
    /// Waiters whose receiver is already gone are discarded on the way.
    /// Returns `false` when nobody was left to take the slot.
    pub(crate) fn deliver_head(&self) -> bool {
        let mut waiters = self.lock();
        let mut delivered = false;

        while let Some(waiter) = waiters.pop_front() {
            if waiter.tx.send(()).is_ok() {
                delivered = true;
                break;
            }
            tracing::trace!(waiter = waiter.id, "skipping abandoned waiter");
        }

        self.publish(waiters.len());
        delivered
    }

    /// Remove a specific waiter, keeping the order of the rest.
    ///
    /// Returns `false` if it had already been popped.
    pub(crate) fn remove(&self, id: u64) -> bool {
        let mut waiters = self.lock();
        let before = waiters.len();
        waiters.retain(|w| w.id != id);
        let removed = waiters.len() != before;

        self.publish(waiters.len());
        removed
    }

    /// Drop every waiter; their receivers observe a closed channel.
    pub(crate) fn clear(&self) -> usize {
        let mut waiters = self.lock();
        let dropped = waiters.len();
        waiters.clear();

        self.publish(0);
        dropped
    }
}
