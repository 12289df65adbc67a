use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::{oneshot, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::error::{GateError, Result};
use crate::queue::WaitQueue;

struct Inner {
    active:   AtomicUsize,
    limit:    AtomicUsize,
    queue:    WaitQueue,
    disposed: CancellationToken,
    limit_tx: watch::Sender<usize>,
}

impl Inner {
    /// Optimistic admission: claim a slot, roll back if that overshot the limit.
    fn try_admit(&self) -> bool {
        let prev = self.active.fetch_add(1, Ordering::AcqRel);
        if prev < self.limit.load(Ordering::Acquire) {
            true
        } else {
            self.active.fetch_sub(1, Ordering::AcqRel);
            false
        }
    }

    /// Claim a slot on behalf of the queue head and deliver it.
    fn hand_off_one(&self) -> bool {
        loop {
            if self.queue.is_empty() || !self.try_admit() {
                return false;
            }
            if self.queue.deliver_head() {
                return true;
            }
            // Every waiter had gone away; give the slot back and look again in
            // case somebody enqueued meanwhile.
            self.active.fetch_sub(1, Ordering::AcqRel);
        }
    }

    fn drain(&self) {
        while self.hand_off_one() {}
    }

    fn release_slot(&self) {
        self.active.fetch_sub(1, Ordering::AcqRel);
        self.drain();
    }
}

/// Admission gate bounding how many operations run concurrently.
///
/// Cloning is cheap and every clone shares the same slots and queue.
#[derive(Clone)]
pub struct Gate {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for Gate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gate")
            .field("limit", &self.limit())
            .field("active", &self.active())
            .field("queued", &self.queued())
            .finish()
    }
}

impl Gate {
    pub fn new(limit: usize) -> Result<Self> {
        if limit == 0 {
            return Err(GateError::InvalidLimit(limit));
        }

        Ok(Self {
            inner: Arc::new(Inner {
                active:   AtomicUsize::new(0),
                limit:    AtomicUsize::new(limit),
                queue:    WaitQueue::new(),
                disposed: CancellationToken::new(),
                limit_tx: watch::Sender::new(limit),
            }),
        })
    }

    pub fn limit(&self) -> usize { self.inner.limit.load(Ordering::Acquire) }

    /// Operations currently holding a slot.
    pub fn active(&self) -> usize { self.inner.active.load(Ordering::Acquire) }

    /// Callers currently parked in the wait queue.
    pub fn queued(&self) -> usize { self.inner.queue.len() }

    pub fn is_disposed(&self) -> bool { self.inner.disposed.is_cancelled() }

    /// Coalesced notifications of the current limit.
    pub fn limit_changes(&self) -> watch::Receiver<usize> { self.inner.limit_tx.subscribe() }

    /// Coalesced notifications of the wait-queue depth.
    pub fn queue_depth_changes(&self) -> watch::Receiver<usize> { self.inner.queue.subscribe() }

    /// Swap the concurrency limit.
    ///
    /// Raising the limit by `k` immediately hands slots to up to `k` of the
    /// longest-waiting callers. Lowering it never interrupts running work; the
    /// gate simply stops admitting until enough operations have finished.
    pub fn set_limit(&self, limit: usize) -> Result<()> {
        if limit == 0 {
            return Err(GateError::InvalidLimit(limit));
        }
        if self.is_disposed() {
            return Err(GateError::Disposed);
        }

        let old = self.inner.limit.swap(limit, Ordering::AcqRel);
        self.inner.limit_tx.send_replace(limit);

        if limit > old {
            let mut woken = 0;
            while woken < limit - old && self.inner.hand_off_one() {
                woken += 1;
            }
            debug!(old, new = limit, woken, "concurrency limit raised");
        } else if limit < old {
            debug!(old, new = limit, "concurrency limit lowered");
        }

        Ok(())
    }

    /// Wait for a slot.
    ///
    /// The slot is held until the returned [`Permit`] is dropped. If `cancel`
    /// fires while queued the caller is removed from the queue and
    /// [`GateError::Cancelled`] is returned.
    pub async fn acquire(&self, cancel: &CancellationToken) -> Result<Permit> {
        if self.is_disposed() {
            return Err(GateError::Disposed);
        }
        if cancel.is_cancelled() {
            return Err(GateError::Cancelled);
        }
        if self.inner.try_admit() {
            return Ok(Permit::new(Arc::clone(&self.inner)));
        }

        let (id, rx) = self.inner.queue.push();
        let mut waiting = Waiting {
            inner: &self.inner,
            id,
            rx,
            settled: false,
        };
        trace!(waiter = id, "queued for admission");

        // A slot may have been freed between the failed fast path and the push.
        self.inner.drain();

        let wake = tokio::select! {
            biased;
            _ = cancel.cancelled() => Wake::Cancelled,
            _ = self.inner.disposed.cancelled() => Wake::Cancelled,
            res = &mut waiting.rx => if res.is_ok() { Wake::Admitted } else { Wake::Closed },
        };

        match wake {
            Wake::Admitted => {
                waiting.settled = true;
                Ok(Permit::new(Arc::clone(&self.inner)))
            }
            Wake::Closed => {
                waiting.settled = true;
                Err(GateError::Cancelled)
            }
            Wake::Cancelled => Err(GateError::Cancelled),
        }
    }

    /// Run `op` once admitted, returning its output unchanged.
    pub async fn execute<F, Fut>(&self, cancel: &CancellationToken, op: F) -> Result<Fut::Output>
    where
        F: FnOnce() -> Fut,
        Fut: Future,
    {
        let permit = self.acquire(cancel).await?;
        let output = op().await;
        drop(permit);
        Ok(output)
    }

    /// Release every queued caller with a cancellation and reject new ones.
    ///
    /// Operations already running keep their slots until they finish.
    pub fn dispose(&self) {
        if self.inner.disposed.is_cancelled() {
            return;
        }
        self.inner.disposed.cancel();
        let dropped = self.inner.queue.clear();
        debug!(dropped, "gate disposed");
    }
}

enum Wake {
    Admitted,
    Closed,
    Cancelled,
}

/// A queued acquisition that has not yet resolved.
///
/// Dropping it, whether through cancellation or because the surrounding task
/// was aborted, removes the queue entry. If a slot was already handed over,
/// it is released so the next waiter gets it.
struct Waiting<'a> {
    inner:   &'a Arc<Inner>,
    id:      u64,
    rx:      oneshot::Receiver<()>,
    settled: bool,
}

impl Drop for Waiting<'_> {
    fn drop(&mut self) {
        if self.settled || self.inner.queue.remove(self.id) {
            return;
        }
        if self.rx.try_recv().is_ok() {
            trace!(waiter = self.id, "returning slot handed to a departed waiter");
            self.inner.release_slot();
        }
    }
}

/// A held admission slot, released on drop.
#[must_use = "the slot is released as soon as the permit is dropped"]
pub struct Permit {
    inner: Arc<Inner>,
}

impl Permit {
    fn new(inner: Arc<Inner>) -> Self { Self { inner } }
}

impl std::fmt::Debug for Permit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Permit").finish_non_exhaustive()
    }
}

impl Drop for Permit {
    fn drop(&mut self) { self.inner.release_slot(); }
}
