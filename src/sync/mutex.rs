//! Fair, FIFO, timeout-capable async mutex
//!
//! Waiters are granted strictly in arrival order. A waiter whose timeout
//! fires stays in the queue marked as expired; when the queue reaches it on
//! a later release the grant skips straight through to the next entry.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::oneshot;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LockError {
    #[error("Mutex acquire timeout after {0:?}")]
    Timeout(Duration),

    #[error("Mutex waiter was dropped before it could be granted")]
    Abandoned,
}

/// Queue entry for a blocked `acquire` call.
struct Waiter {
    grant: oneshot::Sender<()>,
    expired: Arc<AtomicBool>,
}

#[derive(Default)]
struct LockState {
    held: bool,
    queue: VecDeque<Waiter>,
}

#[derive(Default)]
struct Inner {
    state: Mutex<LockState>,
}

impl Inner {
    fn lock_state(&self) -> MutexGuard<'_, LockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Hand the lock to the longest-waiting live waiter, or free it.
    fn release(&self) {
        let mut state = self.lock_state();
        while let Some(waiter) = state.queue.pop_front() {
            if waiter.expired.load(Ordering::Acquire) {
                tracing::trace!("Skipping expired mutex waiter");
                continue;
            }
            // A failed send means the acquiring future was dropped.
            if waiter.grant.send(()).is_ok() {
                return;
            }
            tracing::trace!("Skipping abandoned mutex waiter");
        }
        state.held = false;
    }
}

/// Async mutex shared by every command invocation of an executor.
///
/// Cloning yields another handle to the same lock.
#[derive(Clone, Default)]
pub struct FifoMutex {
    inner: Arc<Inner>,
}

/// Release capability returned by a successful acquire.
///
/// Dropping the guard releases the lock exactly once.
#[must_use = "the lock is released as soon as the guard is dropped"]
pub struct FifoMutexGuard {
    inner: Arc<Inner>,
}

impl FifoMutexGuard {
    /// Release the lock explicitly.
    pub fn release(self) {
        drop(self);
    }
}

impl Drop for FifoMutexGuard {
    fn drop(&mut self) {
        self.inner.release();
    }
}

impl std::fmt::Debug for FifoMutexGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FifoMutexGuard").finish_non_exhaustive()
    }
}

impl std::fmt::Debug for FifoMutex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FifoMutex")
            .field("locked", &self.is_locked())
            .field("waiting", &self.waiting())
            .finish()
    }
}

impl FifoMutex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for the lock with no deadline.
    pub async fn acquire(&self) -> Result<FifoMutexGuard, LockError> {
        self.enqueue().wait().await
    }

    /// Wait for the lock, giving up after `timeout`.
    ///
    /// A zero timeout fails immediately whenever the lock is held.
    pub async fn acquire_timeout(&self, timeout: Duration) -> Result<FifoMutexGuard, LockError> {
        self.enqueue().wait_timeout(timeout).await
    }

    /// Take a place in the queue now and wait for it later.
    ///
    /// The ticket's position is fixed when this returns, so callers that
    /// enqueue in order are granted in that order no matter when they wait.
    pub fn enqueue(&self) -> LockTicket {
        let mut state = self.inner.lock_state();
        if !state.held {
            state.held = true;
            return LockTicket(Ticket::Granted(self.guard()));
        }

        let (grant, granted) = oneshot::channel();
        let expired = Arc::new(AtomicBool::new(false));
        state.queue.push_back(Waiter {
            grant,
            expired: Arc::clone(&expired),
        });
        LockTicket(Ticket::Queued {
            pending: PendingGrant {
                granted,
                inner: Arc::clone(&self.inner),
                settled: false,
            },
            expired,
        })
    }

    /// Take the lock only if it is free right now.
    pub fn try_acquire(&self) -> Option<FifoMutexGuard> {
        let mut state = self.inner.lock_state();
        if state.held {
            return None;
        }
        state.held = true;
        Some(self.guard())
    }

    pub fn is_locked(&self) -> bool {
        self.inner.lock_state().held
    }

    /// Number of queued entries, expired ones included.
    pub fn waiting(&self) -> usize {
        self.inner.lock_state().queue.len()
    }

    fn guard(&self) -> FifoMutexGuard {
        FifoMutexGuard {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// A reserved place in a [`FifoMutex`] queue.
///
/// Dropping an unredeemed ticket gives up the place; a grant that already
/// reached it is passed on to the next waiter.
#[must_use = "dropping a ticket gives up its place in the queue"]
pub struct LockTicket(Ticket);

enum Ticket {
    /// The lock was free when the ticket was issued
    Granted(FifoMutexGuard),
    /// Waiting behind earlier holders
    Queued {
        pending: PendingGrant,
        expired: Arc<AtomicBool>,
    },
}

impl std::fmt::Debug for LockTicket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockTicket")
            .field("granted", &self.is_granted())
            .finish()
    }
}

impl LockTicket {
    /// True when the lock was free at issue and is already held by this ticket.
    pub fn is_granted(&self) -> bool {
        matches!(self.0, Ticket::Granted(_))
    }

    /// Wait for this ticket's turn with no deadline.
    pub async fn wait(self) -> Result<FifoMutexGuard, LockError> {
        match self.0 {
            Ticket::Granted(guard) => Ok(guard),
            Ticket::Queued { mut pending, .. } => {
                let outcome = (&mut pending.granted)
                    .await
                    .map_err(|_| LockError::Abandoned);
                pending.settle(outcome)
            }
        }
    }

    /// Wait for this ticket's turn, giving up after `timeout`.
    ///
    /// An expired ticket stays queued and is skipped when its turn comes.
    pub async fn wait_timeout(self, timeout: Duration) -> Result<FifoMutexGuard, LockError> {
        let (mut pending, expired) = match self.0 {
            Ticket::Granted(guard) => return Ok(guard),
            Ticket::Queued { pending, expired } => (pending, expired),
        };

        let outcome = match tokio::time::timeout(timeout, &mut pending.granted).await {
            Ok(result) => result.map_err(|_| LockError::Abandoned),
            Err(_) => {
                // Closing first settles a grant that raced the timer.
                pending.granted.close();
                if pending.granted.try_recv().is_ok() {
                    Ok(())
                } else {
                    expired.store(true, Ordering::Release);
                    tracing::warn!("Mutex acquire timed out after {:?}", timeout);
                    Err(LockError::Timeout(timeout))
                }
            }
        };
        pending.settle(outcome)
    }
}

/// Receiving half of a queued waiter.
///
/// If the acquiring future is dropped after the grant was sent but before
/// it was observed, the lock is passed on instead of leaking.
struct PendingGrant {
    granted: oneshot::Receiver<()>,
    inner: Arc<Inner>,
    settled: bool,
}

impl PendingGrant {
    fn settle(mut self, outcome: Result<(), LockError>) -> Result<FifoMutexGuard, LockError> {
        self.settled = true;
        outcome.map(|()| FifoMutexGuard {
            inner: Arc::clone(&self.inner),
        })
    }
}

impl Drop for PendingGrant {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        self.granted.close();
        if self.granted.try_recv().is_ok() {
            tracing::trace!("Passing on a grant received by a dropped waiter");
            self.inner.release();
        }
    }
}
