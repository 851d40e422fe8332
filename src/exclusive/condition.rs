use super::ExclusiveLock;
use crate::error::{IllegalRelease, WaitError, WaitInterrupted};
use crate::thread_id::ThreadId;
use crate::wait_queue::{WaitQueue, WaitStatus};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// A wait-condition bound to one [`ExclusiveLock`].
///
/// Waiting releases the bound lock completely (the full reentrant hold
/// count is saved), parks until signaled, then reacquires the lock and
/// restores the count before returning. Whether the awaited predicate
/// actually holds is the caller's business: re-check it in a loop around
/// every wait, because a wake proves nothing on its own.
pub struct Condition {
    lock: Arc<ExclusiveLock>,
    waiters: WaitQueue,
}

impl Condition {
    /// A new condition bound to `lock`.
    pub fn new(lock: &Arc<ExclusiveLock>) -> Self {
        Self {
            lock: Arc::clone(lock),
            waiters: WaitQueue::new(),
        }
    }

    /// Suspend until signaled or interrupted.
    ///
    /// Fails with the illegal-release verdict if the caller does not hold
    /// the bound lock; nothing is released in that case. An interrupted
    /// waiter reacquires the lock and restores its holds before the error
    /// is returned, so state reads as if it had never been woken.
    ///
    /// # Might Sleep
    pub fn wait(&self) -> Result<(), WaitError> {
        match self.suspend(None)? {
            WaitStatus::Interrupted => Err(WaitInterrupted.into()),
            _ => Ok(()),
        }
    }

    /// As [`wait`](Self::wait), bounded by `timeout`.
    ///
    /// `Ok(true)` when signaled, `Ok(false)` on timeout; the lock is held
    /// again either way.
    ///
    /// # Might Sleep
    pub fn wait_timeout(&self, timeout: Duration) -> Result<bool, WaitError> {
        match self.suspend(Some(timeout))? {
            WaitStatus::Interrupted => Err(WaitInterrupted.into()),
            WaitStatus::TimedOut => Ok(false),
            WaitStatus::Woken => Ok(true),
        }
    }

    /// Wake exactly one waiter. Never more: serialized hand-offs (the turn
    /// coordinator) rely on a single wake reaching a single thread.
    pub fn signal(&self) {
        self.waiters.notify_one();
    }

    /// Wake every waiter. Not for hand-off protocols; provided for
    /// predicates where everyone re-checks anyway.
    pub fn signal_all(&self) {
        self.waiters.notify_all();
    }

    /// Wake every waiter with the interrupted verdict; each reacquires the
    /// lock, restores its holds and returns an error to its caller.
    pub fn interrupt_all(&self) -> usize {
        self.waiters.interrupt_all()
    }

    fn suspend(&self, timeout: Option<Duration>) -> Result<WaitStatus, IllegalRelease> {
        let me = ThreadId::current();
        let mut state = self.lock.state.lock();

        if state.owner != Some(me) {
            return Err(IllegalRelease::new("Condition::wait", me));
        }

        // Hand the lock over and enlist in one critical section: anyone who
        // acquires the lock after us (a signaler, a stopper) is guaranteed
        // to see us on this condition's queue.
        let saved_holds = state.hold_count;
        state.owner = None;
        state.hold_count = 0;
        self.lock.wake_released();

        let status = match timeout {
            Some(timeout) => self.waiters.wait_timeout(&mut state, timeout),
            None => self.waiters.wait(&mut state),
        };

        // Reacquire like any blocking acquirer, then restore the holds.
        if self.lock.fair {
            state.queue.push_back(me);
        }
        while !self.lock.claimable(&state, me) {
            self.lock.waiters.wait(&mut state);
        }
        self.lock.claim(&mut state, me, saved_holds);

        Ok(status)
    }
}

impl fmt::Debug for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Condition").finish()
    }
}
