//! Reentrant exclusive lock with a fair or unfair acquisition policy.

mod condition;

use crate::error::IllegalRelease;
use crate::spin::Spin;
use crate::thread_id::ThreadId;
use crate::wait_queue::WaitQueue;
use log::trace;
use std::collections::VecDeque;
use std::fmt;
use std::time::{Duration, Instant};

pub use condition::Condition;

#[derive(Debug, Default)]
struct ExclusiveState {
    owner: Option<ThreadId>,
    hold_count: usize,
    // FIFO arrival order; populated and consulted only under the fair policy.
    queue: VecDeque<ThreadId>,
}

/// Mutual-exclusion lock with reentrancy and a construction-time fairness
/// policy.
///
/// The owning thread may acquire again without blocking; the lock frees only
/// once releases balance acquires. A fair lock grants strictly in arrival
/// order of the blocking acquirers; an unfair lock lets any blocked thread
/// take a freed lock regardless of when it arrived.
///
/// An unbalanced excess of acquires keeps the lock unavailable to every
/// other thread for good. That is what a reentrant hold means, not a
/// condition the lock detects.
pub struct ExclusiveLock {
    fair: bool,
    state: Spin<ExclusiveState>,
    waiters: WaitQueue,
}

impl ExclusiveLock {
    /// `fair` is fixed for the lock's lifetime.
    pub fn new(fair: bool) -> Self {
        Self {
            fair,
            state: Spin::new(ExclusiveState::default()),
            waiters: WaitQueue::new(),
        }
    }

    /// Block until the calling thread holds the lock.
    ///
    /// Reentrant: if the caller already owns the lock this only bumps the
    /// hold count.
    ///
    /// # Might Sleep
    pub fn acquire(&self) {
        let me = ThreadId::current();
        let mut state = self.state.lock();

        if state.owner == Some(me) {
            state.hold_count += 1;
            return;
        }

        if self.fair {
            state.queue.push_back(me);
        }
        while !self.claimable(&state, me) {
            trace!("thread {me} parking on exclusive lock");
            self.waiters.wait(&mut state);
        }
        self.claim(&mut state, me, 1);
    }

    /// Take the lock if that needs no waiting.
    ///
    /// Honors the reentrant fast path. Under the fair policy an immediate
    /// attempt still barges past queued waiters when the lock happens to be
    /// free; only blocking acquisition respects the queue.
    pub fn try_acquire(&self) -> bool {
        let me = ThreadId::current();
        let mut state = self.state.lock();

        if state.owner == Some(me) {
            state.hold_count += 1;
            true
        } else if state.owner.is_none() {
            state.owner = Some(me);
            state.hold_count = 1;
            true
        } else {
            false
        }
    }

    /// As [`acquire`](Self::acquire), giving up after `timeout`.
    ///
    /// A timed-out fair waiter removes its queue entry before returning, as
    /// if it had never asked.
    ///
    /// # Might Sleep
    pub fn try_acquire_for(&self, timeout: Duration) -> bool {
        let me = ThreadId::current();
        let mut state = self.state.lock();

        if state.owner == Some(me) {
            state.hold_count += 1;
            return true;
        }

        if self.fair {
            state.queue.push_back(me);
        }
        let deadline = Instant::now() + timeout;
        loop {
            if self.claimable(&state, me) {
                self.claim(&mut state, me, 1);
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            self.waiters.wait_timeout(&mut state, deadline - now);
        }

        if self.fair {
            if let Some(pos) = state.queue.iter().position(|&waiter| waiter == me) {
                state.queue.remove(pos);
            }
        }
        false
    }

    /// Give up one hold.
    ///
    /// Fails if the calling thread is not the owner; the failed call changes
    /// nothing. When the hold count reaches zero the lock frees and the next
    /// eligible waiter is woken.
    pub fn release(&self) -> Result<(), IllegalRelease> {
        let me = ThreadId::current();
        let mut state = self.state.lock();

        if state.owner != Some(me) {
            return Err(IllegalRelease::new("ExclusiveLock::release", me));
        }

        state.hold_count -= 1;
        if state.hold_count == 0 {
            state.owner = None;
            self.wake_released();
        }
        Ok(())
    }

    pub fn is_fair(&self) -> bool {
        self.fair
    }

    pub fn is_locked(&self) -> bool {
        self.state.lock().owner.is_some()
    }

    /// The calling thread's hold count; zero when it is not the owner.
    pub fn hold_count(&self) -> usize {
        let state = self.state.lock();
        if state.owner == Some(ThreadId::current()) {
            state.hold_count
        } else {
            0
        }
    }

    /// Number of threads queued under the fair policy.
    pub fn queue_len(&self) -> usize {
        self.state.lock().queue.len()
    }

    fn claimable(&self, state: &ExclusiveState, me: ThreadId) -> bool {
        state.owner.is_none() && (!self.fair || state.queue.front() == Some(&me))
    }

    fn claim(&self, state: &mut ExclusiveState, me: ThreadId, holds: usize) {
        if self.fair {
            let head = state.queue.pop_front();
            debug_assert_eq!(head, Some(me), "claimed out of queue order");
        }
        state.owner = Some(me);
        state.hold_count = holds;
    }

    fn wake_released(&self) {
        if self.fair {
            // The head is decided under the state lock; woken non-heads
            // re-check the predicate and park again, so waking everyone
            // still grants in exact arrival order.
            self.waiters.notify_all();
        } else {
            self.waiters.notify_one();
        }
    }
}

impl Default for ExclusiveLock {
    /// An unfair lock; fairness is the opt-in.
    fn default() -> Self {
        Self::new(false)
    }
}

impl fmt::Debug for ExclusiveLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExclusiveLock")
            .field("fair", &self.fair)
            .finish()
    }
}
