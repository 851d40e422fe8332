//! Parked-thread wait queue, the condition-variable substrate for the
//! blocking locks.
//!
//! A waiter enlists itself while still holding the caller's bookkeeping
//! guard, releases the guard, then parks until its `woken` flag is set. The
//! flag, not the wake itself, is the truth: `park` may return spuriously and
//! an unpark may land before the park does, and both are absorbed by
//! re-checking the flag in a loop. Wakers set the flag before unparking, so
//! a wake can never be lost between enlisting and parking.

use crate::spin::{Relax, Spin, SpinGuard};
use log::trace;
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, Thread};
use std::time::{Duration, Instant};

/// How a wait ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WaitStatus {
    /// A notifier woke us.
    Woken,
    /// An interrupter woke us.
    Interrupted,
    /// The deadline passed with no wake.
    TimedOut,
}

struct WaitNode {
    thread: Thread,
    woken: AtomicBool,
    interrupted: AtomicBool,
}

impl WaitNode {
    fn new() -> Self {
        Self {
            thread: thread::current(),
            woken: AtomicBool::new(false),
            interrupted: AtomicBool::new(false),
        }
    }

    fn wake(&self) {
        self.woken.store(true, Ordering::Release);
        self.thread.unpark();
    }
}

pub(crate) struct WaitQueue {
    waiters: Spin<VecDeque<Arc<WaitNode>>>,
}

impl WaitQueue {
    pub const fn new() -> Self {
        Self {
            waiters: Spin::new(VecDeque::new()),
        }
    }

    /// Wake the waiter at the head of the queue, if any.
    pub fn notify_one(&self) -> bool {
        let waiter = self.waiters.lock().pop_front();
        match waiter {
            Some(node) => {
                node.wake();
                true
            }
            None => false,
        }
    }

    /// Wake every queued waiter.
    pub fn notify_all(&self) -> usize {
        let drained = std::mem::take(&mut *self.waiters.lock());
        let count = drained.len();
        for node in drained {
            node.wake();
        }
        count
    }

    /// Wake every queued waiter with the interrupted verdict.
    pub fn interrupt_all(&self) -> usize {
        let drained = std::mem::take(&mut *self.waiters.lock());
        let count = drained.len();
        for node in drained {
            node.interrupted.store(true, Ordering::Release);
            node.wake();
        }
        if count > 0 {
            trace!("interrupted {count} parked waiters");
        }
        count
    }

    /// Release `guard`, park until woken, then reacquire `guard`.
    ///
    /// The caller re-checks its predicate afterwards; a return from here
    /// promises nothing about it.
    ///
    /// # Might Sleep
    pub fn wait<T, R>(&self, guard: &mut SpinGuard<'_, T, R>) -> WaitStatus
    where
        T: ?Sized,
        R: Relax,
    {
        let node = Arc::new(WaitNode::new());
        self.waiters.lock().push_back(Arc::clone(&node));

        // SAFETY: Relocked below before the guard is touched again.
        unsafe { guard.force_unlock() };

        while !node.woken.load(Ordering::Acquire) {
            thread::park();
        }

        // SAFETY: Pairs with the force_unlock above.
        unsafe { guard.force_relock() };

        if node.interrupted.load(Ordering::Acquire) {
            WaitStatus::Interrupted
        } else {
            WaitStatus::Woken
        }
    }

    /// As [`wait`](Self::wait), giving up once `timeout` has elapsed.
    ///
    /// A timed-out waiter takes itself off the queue; if a notifier claimed
    /// it in that same instant, the wake is counted as delivered rather than
    /// dropped on the floor.
    ///
    /// # Might Sleep
    pub fn wait_timeout<T, R>(
        &self,
        guard: &mut SpinGuard<'_, T, R>,
        timeout: Duration,
    ) -> WaitStatus
    where
        T: ?Sized,
        R: Relax,
    {
        let node = Arc::new(WaitNode::new());
        self.waiters.lock().push_back(Arc::clone(&node));

        // SAFETY: Relocked below before the guard is touched again.
        unsafe { guard.force_unlock() };

        let deadline = Instant::now() + timeout;
        let mut status = loop {
            if node.woken.load(Ordering::Acquire) {
                break WaitStatus::Woken;
            }
            let now = Instant::now();
            if now >= deadline {
                break WaitStatus::TimedOut;
            }
            thread::park_timeout(deadline - now);
        };

        if status == WaitStatus::TimedOut {
            let mut waiters = self.waiters.lock();
            if let Some(pos) = waiters.iter().position(|other| Arc::ptr_eq(other, &node)) {
                waiters.remove(pos);
            } else {
                drop(waiters);
                // A notifier popped us right as we gave up. The wake is ours;
                // spin out the tiny window until its flag store lands.
                while !node.woken.load(Ordering::Acquire) {
                    std::hint::spin_loop();
                }
                status = WaitStatus::Woken;
            }
        }

        // SAFETY: Pairs with the force_unlock above.
        unsafe { guard.force_relock() };

        if node.interrupted.load(Ordering::Acquire) {
            WaitStatus::Interrupted
        } else {
            status
        }
    }
}

impl Default for WaitQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for WaitQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WaitQueue").finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    struct Flagged {
        ready: Spin<bool>,
        queue: WaitQueue,
    }

    #[test]
    fn notify_one_wakes_a_parked_waiter() {
        let shared = Arc::new(Flagged {
            ready: Spin::new(false),
            queue: WaitQueue::new(),
        });

        let waiter = {
            let shared = Arc::clone(&shared);
            thread::spawn(move || {
                let mut ready = shared.ready.lock();
                while !*ready {
                    let status = shared.queue.wait(&mut ready);
                    assert_eq!(status, WaitStatus::Woken);
                }
            })
        };

        thread::sleep(Duration::from_millis(20));
        *shared.ready.lock() = true;
        shared.queue.notify_one();
        waiter.join().expect("waiter panicked");
    }

    #[test]
    fn wait_timeout_expires_and_dequeues() {
        let flag = Spin::<bool>::new(false);
        let queue = WaitQueue::new();

        let mut guard = flag.lock();
        let status = queue.wait_timeout(&mut guard, Duration::from_millis(30));
        assert_eq!(status, WaitStatus::TimedOut);
        drop(guard);

        // The expired waiter must leave no residue behind.
        assert!(!queue.notify_one());
    }

    #[test]
    fn interrupt_all_reports_the_verdict() {
        let shared = Arc::new(Flagged {
            ready: Spin::new(false),
            queue: WaitQueue::new(),
        });
        let (tx, rx) = mpsc::channel();

        let (enlisted_tx, enlisted_rx) = mpsc::channel();
        let waiter = {
            let shared = Arc::clone(&shared);
            thread::spawn(move || {
                let mut ready = shared.ready.lock();
                enlisted_tx.send(()).expect("main went away");
                let status = shared.queue.wait(&mut ready);
                tx.send(status).expect("main went away");
            })
        };

        // Taking the guard ourselves proves the waiter has enlisted: it held
        // it from before the send until wait() released it.
        enlisted_rx.recv().expect("waiter went away");
        drop(shared.ready.lock());
        shared.queue.interrupt_all();
        assert_eq!(
            rx.recv().expect("waiter went away"),
            WaitStatus::Interrupted
        );
        waiter.join().expect("waiter panicked");
    }
}
