//! Busy-wait exclusive lock over an atomically-swappable owner slot.
//!
//! Unlike the blocking locks, nothing here ever parks: acquisition is a
//! compare-and-swap retry loop that trades CPU for the cost of a context
//! switch. There is no queue and no fairness guarantee.

use crate::thread_id::ThreadId;
use log::{debug, trace};
use std::hint;
use std::sync::atomic::{AtomicU64, Ordering};

const UNOWNED: u64 = 0;

/// A single atomically-swappable owner slot.
///
/// The only state transition is compare-and-swap of `(expected, desired)`
/// owner pairs; everything the spin lock guarantees follows from that one
/// operation winning or losing.
#[derive(Debug, Default)]
pub struct AtomicOwnerCell {
    owner: AtomicU64,
}

impl AtomicOwnerCell {
    pub const fn new() -> Self {
        Self {
            owner: AtomicU64::new(UNOWNED),
        }
    }

    /// Swap `expected` for `desired` if and only if `expected` is the
    /// current owner. Returns whether the swap won.
    pub fn compare_set(&self, expected: Option<ThreadId>, desired: Option<ThreadId>) -> bool {
        self.owner
            .compare_exchange(
                encode(expected),
                encode(desired),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// The current owner, if any.
    pub fn get(&self) -> Option<ThreadId> {
        ThreadId::from_raw(self.owner.load(Ordering::Acquire))
    }
}

fn encode(owner: Option<ThreadId>) -> u64 {
    owner.map_or(UNOWNED, ThreadId::as_u64)
}

/// Busy-wait exclusive lock built on [`AtomicOwnerCell`].
///
/// Not reentrant: a thread that calls [`acquire`](Self::acquire) twice
/// without releasing in between spins against itself forever. That is a
/// documented property of the primitive, not a defect it tries to detect.
#[derive(Debug, Default)]
pub struct SpinLock {
    cell: AtomicOwnerCell,
}

impl SpinLock {
    pub const fn new() -> Self {
        Self {
            cell: AtomicOwnerCell::new(),
        }
    }

    /// Spin until the calling thread owns the cell.
    ///
    /// Burns CPU for the whole wait; there is no bound on iterations.
    pub fn acquire(&self) {
        let me = ThreadId::current();
        while !self.cell.compare_set(None, Some(me)) {
            trace!("thread {me} spinning on busy lock");
            hint::spin_loop();
        }
    }

    /// A single compare-and-swap attempt.
    pub fn try_acquire(&self) -> bool {
        self.cell.compare_set(None, Some(ThreadId::current()))
    }

    /// Hand the cell back.
    ///
    /// A release by a thread that does not own the cell is deliberately a
    /// no-op rather than an error: the compare-and-swap simply loses, and
    /// the owner keeps the lock. Whether that tolerance ought to fail loudly
    /// instead is an open question recorded in DESIGN.md; the behavior is
    /// kept as-is and surfaced in the debug log.
    pub fn release(&self) {
        let me = ThreadId::current();
        if !self.cell.compare_set(Some(me), None) {
            debug!("thread {me} released a busy lock it does not own; ignored");
        }
    }

    pub fn is_locked(&self) -> bool {
        self.cell.get().is_some()
    }

    pub fn owner(&self) -> Option<ThreadId> {
        self.cell.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::AtomicU64;
    use std::thread;

    #[test]
    fn single_cas_winner() {
        let lock = Arc::new(SpinLock::new());
        // Deliberately non-atomic read-modify-write: only mutual exclusion
        // keeps the final count exact.
        let counter = Arc::new(AtomicU64::new(0));

        let threads: Vec<_> = (0..4)
            .map(|_| {
                let lock = Arc::clone(&lock);
                let counter = Arc::clone(&counter);
                thread::spawn(move || {
                    for _ in 0..500 {
                        lock.acquire();
                        let seen = counter.load(Ordering::Relaxed);
                        counter.store(seen + 1, Ordering::Relaxed);
                        lock.release();
                    }
                })
            })
            .collect();
        for t in threads {
            t.join().expect("spinner panicked");
        }

        assert_eq!(counter.load(Ordering::Relaxed), 2000);
        assert!(!lock.is_locked());
    }

    #[test]
    fn owner_is_tracked() {
        let lock = SpinLock::new();
        assert_eq!(lock.owner(), None);

        lock.acquire();
        assert_eq!(lock.owner(), Some(ThreadId::current()));
        lock.release();
        assert_eq!(lock.owner(), None);
    }

    #[test]
    fn non_owner_release_is_ignored() {
        let lock = Arc::new(SpinLock::new());
        lock.acquire();

        let stranger = {
            let lock = Arc::clone(&lock);
            thread::spawn(move || {
                lock.release();
                lock.try_acquire()
            })
        };
        // The stranger's release must not have freed our hold.
        assert!(!stranger.join().expect("stranger panicked"));
        assert_eq!(lock.owner(), Some(ThreadId::current()));

        lock.release();
        assert!(!lock.is_locked());
    }

    #[test]
    fn try_acquire_is_a_single_attempt() {
        let lock = SpinLock::new();
        assert!(lock.try_acquire());
        // Not reentrant: the same thread's second attempt loses.
        assert!(!lock.try_acquire());
        lock.release();
        assert!(lock.try_acquire());
        lock.release();
    }
}
