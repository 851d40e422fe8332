//! Busy-wait lock over a value, the substrate beneath every blocking
//! primitive in this crate.
//!
//! All bookkeeping state (owner, hold counts, waiter queues) lives behind a
//! `Spin` and is only ever held for a handful of instructions. The guard's
//! `force_unlock`/`force_relock` pair exists so the wait queue can release
//! the bookkeeping lock around a park without giving up the borrow.

mod guard;
mod relax;

use std::cell::UnsafeCell;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};

pub(crate) use guard::SpinGuard;
pub(crate) use relax::{Relax, SpinRelax};

/// A spinlock is a lock that uses busy-waiting to acquire the lock. It is
/// useful for short critical sections where the overhead of a context switch
/// is too high.
#[derive(Debug, Default)]
pub(crate) struct Spin<T, R = SpinRelax>
where
    T: ?Sized,
{
    _phantom: PhantomData<R>,
    locked: AtomicBool,
    value: UnsafeCell<T>,
}

impl<T, R> Spin<T, R>
where
    R: Relax,
{
    pub const fn new(value: T) -> Self {
        Self {
            locked: AtomicBool::new(false),
            value: UnsafeCell::new(value),
            _phantom: PhantomData,
        }
    }
}

impl<T, R> Spin<T, R>
where
    T: ?Sized,
{
    /// # Safety
    /// This function is unsafe because the caller MUST ensure that the
    /// protected value is no longer accessed after calling this function.
    unsafe fn do_unlock(&self) {
        let locked = self.locked.swap(false, Ordering::Release);
        debug_assert!(locked, "Spin::do_unlock(): unlocking an unlocked lock");
    }
}

impl<T, R> Spin<T, R>
where
    T: ?Sized,
    R: Relax,
{
    pub fn lock(&self) -> SpinGuard<'_, T, R> {
        self.do_lock();

        SpinGuard {
            lock: self,
            _not_send: PhantomData,
        }
    }

    #[allow(dead_code)]
    pub fn try_lock(&self) -> Option<SpinGuard<'_, T, R>> {
        self.locked
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .ok()
            .map(|_| SpinGuard {
                lock: self,
                _not_send: PhantomData,
            })
    }

    fn do_lock(&self) {
        while self
            .locked
            .compare_exchange_weak(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            while self.locked.load(Ordering::Relaxed) {
                R::relax();
            }
        }
    }
}

// SAFETY: As long as the value protected by the lock is able to be shared
//         between threads, we can send the lock between threads.
unsafe impl<T, R> Send for Spin<T, R> where T: ?Sized + Send {}

// SAFETY: As long as the value protected by the lock is able to be shared
//         between threads, we can provide exclusive access guarantees to the
//         lock.
unsafe impl<T, R> Sync for Spin<T, R> where T: ?Sized + Send {}

#[cfg(test)]
mod tests {
    use super::relax::LoopRelax;
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn serializes_increments() {
        let counter = Arc::new(Spin::<u64>::new(0));

        let threads: Vec<_> = (0..4)
            .map(|_| {
                let counter = Arc::clone(&counter);
                thread::spawn(move || {
                    for _ in 0..1000 {
                        *counter.lock() += 1;
                    }
                })
            })
            .collect();
        for t in threads {
            t.join().expect("incrementer panicked");
        }

        assert_eq!(*counter.lock(), 4000);
    }

    #[test]
    fn try_lock_fails_while_held() {
        let spin = Spin::<u32>::new(7);
        let guard = spin.lock();
        assert!(spin.try_lock().is_none());
        drop(guard);
        assert_eq!(spin.try_lock().map(|g| *g), Some(7));
    }

    #[test]
    fn relax_policy_is_pluggable() {
        let spin: Spin<u32, LoopRelax> = Spin::new(1);
        assert_eq!(*spin.lock(), 1);
    }
}
