//! Shared/exclusive (read-write) lock.
//!
//! Readers and writers exclude each other as a class; any number of shared
//! holders coexist, exactly one exclusive holder does. Among blocked
//! writers the wake order is unspecified, and a continuous stream of
//! readers can hold a waiting writer off indefinitely: shared acquisition
//! only checks for a *holding* writer, never for waiting ones. That
//! simplification is intentional and part of the contract.

use crate::error::IllegalRelease;
use crate::spin::Spin;
use crate::thread_id::ThreadId;
use crate::wait_queue::WaitQueue;
use log::trace;
use std::fmt;

#[derive(Debug, Default)]
struct SharedExclusiveState {
    readers: usize,
    writer: Option<ThreadId>,
    writer_hold_count: usize,
}

/// Read-write lock with a reentrant exclusive mode.
///
/// The holding writer may acquire exclusive mode again without blocking
/// (upgrade to itself only; a shared holder cannot upgrade to exclusive).
pub struct SharedExclusiveLock {
    state: Spin<SharedExclusiveState>,
    waiters: WaitQueue,
}

impl SharedExclusiveLock {
    pub fn new() -> Self {
        Self {
            state: Spin::new(SharedExclusiveState::default()),
            waiters: WaitQueue::new(),
        }
    }

    /// Block until shared mode is held.
    ///
    /// # Might Sleep
    pub fn acquire_shared(&self) {
        let mut state = self.state.lock();
        while state.writer.is_some() {
            trace!("thread {} parking for shared mode", ThreadId::current());
            self.waiters.wait(&mut state);
        }
        state.readers += 1;
    }

    /// Take shared mode if no writer holds the lock.
    pub fn try_acquire_shared(&self) -> bool {
        let mut state = self.state.lock();
        if state.writer.is_some() {
            false
        } else {
            state.readers += 1;
            true
        }
    }

    /// Give up one shared hold.
    ///
    /// Fails if no shared hold exists at call time.
    pub fn release_shared(&self) -> Result<(), IllegalRelease> {
        let mut state = self.state.lock();
        if state.readers == 0 {
            return Err(IllegalRelease::new(
                "SharedExclusiveLock::release_shared",
                ThreadId::current(),
            ));
        }
        state.readers -= 1;
        if state.readers == 0 {
            self.waiters.notify_all();
        }
        Ok(())
    }

    /// Block until the calling thread holds exclusive mode.
    ///
    /// Reentrant for the holding writer.
    ///
    /// # Might Sleep
    pub fn acquire_exclusive(&self) {
        let me = ThreadId::current();
        let mut state = self.state.lock();

        if state.writer == Some(me) {
            state.writer_hold_count += 1;
            return;
        }
        while state.readers > 0 || state.writer.is_some() {
            trace!("thread {me} parking for exclusive mode");
            self.waiters.wait(&mut state);
        }
        state.writer = Some(me);
        state.writer_hold_count = 1;
    }

    /// Take exclusive mode if that needs no waiting.
    pub fn try_acquire_exclusive(&self) -> bool {
        let me = ThreadId::current();
        let mut state = self.state.lock();

        if state.writer == Some(me) {
            state.writer_hold_count += 1;
            true
        } else if state.readers == 0 && state.writer.is_none() {
            state.writer = Some(me);
            state.writer_hold_count = 1;
            true
        } else {
            false
        }
    }

    /// Give up one exclusive hold.
    ///
    /// Fails if the calling thread is not the holding writer. The lock
    /// frees, and every waiter wakes, once releases balance acquires.
    pub fn release_exclusive(&self) -> Result<(), IllegalRelease> {
        let me = ThreadId::current();
        let mut state = self.state.lock();

        if state.writer != Some(me) {
            return Err(IllegalRelease::new(
                "SharedExclusiveLock::release_exclusive",
                me,
            ));
        }
        state.writer_hold_count -= 1;
        if state.writer_hold_count == 0 {
            state.writer = None;
            self.waiters.notify_all();
        }
        Ok(())
    }

    /// Current number of shared holders.
    pub fn readers(&self) -> usize {
        self.state.lock().readers
    }

    pub fn is_write_locked(&self) -> bool {
        self.state.lock().writer.is_some()
    }
}

impl Default for SharedExclusiveLock {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SharedExclusiveLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("SharedExclusiveLock")
            .field("readers", &state.readers)
            .field("writer", &state.writer)
            .finish()
    }
}
