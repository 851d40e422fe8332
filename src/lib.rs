//! Blocking and busy-wait synchronization primitives.
//!
//! The crate provides four coordination tools and one canonical client:
//!
//! - [`ExclusiveLock`]: reentrant mutual exclusion with a fair (FIFO) or
//!   unfair acquisition policy, plus [`Condition`]s bound to it.
//! - [`SharedExclusiveLock`]: shared/exclusive (read-write) modes with a
//!   reentrant writer.
//! - [`SpinLock`]: busy-wait lock over a single compare-and-swap owner
//!   slot ([`AtomicOwnerCell`]); trades CPU for context switches and is
//!   deliberately not reentrant.
//! - [`TurnCoordinator`]: N roles executing fixed-size units of work in a
//!   strict round-robin cycle, driven by targeted condition signals.
//! - [`KvStore`]: a small map guarded by a [`SharedExclusiveLock`],
//!   showing the intended acquire/work/release discipline.
//!
//! Callers own scoped acquisition: the blocking locks hand out no guards,
//! so every acquire must be paired with a release on every exit path.
//! Releases by the wrong thread are reported as [`IllegalRelease`] rather
//! than absorbed; interrupted waits surface as [`WaitInterrupted`] with all
//! shared state rolled back.
//!
//! ```
//! use std::sync::Arc;
//! use std::thread;
//! use turnstile::ExclusiveLock;
//!
//! let lock = Arc::new(ExclusiveLock::new(false));
//! let worker = {
//!     let lock = Arc::clone(&lock);
//!     thread::spawn(move || {
//!         lock.acquire();
//!         // ... exclusive section ...
//!         lock.release().expect("we hold the lock");
//!     })
//! };
//!
//! lock.acquire();
//! lock.release().expect("we hold the lock");
//! worker.join().unwrap();
//! ```

mod error;
mod exclusive;
mod rwlock;
mod spin;
mod spinlock;
mod store;
mod thread_id;
mod turn;
mod wait_queue;

pub use error::{IllegalRelease, PerformError, WaitError, WaitInterrupted};
pub use exclusive::{Condition, ExclusiveLock};
pub use rwlock::SharedExclusiveLock;
pub use spinlock::{AtomicOwnerCell, SpinLock};
pub use store::KvStore;
pub use thread_id::ThreadId;
pub use turn::TurnCoordinator;

/// [`ExclusiveLock::new`].
pub fn new_exclusive_lock(fair: bool) -> ExclusiveLock {
    ExclusiveLock::new(fair)
}

/// [`SharedExclusiveLock::new`].
pub fn new_shared_exclusive_lock() -> SharedExclusiveLock {
    SharedExclusiveLock::new()
}

/// [`SpinLock::new`].
pub fn new_spin_lock() -> SpinLock {
    SpinLock::new()
}

/// [`TurnCoordinator::new`].
pub fn new_turn_coordinator(role_work_sizes: Vec<usize>) -> TurnCoordinator {
    TurnCoordinator::new(role_work_sizes)
}
