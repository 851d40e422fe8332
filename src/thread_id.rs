//! Thread identity tokens.
//!
//! Owner bookkeeping throughout the crate needs a thread identity that fits
//! in a single atomic word. The standard library's thread id is opaque, so
//! each OS thread is assigned a small non-zero integer the first time it
//! touches any primitive here. Ids are never reused within a process.

use std::fmt;
use std::num::NonZeroU64;
use std::sync::atomic::{AtomicU64, Ordering};

/// Identity of an OS thread as seen by the locks in this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ThreadId(NonZeroU64);

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static CURRENT: ThreadId = ThreadId::assign();
}

impl ThreadId {
    /// The calling thread's id, assigning one on first use.
    pub fn current() -> Self {
        CURRENT.with(|id| *id)
    }

    fn assign() -> Self {
        let raw = NEXT_ID.fetch_add(1, Ordering::Relaxed);
        match NonZeroU64::new(raw) {
            Some(id) => Self(id),
            // Starts at 1 and a u64 does not wrap in the lifetime of a process.
            None => unreachable!("thread id counter wrapped"),
        }
    }

    pub(crate) fn as_u64(self) -> u64 {
        self.0.get()
    }

    pub(crate) fn from_raw(raw: u64) -> Option<Self> {
        NonZeroU64::new(raw).map(Self)
    }
}

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.get().fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stable_within_a_thread() {
        assert_eq!(ThreadId::current(), ThreadId::current());
    }

    #[test]
    fn distinct_across_threads() {
        let mine = ThreadId::current();
        let theirs = std::thread::spawn(ThreadId::current)
            .join()
            .expect("spawned thread panicked");
        assert_ne!(mine, theirs);
    }
}
