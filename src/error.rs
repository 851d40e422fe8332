//! Error taxonomy.
//!
//! Every error is reported to the calling thread only; a misbehaving caller
//! never takes the process or unrelated threads down with it. Timeouts are
//! ordinary `bool` outcomes on the timed operations, not errors.

use crate::thread_id::ThreadId;
use thiserror::Error;

/// A release (or condition wait) attempted by a thread without a matching
/// hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("illegal release: {op} by thread {thread} without a matching hold")]
pub struct IllegalRelease {
    op: &'static str,
    thread: ThreadId,
}

impl IllegalRelease {
    pub(crate) fn new(op: &'static str, thread: ThreadId) -> Self {
        Self { op, thread }
    }

    /// The operation that was attempted, e.g. `"ExclusiveLock::release"`.
    pub fn operation(&self) -> &'static str {
        self.op
    }

    /// The offending thread.
    pub fn thread(&self) -> ThreadId {
        self.thread
    }
}

/// A blocking wait was interrupted before its predicate was satisfied.
///
/// The interrupted waiter leaves shared state exactly as if it had never
/// been woken: locks are reacquired and hold counts restored before this is
/// returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("wait interrupted before the predicate was satisfied")]
pub struct WaitInterrupted;

/// Failure of a condition wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum WaitError {
    /// The caller did not hold the lock the condition is bound to.
    #[error(transparent)]
    IllegalRelease(#[from] IllegalRelease),
    /// The wait was interrupted.
    #[error(transparent)]
    Interrupted(#[from] WaitInterrupted),
}

/// Failure of a coordinator turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PerformError {
    /// The role index is not one the coordinator was built with.
    #[error("unknown role {role}: coordinator has {role_count} roles")]
    UnknownRole { role: usize, role_count: usize },
    /// The coordinator was stopped while (or before) the caller waited for
    /// its turn.
    #[error(transparent)]
    Interrupted(#[from] WaitInterrupted),
}
