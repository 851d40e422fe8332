//! Cyclic turn coordinator.
//!
//! N roles take the stage strictly in round-robin order; each turn emits a
//! fixed number of items with the internal lock held, so one turn's output
//! is always contiguous. Hand-off is a single targeted signal on the next
//! role's condition, never a broadcast, which would let roles race for
//! the turn.

use crate::error::{PerformError, WaitError, WaitInterrupted};
use crate::exclusive::{Condition, ExclusiveLock};
use log::debug;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Serializes N roles into a fixed cyclic execution order.
///
/// Role `i` emits exactly `role_work_sizes[i]` items per turn, then hands
/// the turn to role `(i + 1) % N`. The cycle starts at role 0 and runs
/// until [`stop`](Self::stop).
pub struct TurnCoordinator {
    lock: Arc<ExclusiveLock>,
    conditions: Vec<Condition>,
    work_sizes: Vec<usize>,
    // Written only while the lock is held; atomics let observers peek
    // without taking it.
    current: AtomicUsize,
    stopped: AtomicBool,
}

impl TurnCoordinator {
    /// One entry per role; role `i` emits `role_work_sizes[i]` items per
    /// turn.
    ///
    /// # Panics
    /// Panics when no roles are given.
    pub fn new(role_work_sizes: Vec<usize>) -> Self {
        assert!(
            !role_work_sizes.is_empty(),
            "a turn coordinator needs at least one role"
        );
        let lock = Arc::new(ExclusiveLock::new(false));
        let conditions = role_work_sizes
            .iter()
            .map(|_| Condition::new(&lock))
            .collect();
        Self {
            lock,
            conditions,
            work_sizes: role_work_sizes,
            current: AtomicUsize::new(0),
            stopped: AtomicBool::new(false),
        }
    }

    /// Execute one turn for `role`: wait for the turn, emit the role's
    /// items through `emit` (called with `1..=k`), advance the cycle and
    /// wake the next role.
    ///
    /// An interruption while suspended leaves the current role unchanged
    /// and surfaces here; the cycle stays intact for the other
    /// participants.
    ///
    /// # Might Sleep
    pub fn perform<F>(&self, role: usize, mut emit: F) -> Result<(), PerformError>
    where
        F: FnMut(usize),
    {
        if role >= self.conditions.len() {
            return Err(PerformError::UnknownRole {
                role,
                role_count: self.conditions.len(),
            });
        }
        if self.stopped.load(Ordering::Acquire) {
            return Err(WaitInterrupted.into());
        }

        self.lock.acquire();
        let outcome = self.turn(role, &mut emit);
        let released = self.lock.release();
        debug_assert!(released.is_ok(), "coordinator lock balance broken");
        outcome
    }

    fn turn(&self, role: usize, emit: &mut dyn FnMut(usize)) -> Result<(), PerformError> {
        while self.current.load(Ordering::Relaxed) != role {
            if self.stopped.load(Ordering::Relaxed) {
                return Err(WaitInterrupted.into());
            }
            match self.conditions[role].wait() {
                Ok(()) => {}
                Err(WaitError::Interrupted(interrupted)) => return Err(interrupted.into()),
                Err(WaitError::IllegalRelease(_)) => {
                    unreachable!("perform holds the coordinator lock across the wait")
                }
            }
        }
        // The stop may have landed between our wake and our turn check.
        if self.stopped.load(Ordering::Relaxed) {
            return Err(WaitInterrupted.into());
        }

        for item in 1..=self.work_sizes[role] {
            emit(item);
        }

        let next = (role + 1) % self.conditions.len();
        self.current.store(next, Ordering::Relaxed);
        self.conditions[next].signal();
        Ok(())
    }

    /// Shut the cycle down: every parked participant returns
    /// [`PerformError::Interrupted`], the current role unchanged, and
    /// later `perform` calls fail fast the same way. Terminal: there is
    /// no restart.
    pub fn stop(&self) {
        self.lock.acquire();
        if !self.stopped.swap(true, Ordering::Release) {
            debug!("turn coordinator stopping; interrupting parked roles");
            for condition in &self.conditions {
                condition.interrupt_all();
            }
        }
        let released = self.lock.release();
        debug_assert!(released.is_ok(), "coordinator lock balance broken");
    }

    /// The role whose turn it currently is.
    pub fn current_role(&self) -> usize {
        self.current.load(Ordering::Relaxed)
    }

    pub fn role_count(&self) -> usize {
        self.conditions.len()
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }
}

impl fmt::Debug for TurnCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TurnCoordinator")
            .field("roles", &self.work_sizes)
            .field("current", &self.current_role())
            .field("stopped", &self.is_stopped())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::thread;

    #[test]
    fn roles_cycle_in_strict_order() {
        const CYCLES: usize = 4;
        let sizes = vec![5, 10, 15];
        let coordinator = Arc::new(TurnCoordinator::new(sizes.clone()));
        let output = Arc::new(Mutex::new(Vec::new()));

        let participants: Vec<_> = (0..sizes.len())
            .map(|role| {
                let coordinator = Arc::clone(&coordinator);
                let output = Arc::clone(&output);
                thread::spawn(move || {
                    for _ in 0..CYCLES {
                        coordinator
                            .perform(role, |item| {
                                output.lock().expect("output poisoned").push((role, item));
                            })
                            .expect("turn failed");
                    }
                })
            })
            .collect();
        for participant in participants {
            participant.join().expect("participant panicked");
        }

        let mut expected = Vec::new();
        for _ in 0..CYCLES {
            for (role, &size) in sizes.iter().enumerate() {
                for item in 1..=size {
                    expected.push((role, item));
                }
            }
        }
        assert_eq!(*output.lock().expect("output poisoned"), expected);
    }

    #[test]
    fn unknown_role_is_rejected() {
        let coordinator = TurnCoordinator::new(vec![1, 1]);
        let result = coordinator.perform(2, |_| {});
        assert_eq!(
            result,
            Err(PerformError::UnknownRole {
                role: 2,
                role_count: 2
            })
        );
        assert_eq!(coordinator.current_role(), 0);
    }

    #[test]
    fn stop_interrupts_a_parked_role() {
        let coordinator = Arc::new(TurnCoordinator::new(vec![1, 1]));

        // Role 1 can never be current first; it parks (or fails fast if the
        // stop wins the race to the lock).
        let parked = {
            let coordinator = Arc::clone(&coordinator);
            thread::spawn(move || coordinator.perform(1, |_| {}))
        };

        thread::sleep(std::time::Duration::from_millis(20));
        coordinator.stop();

        let outcome = parked.join().expect("participant panicked");
        assert!(matches!(outcome, Err(PerformError::Interrupted(_))));
        assert_eq!(coordinator.current_role(), 0);
        assert!(coordinator.is_stopped());
    }

    #[test]
    fn perform_after_stop_fails_fast() {
        let coordinator = TurnCoordinator::new(vec![3]);
        coordinator.stop();

        let mut emitted = 0;
        let result = coordinator.perform(0, |_| emitted += 1);
        assert!(matches!(result, Err(PerformError::Interrupted(_))));
        assert_eq!(emitted, 0);
    }

    #[test]
    fn single_role_cycles_with_itself() {
        let coordinator = TurnCoordinator::new(vec![2]);
        let mut items = Vec::new();
        for _ in 0..3 {
            coordinator
                .perform(0, |item| items.push(item))
                .expect("turn failed");
        }
        assert_eq!(items, vec![1, 2, 1, 2, 1, 2]);
    }
}
