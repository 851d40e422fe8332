//! Key-value store guarded by a [`SharedExclusiveLock`], the canonical
//! client of the shared/exclusive discipline.
//!
//! The map itself sits in an `UnsafeCell`; its only access path runs
//! through the store's lock, and every method holds the proper mode for
//! its entire critical section, caller-supplied work included, and
//! releases it on every exit path, caller panics included.

use crate::rwlock::SharedExclusiveLock;
use std::cell::UnsafeCell;
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;

/// In-memory map whose reads hold shared mode and whose writes hold
/// exclusive mode for their full duration.
pub struct KvStore<K, V> {
    lock: SharedExclusiveLock,
    entries: UnsafeCell<HashMap<K, V>>,
}

// SAFETY: The map is only ever touched while the matching lock mode is
//         held: mutation under exclusive mode, shared references under
//         shared mode. Sending the store moves the map with it.
unsafe impl<K: Send, V: Send> Send for KvStore<K, V> {}

// SAFETY: Concurrent shared holders take only `&HashMap`, so `K` and `V`
//         must additionally be `Sync`; the writer is alone by the lock's
//         contract.
unsafe impl<K: Send + Sync, V: Send + Sync> Sync for KvStore<K, V> {}

impl<K, V> KvStore<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    pub fn new() -> Self {
        Self {
            lock: SharedExclusiveLock::new(),
            entries: UnsafeCell::new(HashMap::new()),
        }
    }

    /// Insert `value` under `key`, holding exclusive mode throughout.
    pub fn put(&self, key: K, value: V) {
        self.put_with(key, value, || {});
    }

    /// As [`put`](Self::put), running `work` inside the critical section
    /// before the write becomes visible.
    pub fn put_with<F>(&self, key: K, value: V, work: F)
    where
        F: FnOnce(),
    {
        self.lock.acquire_exclusive();
        let _mode = ModeGuard::exclusive(&self.lock);
        work();
        // SAFETY: Exclusive mode is held for this whole scope; no shared
        //         holder can observe the map while we mutate it.
        let entries = unsafe { &mut *self.entries.get() };
        entries.insert(key, value);
    }

    /// Read the value under `key`, holding shared mode throughout.
    pub fn get(&self, key: &K) -> Option<V> {
        self.get_with(key, || {})
    }

    /// As [`get`](Self::get), running `work` inside the critical section
    /// before the read.
    pub fn get_with<F>(&self, key: &K, work: F) -> Option<V>
    where
        F: FnOnce(),
    {
        self.lock.acquire_shared();
        let _mode = ModeGuard::shared(&self.lock);
        work();
        // SAFETY: Shared mode is held; writers are excluded and concurrent
        //         readers also take only shared references.
        let entries = unsafe { &*self.entries.get() };
        entries.get(key).cloned()
    }

    /// Drop every entry, holding exclusive mode throughout.
    pub fn clear(&self) {
        self.lock.acquire_exclusive();
        let _mode = ModeGuard::exclusive(&self.lock);
        // SAFETY: Exclusive mode is held for this whole scope.
        let entries = unsafe { &mut *self.entries.get() };
        entries.clear();
    }

    pub fn len(&self) -> usize {
        self.lock.acquire_shared();
        let _mode = ModeGuard::shared(&self.lock);
        // SAFETY: Shared mode is held.
        let entries = unsafe { &*self.entries.get() };
        entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<K, V> Default for KvStore<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> fmt::Debug for KvStore<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KvStore").finish()
    }
}

/// Releases the held mode when dropped, so no exit path leaks a hold,
/// caller panics included.
struct ModeGuard<'a> {
    lock: &'a SharedExclusiveLock,
    exclusive: bool,
}

impl<'a> ModeGuard<'a> {
    fn exclusive(lock: &'a SharedExclusiveLock) -> Self {
        Self {
            lock,
            exclusive: true,
        }
    }

    fn shared(lock: &'a SharedExclusiveLock) -> Self {
        Self {
            lock,
            exclusive: false,
        }
    }
}

impl Drop for ModeGuard<'_> {
    fn drop(&mut self) {
        let released = if self.exclusive {
            self.lock.release_exclusive()
        } else {
            self.lock.release_shared()
        };
        debug_assert!(released.is_ok(), "store released a mode it did not hold");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn writers_then_readers_see_every_entry() {
        let store = Arc::new(KvStore::new());

        let writers: Vec<_> = (0..5)
            .map(|i| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    store.put_with(i, i, || thread::yield_now());
                })
            })
            .collect();

        // Readers run against the live store; an entry is either absent or
        // complete, never half-written.
        let readers: Vec<_> = (0..5)
            .map(|i| {
                let store = Arc::clone(&store);
                thread::spawn(move || match store.get_with(&i, || thread::yield_now()) {
                    None => {}
                    Some(value) => assert_eq!(value, i),
                })
            })
            .collect();

        for t in writers.into_iter().chain(readers) {
            t.join().expect("worker panicked");
        }

        assert_eq!(store.len(), 5);
        for i in 0..5 {
            assert_eq!(store.get(&i), Some(i));
        }
    }

    #[test]
    fn clear_empties_the_store() {
        let store = KvStore::new();
        store.put("a", 1);
        store.put("b", 2);
        assert_eq!(store.len(), 2);

        store.clear();
        assert!(store.is_empty());
        assert_eq!(store.get(&"a"), None);
    }

    #[test]
    fn panicking_work_does_not_leak_the_mode() {
        let store = Arc::new(KvStore::new());

        let crashed = {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                store.put_with(9, 9, || panic!("work blew up"));
            })
            .join()
        };
        assert!(crashed.is_err());

        // The exclusive hold died with the thread; the store still works
        // and the aborted write never landed.
        store.put(1, 1);
        assert_eq!(store.get(&9), None);
        assert_eq!(store.get(&1), Some(1));
    }
}
