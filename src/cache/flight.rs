//! Per-key mutual exclusion for scope fetches

use std::collections::HashSet;
use std::hash::Hash;

use parking_lot::{Condvar, Mutex};

/// At-most-one holder per key.
///
/// The executor takes the lock for a (scope, principal) pair around the whole
/// lookup / fetch / write-back sequence, so duplicate concurrent fetches of
/// the same scope collapse: the second caller blocks until the first is done
/// and then finds the columns in the cache.
pub struct KeyedLock<K: Eq + Hash + Clone> {
    held: Mutex<HashSet<K>>,
    released: Condvar,
}

impl<K: Eq + Hash + Clone> KeyedLock<K> {
    pub fn new() -> Self {
        Self {
            held: Mutex::new(HashSet::new()),
            released: Condvar::new(),
        }
    }

    /// Block until the key is free, then hold it until the guard drops
    pub fn acquire(&self, key: K) -> KeyedGuard<'_, K> {
        let mut held = self.held.lock();
        while held.contains(&key) {
            self.released.wait(&mut held);
        }
        held.insert(key.clone());
        KeyedGuard { owner: self, key }
    }
}

impl<K: Eq + Hash + Clone> Default for KeyedLock<K> {
    fn default() -> Self {
        Self::new()
    }
}

pub struct KeyedGuard<'a, K: Eq + Hash + Clone> {
    owner: &'a KeyedLock<K>,
    key: K,
}

impl<K: Eq + Hash + Clone> Drop for KeyedGuard<'_, K> {
    fn drop(&mut self) {
        let mut held = self.owner.held.lock();
        held.remove(&self.key);
        self.owner.released.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_same_key_is_exclusive() {
        let lock: Arc<KeyedLock<u32>> = Arc::new(KeyedLock::new());
        let concurrent = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let lock = lock.clone();
                let concurrent = concurrent.clone();
                let peak = peak.clone();
                std::thread::spawn(move || {
                    let _guard = lock.acquire(1);
                    let now = concurrent.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    std::thread::sleep(Duration::from_millis(5));
                    concurrent.fetch_sub(1, Ordering::SeqCst);
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(peak.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_distinct_keys_do_not_block() {
        let lock: KeyedLock<u32> = KeyedLock::new();
        let _a = lock.acquire(1);
        let _b = lock.acquire(2);
    }
}
