//! Single-Partition Cache
//!
//! A [`Cache`] is one `RwLock`-protected `HashMap` plus an optional background
//! sweeper. It is the unit of sharding: [`ShardedCache`](super::ShardedCache)
//! is nothing more than a fixed array of these.
//!
//! ## Concurrency Model
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │                  Cache<K, V>                 │
//! │  ┌────────────────────────────────────────┐  │
//! │  │ Store: RwLock<HashMap<K, Entry<V>>>    │◄─┼── get (read, write on expiry)
//! │  │        ttl, len                        │◄─┼── set / delete (write)
//! │  └────────────────────────────────────────┘  │
//! │                     ▲ Weak                   │
//! │            ┌────────┴────────┐               │
//! │            │     Sweeper     │ cleanup (write)
//! │            └─────────────────┘               │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! Expired entries are removed in two ways:
//! 1. **Lazy**: `get` finds an expired entry and removes it
//! 2. **Active**: the sweeper periodically scans the whole table
//!
//! No lock is ever held while acquiring another one, and the eviction
//! listener always runs after the lock is released.

use super::entry::{Entry, EvictionListener, RemovalCause};
use super::expiry::{CleanupTarget, Sweeper, SweeperState};
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::mem;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};

type Table<K, V> = HashMap<K, Entry<V>>;

/// The lock-protected table shared between a [`Cache`] and its sweeper.
pub(crate) struct Store<K, V> {
    /// The actual data storage
    items: RwLock<Table<K, V>>,

    /// Applied to every `set`; zero means entries never expire
    ttl: Duration,

    /// Number of entries physically stored, expired or not
    len: AtomicUsize,

    listener: Option<EvictionListener<K, V>>,
}

impl<K, V> Store<K, V>
where
    K: Eq + Hash,
{
    fn new(ttl: Duration, listener: Option<EvictionListener<K, V>>) -> Self {
        Self {
            items: RwLock::new(HashMap::new()),
            ttl,
            len: AtomicUsize::new(0),
            listener,
        }
    }

    // A panicking listener never runs under the lock, so a poisoned lock
    // still guards a consistent table.
    fn read(&self) -> RwLockReadGuard<'_, Table<K, V>> {
        self.items.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Table<K, V>> {
        self.items.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn notify(&self, key: K, value: V, cause: RemovalCause) {
        if let Some(listener) = &self.listener {
            listener(key, value, cause);
        }
    }

    fn set(&self, key: K, value: V) -> bool {
        let entry = Entry::with_ttl(value, self.ttl);

        let replaced = {
            let mut items = self.write();
            let replaced = items.insert(key, entry);
            if replaced.is_none() {
                self.len.fetch_add(1, Ordering::Relaxed);
            }
            replaced
        };

        // The previous value is dropped outside the lock
        replaced.is_none()
    }

    fn get(&self, key: &K) -> Option<V>
    where
        V: Clone,
    {
        // First, try a read lock (fast path for existing, non-expired keys)
        {
            let items = self.read();
            let entry = items.get(key)?;
            if !entry.is_expired() {
                return Some(entry.value.clone());
            }
        }

        // Key exists but is expired - need write lock to remove it
        let (key, entry) = {
            let mut items = self.write();
            match items.get(key) {
                Some(entry) if entry.is_expired() => {}
                // Race: another thread refreshed the key in between
                Some(entry) => return Some(entry.value.clone()),
                None => return None,
            }
            let removed = items.remove_entry(key)?;
            self.len.fetch_sub(1, Ordering::Relaxed);
            removed
        };

        self.notify(key, entry.value, RemovalCause::Expired);
        None
    }

    fn delete(&self, key: &K) -> bool {
        let removed = {
            let mut items = self.write();
            let removed = items.remove_entry(key);
            if removed.is_some() {
                self.len.fetch_sub(1, Ordering::Relaxed);
            }
            removed
        };

        match removed {
            Some((key, entry)) => {
                self.notify(key, entry.value, RemovalCause::Explicit);
                true
            }
            None => false,
        }
    }

    fn sweep(&self) -> usize {
        let now = Instant::now();

        let Some(listener) = &self.listener else {
            let mut items = self.write();
            let before = items.len();
            items.retain(|_, entry| !entry.is_expired_at(now));
            let removed = before - items.len();
            self.len.fetch_sub(removed, Ordering::Relaxed);
            return removed;
        };

        // Expired values are handed to the listener, so they are moved out
        // of the table rather than dropped in place.
        let removed: Vec<(K, V)> = {
            let mut items = self.write();
            let removed: Vec<_> = items
                .extract_if(|_, entry| entry.is_expired_at(now))
                .map(|(key, entry)| (key, entry.value))
                .collect();

            self.len.fetch_sub(removed.len(), Ordering::Relaxed);
            removed
        };

        let count = removed.len();
        for (key, value) in removed {
            listener(key, value, RemovalCause::Expired);
        }
        count
    }

    fn clear(&self) {
        let old = {
            let mut items = self.write();
            self.len.store(0, Ordering::Relaxed);
            mem::take(&mut *items)
        };
        drop(old);
    }

    fn len(&self) -> usize {
        self.len.load(Ordering::Relaxed)
    }
}

impl<K, V> CleanupTarget for Store<K, V>
where
    K: Eq + Hash + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    fn cleanup(&self) -> usize {
        self.sweep()
    }
}

/// A thread-safe key-value cache with a fixed time-to-live.
///
/// Every entry stored through [`Cache::set`] expires `ttl` after it was set.
/// A zero `ttl` disables expiry altogether. When both the ttl and the sweep
/// interval are positive, a background sweeper removes expired entries that
/// nobody reads anymore.
///
/// Dropping the cache stops its sweeper. [`Cache::close`] does the same while
/// keeping the stored entries readable.
///
/// # Example
///
/// ```
/// use stripecache::Cache;
/// use std::time::Duration;
///
/// let cache = Cache::new(Duration::from_secs(60), Duration::ZERO);
///
/// cache.set("name", "Ariz");
/// assert_eq!(cache.get(&"name"), Some("Ariz"));
///
/// cache.delete(&"name");
/// assert_eq!(cache.get(&"name"), None);
/// ```
pub struct Cache<K, V> {
    store: Arc<Store<K, V>>,
    sweeper: Option<Sweeper>,
}

impl<K, V> fmt::Debug for Cache<K, V>
where
    K: Eq + Hash,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cache")
            .field("ttl", &self.store.ttl)
            .field("len", &self.store.len())
            .field("sweeper", &self.sweeper.as_ref().map(Sweeper::state))
            .finish()
    }
}

impl<K, V> Default for Cache<K, V>
where
    K: Eq + Hash + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new(Duration::ZERO, Duration::ZERO)
    }
}

impl<K, V> Cache<K, V>
where
    K: Eq + Hash + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    /// Creates a cache whose entries live for `ttl`.
    ///
    /// A sweeper is started only if both `ttl` and `sweep_interval` are
    /// positive; a cache without expiry has nothing to sweep.
    pub fn new(ttl: Duration, sweep_interval: Duration) -> Self {
        Self::with_listener(ttl, sweep_interval, None)
    }

    pub(crate) fn with_listener(
        ttl: Duration,
        sweep_interval: Duration,
        listener: Option<EvictionListener<K, V>>,
    ) -> Self {
        let store = Arc::new(Store::new(ttl, listener));

        let sweeper = if !ttl.is_zero() && !sweep_interval.is_zero() {
            let sweeper = Sweeper::new(sweep_interval);
            sweeper.run(Arc::downgrade(&store));
            Some(sweeper)
        } else {
            None
        };

        Self { store, sweeper }
    }
}

impl<K, V> Cache<K, V>
where
    K: Eq + Hash,
{
    /// Stores a value, replacing any previous entry and resetting its expiry.
    ///
    /// # Returns
    ///
    /// Returns `true` if a new key was created, `false` if an existing key was updated.
    pub fn set(&self, key: K, value: V) -> bool {
        self.store.set(key, value)
    }

    /// Gets a clone of the value for a key.
    ///
    /// Returns `None` if the key doesn't exist or has expired. An expired
    /// entry is removed on the spot, even if the sweeper has not reached it.
    pub fn get(&self, key: &K) -> Option<V>
    where
        V: Clone,
    {
        self.store.get(key)
    }

    /// Deletes a key from the cache.
    ///
    /// # Returns
    ///
    /// Returns `true` if the key was deleted, `false` if it didn't exist.
    pub fn delete(&self, key: &K) -> bool {
        self.store.delete(key)
    }

    /// Removes every expired entry and returns how many were removed.
    ///
    /// All entries are compared against the same instant, taken once when the
    /// call starts. The background sweeper calls this on every tick.
    pub fn cleanup(&self) -> usize {
        self.store.sweep()
    }

    /// Stops the background sweeper, if any.
    ///
    /// Stored entries are kept and remain readable; expired ones are still
    /// hidden by `get`. Returns without waiting for the sweeper task, and
    /// calling it more than once is harmless.
    pub fn close(&self) {
        if let Some(sweeper) = &self.sweeper {
            sweeper.stop();
        }
    }

    /// Removes all entries. The eviction listener is not notified.
    pub fn clear(&self) {
        self.store.clear();
    }

    /// Returns the number of stored entries.
    ///
    /// Expired entries count until they are removed by a read or a sweep.
    pub fn len(&self) -> usize {
        self.store.len()
    }

    /// Returns true if the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns a snapshot of all live entries.
    pub fn items(&self) -> HashMap<K, V>
    where
        K: Clone,
        V: Clone,
    {
        let now = Instant::now();
        let items = self.store.read();

        items
            .iter()
            .filter(|(_, entry)| !entry.is_expired_at(now))
            .map(|(key, entry)| (key.clone(), entry.value.clone()))
            .collect()
    }

    /// Calls `f` for every live entry until it returns `false`.
    ///
    /// `f` walks a snapshot taken when the call starts and runs without the
    /// lock held, so it may read from and write to this cache. Changes made
    /// during the walk are not visited.
    ///
    /// # Returns
    ///
    /// Returns `false` if `f` stopped the walk early.
    pub fn for_each<F>(&self, mut f: F) -> bool
    where
        K: Clone,
        V: Clone,
        F: FnMut(&K, &V) -> bool,
    {
        let snapshot: Vec<(K, V)> = {
            let now = Instant::now();
            let items = self.store.read();
            items
                .iter()
                .filter(|(_, entry)| !entry.is_expired_at(now))
                .map(|(key, entry)| (key.clone(), entry.value.clone()))
                .collect()
        };

        snapshot.iter().all(|(key, value)| f(key, value))
    }

    /// Returns the time-to-live applied to every entry.
    pub fn ttl(&self) -> Duration {
        self.store.ttl
    }

    /// Returns the sweep interval, or `None` if this cache has no sweeper.
    pub fn sweep_interval(&self) -> Option<Duration> {
        self.sweeper.as_ref().map(Sweeper::interval)
    }

    /// Returns true while a background sweeper is running for this cache.
    pub fn is_sweeping(&self) -> bool {
        self.sweeper
            .as_ref()
            .is_some_and(|sweeper| sweeper.state() == SweeperState::Running)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CacheBuilder;
    use std::sync::{Mutex, OnceLock, Weak};
    use std::thread;

    type Removals = Arc<Mutex<Vec<(String, i32, RemovalCause)>>>;

    fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        condition()
    }

    fn recording_cache(ttl: Duration, sweep_interval: Duration) -> (Cache<String, i32>, Removals) {
        let removals: Removals = Arc::default();
        let sink = Arc::clone(&removals);

        let cache = CacheBuilder::new()
            .ttl(ttl)
            .sweep_interval(sweep_interval)
            .eviction_listener(move |key, value, cause| {
                sink.lock().unwrap().push((key, value, cause));
            })
            .build();

        (cache, removals)
    }

    #[test]
    fn test_set_and_get() {
        let cache = Cache::new(Duration::from_secs(60), Duration::from_secs(10));

        cache.set("foo".to_string(), 42);
        assert_eq!(cache.get(&"foo".to_string()), Some(42));
    }

    #[test]
    fn test_get_nonexistent() {
        let cache: Cache<&str, i32> = Cache::default();
        assert_eq!(cache.get(&"nonexistent"), None);
    }

    #[test]
    fn test_set_reports_new_keys() {
        let cache = Cache::default();

        assert!(cache.set("key", 1));
        assert!(!cache.set("key", 2));
        assert_eq!(cache.get(&"key"), Some(2));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_delete() {
        let cache = Cache::new(Duration::from_secs(60), Duration::from_secs(10));

        cache.set("key", "value");
        assert!(cache.delete(&"key"));
        assert_eq!(cache.get(&"key"), None);
    }

    #[test]
    fn test_delete_is_idempotent() {
        let cache = Cache::default();
        cache.set("other", 1);

        assert!(!cache.delete(&"missing"));
        assert!(!cache.delete(&"missing"));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(&"other"), Some(1));
    }

    #[test]
    fn test_expiry() {
        let cache = Cache::new(Duration::from_millis(50), Duration::from_millis(10));

        cache.set("a", 1);
        assert_eq!(cache.get(&"a"), Some(1));

        thread::sleep(Duration::from_millis(100));

        assert_eq!(cache.get(&"a"), None);
    }

    #[test]
    fn test_lazy_expiry_without_sweeper() {
        let cache = Cache::new(Duration::from_millis(20), Duration::ZERO);
        assert!(!cache.is_sweeping());

        cache.set("key", "value");
        thread::sleep(Duration::from_millis(40));

        // Still physically stored until someone reads it
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(&"key"), None);
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn test_set_refreshes_expiry() {
        let cache = Cache::new(Duration::from_millis(60), Duration::ZERO);

        cache.set("key", 1);
        thread::sleep(Duration::from_millis(40));
        cache.set("key", 2);
        thread::sleep(Duration::from_millis(40));

        assert_eq!(cache.get(&"key"), Some(2));
    }

    #[test]
    fn test_huge_ttl_never_expires() {
        let cache = Cache::new(Duration::MAX, Duration::ZERO);

        assert!(cache.set("k", 1));
        assert_eq!(cache.get(&"k"), Some(1));
        assert_eq!(cache.cleanup(), 0);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_huge_ttl_and_interval_keep_sweeper() {
        let huge = Duration::from_secs(u64::MAX / 2);
        let cache = Cache::new(huge, huge);
        cache.set("k", 1);

        thread::sleep(Duration::from_millis(50));

        assert!(cache.is_sweeping());
        assert_eq!(cache.sweep_interval(), Some(huge));
        assert_eq!(cache.get(&"k"), Some(1));

        cache.close();
        assert!(!cache.is_sweeping());
    }

    #[test]
    fn test_zero_ttl_never_expires() {
        let cache = Cache::new(Duration::ZERO, Duration::from_millis(10));

        assert!(!cache.is_sweeping());
        assert_eq!(cache.sweep_interval(), None);

        cache.set("key", "value");
        thread::sleep(Duration::from_millis(50));

        assert_eq!(cache.get(&"key"), Some("value"));
        assert_eq!(cache.cleanup(), 0);
    }

    #[test]
    fn test_cleanup_expired() {
        let cache = Cache::new(Duration::from_millis(10), Duration::ZERO);

        cache.set("key1", "value1");
        cache.set("key2", "value2");
        thread::sleep(Duration::from_millis(50));
        cache.set("key3", "value3");

        assert_eq!(cache.len(), 3);
        assert_eq!(cache.cleanup(), 2);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(&"key3"), Some("value3"));
    }

    #[test]
    fn test_sweeper_removes_unread_entries() {
        let cache = Cache::new(Duration::from_millis(30), Duration::from_millis(10));
        assert!(cache.is_sweeping());

        for i in 0..10 {
            cache.set(i, i);
        }
        assert_eq!(cache.len(), 10);

        // Without a single get
        assert!(wait_until(|| cache.is_empty()));
        assert_eq!(cache.len(), 0);
    }

    #[tokio::test]
    async fn test_sweeper_on_runtime() {
        crate::testing::init_tracing();

        let cache = Cache::new(Duration::from_millis(30), Duration::from_millis(10));
        cache.set("short", 1);

        for _ in 0..500 {
            if cache.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn test_close_stops_sweeper_but_keeps_entries() {
        let cache = Cache::new(Duration::from_secs(60), Duration::from_millis(10));
        cache.set("key", "value");
        assert!(cache.is_sweeping());

        cache.close();
        cache.close();

        assert!(!cache.is_sweeping());
        assert_eq!(cache.get(&"key"), Some("value"));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_closed_cache_still_expires_lazily() {
        let cache = Cache::new(Duration::from_millis(20), Duration::from_millis(500));
        cache.close();

        cache.set("key", "value");
        thread::sleep(Duration::from_millis(40));

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(&"key"), None);
    }

    #[test]
    fn test_clear() {
        let cache = Cache::default();
        cache.set("key1", "value1");
        cache.set("key2", "value2");

        cache.clear();

        assert!(cache.is_empty());
        assert_eq!(cache.get(&"key1"), None);
    }

    #[test]
    fn test_items_skips_expired() {
        let cache = Cache::new(Duration::from_millis(20), Duration::ZERO);
        cache.set("old", 1);
        thread::sleep(Duration::from_millis(40));
        cache.set("new", 2);

        let items = cache.items();
        assert_eq!(items.len(), 1);
        assert_eq!(items.get("new"), Some(&2));
    }

    #[test]
    fn test_for_each_stops_early() {
        let cache = Cache::default();
        for i in 0..10 {
            cache.set(i, i * 2);
        }

        let mut seen = 0;
        let completed = cache.for_each(|_, _| {
            seen += 1;
            seen < 3
        });

        assert!(!completed);
        assert_eq!(seen, 3);

        let mut sum = 0;
        assert!(cache.for_each(|_, value| {
            sum += value;
            true
        }));
        assert_eq!(sum, 90);
    }

    #[test]
    fn test_for_each_may_reenter_cache() {
        let cache = Cache::new(Duration::from_millis(20), Duration::ZERO);
        cache.set(0, 0);
        thread::sleep(Duration::from_millis(40));
        cache.set(1, 10);
        cache.set(2, 20);

        let mut visited = vec![];
        assert!(cache.for_each(|key, value| {
            // Reading the expired key takes the write lock to remove it
            assert_eq!(cache.get(&0), None);
            cache.set(key + 100, *value);
            visited.push(*key);
            true
        }));

        visited.sort();
        assert_eq!(visited, vec![1, 2]);
        assert_eq!(cache.get(&101), Some(10));
        assert_eq!(cache.get(&102), Some(20));
        assert_eq!(cache.len(), 4);
    }

    #[test]
    fn test_usable_after_poisoned_lock() {
        let cache = Cache::new(Duration::from_millis(100), Duration::ZERO);
        cache.set("kept", 1);
        cache.set("expiring", 2);

        let store = Arc::clone(&cache.store);
        let result = thread::spawn(move || {
            let _items = store.write();
            panic!("writer died holding the lock");
        })
        .join();
        assert!(result.is_err());
        assert!(cache.store.items.is_poisoned());

        assert_eq!(cache.get(&"kept"), Some(1));
        assert!(!cache.set("kept", 3));
        assert!(cache.set("new", 4));
        assert!(cache.delete(&"new"));
        assert_eq!(cache.items().len(), 2);

        thread::sleep(Duration::from_millis(150));
        cache.set("fresh", 5);
        assert_eq!(cache.cleanup(), 2);
        assert_eq!(cache.get(&"fresh"), Some(5));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_listener_sweep_keeps_live_entries() {
        let (cache, removals) = recording_cache(Duration::from_millis(20), Duration::ZERO);

        cache.set("stale".to_string(), -1);
        thread::sleep(Duration::from_millis(40));
        for i in 0..100 {
            cache.set(format!("live-{}", i), i);
        }

        assert_eq!(cache.cleanup(), 1);
        assert_eq!(cache.len(), 100);
        assert_eq!(cache.get(&"live-42".to_string()), Some(42));
        assert_eq!(cache.cleanup(), 0);
        assert_eq!(removals.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_accessors() {
        let cache: Cache<u8, u8> = Cache::new(Duration::from_secs(5), Duration::from_secs(1));
        assert_eq!(cache.ttl(), Duration::from_secs(5));
        assert_eq!(cache.sweep_interval(), Some(Duration::from_secs(1)));
    }

    #[test]
    fn test_listener_on_delete() {
        let (cache, removals) = recording_cache(Duration::from_secs(60), Duration::ZERO);

        cache.set("key".to_string(), 7);
        cache.delete(&"key".to_string());
        cache.delete(&"key".to_string());

        let removals = removals.lock().unwrap();
        assert_eq!(
            removals.as_slice(),
            &[("key".to_string(), 7, RemovalCause::Explicit)]
        );
    }

    #[test]
    fn test_listener_on_lazy_expiry() {
        let (cache, removals) = recording_cache(Duration::from_millis(20), Duration::ZERO);

        cache.set("key".to_string(), 1);
        thread::sleep(Duration::from_millis(40));
        assert_eq!(cache.get(&"key".to_string()), None);

        let removals = removals.lock().unwrap();
        assert_eq!(
            removals.as_slice(),
            &[("key".to_string(), 1, RemovalCause::Expired)]
        );
    }

    #[test]
    fn test_listener_on_cleanup() {
        let (cache, removals) = recording_cache(Duration::from_millis(20), Duration::ZERO);

        cache.set("a".to_string(), 1);
        cache.set("b".to_string(), 2);
        thread::sleep(Duration::from_millis(40));
        cache.set("c".to_string(), 3);

        assert_eq!(cache.cleanup(), 2);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(&"c".to_string()), Some(3));

        let mut removed: Vec<_> = removals
            .lock()
            .unwrap()
            .iter()
            .map(|(key, value, cause)| {
                assert_eq!(*cause, RemovalCause::Expired);
                (key.clone(), *value)
            })
            .collect();
        removed.sort();
        assert_eq!(removed, vec![("a".to_string(), 1), ("b".to_string(), 2)]);
    }

    #[test]
    fn test_listener_not_called_on_replace_or_clear() {
        let (cache, removals) = recording_cache(Duration::from_secs(60), Duration::ZERO);

        cache.set("key".to_string(), 1);
        cache.set("key".to_string(), 2);
        cache.clear();

        assert!(removals.lock().unwrap().is_empty());
    }

    #[test]
    fn test_listener_can_reenter_cache() {
        let slot: Arc<OnceLock<Weak<Cache<String, i32>>>> = Arc::new(OnceLock::new());
        let listener_slot = Arc::clone(&slot);

        let cache = Arc::new(
            CacheBuilder::new()
                .ttl(Duration::from_millis(20))
                .eviction_listener(move |key: String, value, _| {
                    if let Some(cache) = listener_slot.get().and_then(Weak::upgrade) {
                        cache.set(format!("{}-removed", key), value);
                    }
                })
                .build(),
        );
        let _ = slot.set(Arc::downgrade(&cache));

        cache.set("deleted".to_string(), 1);
        cache.delete(&"deleted".to_string());
        assert_eq!(cache.get(&"deleted-removed".to_string()), Some(1));

        cache.set("swept".to_string(), 2);
        thread::sleep(Duration::from_millis(40));
        assert!(cache.cleanup() >= 1);
        assert_eq!(cache.get(&"swept-removed".to_string()), Some(2));
    }

    #[test]
    fn test_nested_caches() {
        let outer: Cache<&str, Arc<Cache<&str, &str>>> =
            Cache::new(Duration::from_millis(30), Duration::from_millis(10));
        let inner = Arc::new(Cache::new(Duration::from_secs(60), Duration::from_secs(60)));
        inner.set("foo", "bar");

        outer.set("nested", Arc::clone(&inner));
        let fetched = outer.get(&"nested").unwrap();
        assert_eq!(fetched.get(&"foo"), Some("bar"));
        drop(fetched);

        outer.delete(&"nested");
        assert_eq!(Arc::strong_count(&inner), 1);

        outer.set("nested", Arc::clone(&inner));
        assert!(wait_until(|| outer.is_empty()));

        assert_eq!(outer.get(&"nested").map(|_| ()), None);
        assert_eq!(Arc::strong_count(&inner), 1);
        assert_eq!(inner.get(&"foo"), Some("bar"));
    }

    #[test]
    fn test_concurrent_access() {
        let cache = Arc::new(Cache::new(Duration::from_secs(60), Duration::from_secs(10)));
        let mut handles = vec![];

        // Spawn writers, each checking its own key right after setting it
        for i in 0..16 {
            let cache = Arc::clone(&cache);
            handles.push(thread::spawn(move || {
                for j in 0..100 {
                    let key = format!("k-{}-{}", i, j);
                    cache.set(key.clone(), j);
                    assert_eq!(cache.get(&key), Some(j));
                }
            }));
        }

        // Interleaved readers
        for _ in 0..4 {
            let cache = Arc::clone(&cache);
            handles.push(thread::spawn(move || {
                for j in 0..100 {
                    let _ = cache.get(&format!("k-0-{}", j));
                    let _ = cache.len();
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(cache.len(), 1600);
    }

    #[test]
    fn test_concurrent_expiry_and_writes() {
        let cache = Arc::new(Cache::new(Duration::from_millis(5), Duration::from_millis(2)));
        let mut handles = vec![];

        for i in 0..8 {
            let cache = Arc::clone(&cache);
            handles.push(thread::spawn(move || {
                for j in 0..200 {
                    let key = (i, j % 20);
                    cache.set(key, j);
                    let _ = cache.get(&key);
                    if j % 7 == 0 {
                        cache.delete(&key);
                    }
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        thread::sleep(Duration::from_millis(30));
        cache.cleanup();

        // The counter never drifts from what the table actually holds
        assert_eq!(cache.len(), 0);
    }
}
