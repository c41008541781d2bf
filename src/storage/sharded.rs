//! Lock-Striped Cache
//!
//! A [`ShardedCache`] splits the key space over N independent [`Cache`]
//! partitions. Every keyed operation hashes the key, picks one partition and
//! forwards the call unchanged, so contention is spread over N locks instead
//! of one.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                    ShardedCache                          │
//! │        key ──> ShardRouter: hash(key) mod N              │
//! │  ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌─────────┐         │
//! │  │ Cache 0 │ │ Cache 1 │ │ Cache 2 │ │ Cache N │         │
//! │  │ RwLock  │ │ RwLock  │ │ RwLock  │ │ RwLock  │         │
//! │  │ Sweeper │ │ Sweeper │ │ Sweeper │ │ Sweeper │         │
//! │  └─────────┘ └─────────┘ └─────────┘ └─────────┘         │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! Each partition is built through [`Cache::new`] and owns its own sweeper, so
//! a table of N shards with expiry enabled runs N background tasks with N
//! independent sweep timelines. There is no ordering between operations on
//! keys that live in different shards.

use super::entry::EvictionListener;
use super::partition::Cache;
use super::router::{DefaultShardHasher, ShardRouter};
use crate::error::Result;
use std::collections::HashMap;
use std::fmt;
use std::hash::{BuildHasher, Hash};
use std::time::Duration;
use tracing::debug;

/// A thread-safe cache split over a fixed number of independently locked
/// partitions.
///
/// # Example
///
/// ```
/// use stripecache::ShardedCache;
/// use std::time::Duration;
///
/// let cache = ShardedCache::new(8, Duration::ZERO, Duration::ZERO).unwrap();
///
/// cache.set("x", "y");
/// assert_eq!(cache.get(&"x"), Some("y"));
///
/// // Closing only stops the sweepers
/// cache.close();
/// assert_eq!(cache.get(&"x"), Some("y"));
/// ```
pub struct ShardedCache<K, V, S = DefaultShardHasher> {
    shards: Box<[Cache<K, V>]>,
    router: ShardRouter<S>,
}

impl<K, V, S> fmt::Debug for ShardedCache<K, V, S>
where
    K: Eq + Hash,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShardedCache")
            .field("shards", &self.shards.len())
            .field("len", &self.shards.iter().map(Cache::len).sum::<usize>())
            .finish()
    }
}

impl<K, V> ShardedCache<K, V>
where
    K: Eq + Hash + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    /// Creates a cache of `shards` partitions, each with the given ttl and
    /// sweep interval.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::InvalidShardCount`](crate::CacheError::InvalidShardCount)
    /// if `shards` is zero.
    pub fn new(shards: usize, ttl: Duration, sweep_interval: Duration) -> Result<Self> {
        Self::with_hasher(shards, ttl, sweep_interval, DefaultShardHasher::default())
    }
}

impl<K, V, S> ShardedCache<K, V, S>
where
    K: Eq + Hash + Send + Sync + 'static,
    V: Send + Sync + 'static,
    S: BuildHasher,
{
    /// Creates a sharded cache that routes keys with `hasher`.
    ///
    /// The hasher must be deterministic for the lifetime of the cache.
    pub fn with_hasher(
        shards: usize,
        ttl: Duration,
        sweep_interval: Duration,
        hasher: S,
    ) -> Result<Self> {
        Self::with_listener(shards, ttl, sweep_interval, hasher, None)
    }

    pub(crate) fn with_listener(
        shards: usize,
        ttl: Duration,
        sweep_interval: Duration,
        hasher: S,
        listener: Option<EvictionListener<K, V>>,
    ) -> Result<Self> {
        let router = ShardRouter::with_hasher(shards, hasher)?;

        let shards: Box<[Cache<K, V>]> = (0..shards)
            .map(|_| Cache::with_listener(ttl, sweep_interval, listener.clone()))
            .collect();

        debug!(
            shards = shards.len(),
            ttl_ms = ttl.as_millis() as u64,
            sweep_interval_ms = sweep_interval.as_millis() as u64,
            "Sharded cache created"
        );

        Ok(Self { shards, router })
    }
}

impl<K, V, S> ShardedCache<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    /// Determines which shard a key belongs to.
    #[inline]
    pub fn shard_index(&self, key: &K) -> usize {
        self.router.route(key)
    }

    /// Gets the shard for a given key.
    #[inline]
    fn shard_for(&self, key: &K) -> &Cache<K, V> {
        &self.shards[self.shard_index(key)]
    }

    /// Stores a value in the key's shard.
    ///
    /// Returns `true` if a new key was created.
    pub fn set(&self, key: K, value: V) -> bool {
        self.shard_for(&key).set(key, value)
    }

    /// Gets a clone of the value for a key; `None` if absent or expired.
    pub fn get(&self, key: &K) -> Option<V>
    where
        V: Clone,
    {
        self.shard_for(key).get(key)
    }

    /// Deletes a key. Returns `true` if it existed.
    pub fn delete(&self, key: &K) -> bool {
        self.shard_for(key).delete(key)
    }
}

impl<K, V, S> ShardedCache<K, V, S>
where
    K: Eq + Hash,
{
    /// Runs a cleanup on every shard and returns the total number removed.
    pub fn cleanup(&self) -> usize {
        self.shards.iter().map(Cache::cleanup).sum()
    }

    /// Stops every shard's sweeper. Entries are kept.
    pub fn close(&self) {
        for shard in self.shards.iter() {
            shard.close();
        }
    }

    /// Removes all entries from every shard.
    pub fn clear(&self) {
        for shard in self.shards.iter() {
            shard.clear();
        }
    }

    /// Returns the number of stored entries across all shards.
    ///
    /// Shards are read one after another, so under concurrent writes this is
    /// an approximation.
    pub fn len(&self) -> usize {
        self.shards.iter().map(Cache::len).sum()
    }

    /// Returns true if no shard holds an entry.
    pub fn is_empty(&self) -> bool {
        self.shards.iter().all(Cache::is_empty)
    }

    /// Returns a snapshot of all live entries across all shards.
    pub fn items(&self) -> HashMap<K, V>
    where
        K: Clone,
        V: Clone,
    {
        let mut result = HashMap::with_capacity(self.len());
        for shard in self.shards.iter() {
            result.extend(shard.items());
        }
        result
    }

    /// Calls `f` for every live entry, shard by shard, until it returns
    /// `false`. Stopping in one shard ends the whole walk.
    ///
    /// Each shard is walked over a snapshot with no lock held, so `f` may call
    /// back into this cache.
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
        self.shards.iter().all(|shard| shard.for_each(&mut f))
    }

    /// Returns the number of shards.
    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    /// Returns the shard at `index`.
    pub fn shard(&self, index: usize) -> Option<&Cache<K, V>> {
        self.shards.get(index)
    }

    /// Iterates over all shards in index order.
    pub fn shards(&self) -> impl Iterator<Item = &Cache<K, V>> {
        self.shards.iter()
    }

    /// Returns the time-to-live applied to every entry.
    pub fn ttl(&self) -> Duration {
        self.shards[0].ttl()
    }
}
