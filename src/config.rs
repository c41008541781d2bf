//! Cache Configuration
//!
//! [`CacheConfig`] holds the construction parameters shared by both cache
//! flavours. [`CacheBuilder`] wraps a config plus the optional eviction
//! listener and builds either a [`Cache`] or a [`ShardedCache`].

use crate::error::{CacheError, Result};
use crate::storage::{Cache, DefaultShardHasher, EvictionListener, RemovalCause, ShardedCache};
use std::fmt;
use std::hash::{BuildHasher, Hash};
use std::sync::Arc;
use std::time::Duration;

/// Configuration for a cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Time-to-live applied to every entry (default: zero, never expire)
    pub ttl: Duration,

    /// Interval between background sweeps (default: 1s)
    ///
    /// Ignored when `ttl` is zero. A zero interval disables the sweeper and
    /// leaves expiry to reads and explicit `cleanup` calls.
    pub sweep_interval: Duration,

    /// Number of partitions for a sharded cache (default: 4 per CPU, rounded
    /// up to a power of two)
    pub shards: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::ZERO,
            sweep_interval: Duration::from_secs(1),
            shards: default_shards(),
        }
    }
}

impl CacheConfig {
    /// Checks the configuration without building anything.
    pub fn validate(&self) -> Result<()> {
        if self.shards == 0 {
            return Err(CacheError::InvalidShardCount(self.shards));
        }
        Ok(())
    }

    /// Returns true if a cache built from this config runs a sweeper.
    pub fn sweeps(&self) -> bool {
        !self.ttl.is_zero() && !self.sweep_interval.is_zero()
    }
}

/// Default shard count: four partitions per CPU, rounded up to a power of two.
pub fn default_shards() -> usize {
    (num_cpus::get() * 4).next_power_of_two()
}

/// Builds caches from a [`CacheConfig`] and an optional eviction listener.
///
/// # Example
///
/// ```
/// use stripecache::CacheBuilder;
/// use std::time::Duration;
///
/// let cache = CacheBuilder::new()
///     .ttl(Duration::from_secs(30))
///     .sweep_interval(Duration::from_secs(5))
///     .shards(16)
///     .build_sharded()
///     .unwrap();
///
/// cache.set("session", 42u64);
/// assert_eq!(cache.get(&"session"), Some(42));
/// assert_eq!(cache.shard_count(), 16);
/// ```
pub struct CacheBuilder<K, V> {
    config: CacheConfig,
    listener: Option<EvictionListener<K, V>>,
}

impl<K, V> fmt::Debug for CacheBuilder<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheBuilder")
            .field("config", &self.config)
            .field("listener", &self.listener.is_some())
            .finish()
    }
}

impl<K, V> Default for CacheBuilder<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> CacheBuilder<K, V> {
    /// Creates a builder with the default configuration.
    pub fn new() -> Self {
        Self::from_config(CacheConfig::default())
    }

    /// Creates a builder from an existing configuration.
    pub fn from_config(config: CacheConfig) -> Self {
        Self {
            config,
            listener: None,
        }
    }

    /// Sets the time-to-live applied to every entry.
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.config.ttl = ttl;
        self
    }

    /// Sets the interval between background sweeps.
    pub fn sweep_interval(mut self, interval: Duration) -> Self {
        self.config.sweep_interval = interval;
        self
    }

    /// Sets the number of partitions used by [`CacheBuilder::build_sharded`].
    pub fn shards(mut self, shards: usize) -> Self {
        self.config.shards = shards;
        self
    }

    /// Registers a callback for entries removed by `delete` or expiry.
    ///
    /// The callback runs after the entry left the table, outside any lock.
    pub fn eviction_listener<F>(mut self, listener: F) -> Self
    where
        F: Fn(K, V, RemovalCause) + Send + Sync + 'static,
    {
        self.listener = Some(Arc::new(listener));
        self
    }

    /// Returns the configuration built so far.
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }
}

impl<K, V> CacheBuilder<K, V>
where
    K: Eq + Hash + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    /// Builds a single-partition cache. The shard count is ignored.
    pub fn build(self) -> Cache<K, V> {
        Cache::with_listener(self.config.ttl, self.config.sweep_interval, self.listener)
    }

    /// Builds a sharded cache with the default hasher.
    pub fn build_sharded(self) -> Result<ShardedCache<K, V>> {
        self.build_sharded_with_hasher(DefaultShardHasher::default())
    }

    /// Builds a sharded cache that routes keys with `hasher`.
    pub fn build_sharded_with_hasher<S: BuildHasher>(
        self,
        hasher: S,
    ) -> Result<ShardedCache<K, V, S>> {
        self.config.validate()?;
        ShardedCache::with_listener(
            self.config.shards,
            self.config.ttl,
            self.config.sweep_interval,
            hasher,
            self.listener,
        )
    }
}
