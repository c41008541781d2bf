//! Key routing for sharded caches
//!
//! Routes keys to shards with `hash(key) mod shard_count`. The hash must be a
//! pure function of the key: a key that moved to another shard would leave its
//! value unreachable.

use crate::error::{CacheError, Result};
use siphasher::sip::SipHasher13;
use std::hash::{BuildHasher, BuildHasherDefault, Hash};

/// Default shard hasher: SipHash-1-3 with fixed zero keys.
///
/// Unlike `RandomState`, it produces the same index for the same key in every
/// process.
pub type DefaultShardHasher = BuildHasherDefault<SipHasher13>;

/// Routes keys to shard indices.
#[derive(Debug, Clone)]
pub struct ShardRouter<S = DefaultShardHasher> {
    num_shards: usize,
    hasher: S,
}

impl ShardRouter {
    /// Create a new shard router with the default hasher
    pub fn new(num_shards: usize) -> Result<Self> {
        Self::with_hasher(num_shards, DefaultShardHasher::default())
    }
}

impl<S: BuildHasher> ShardRouter<S> {
    /// Create a new shard router with a custom hasher
    pub fn with_hasher(num_shards: usize, hasher: S) -> Result<Self> {
        if num_shards == 0 {
            return Err(CacheError::InvalidShardCount(num_shards));
        }

        Ok(Self { num_shards, hasher })
    }

    /// Route a key to a shard index in `0..num_shards`
    #[inline]
    pub fn route<K: Hash + ?Sized>(&self, key: &K) -> usize {
        (self.hasher.hash_one(key) % self.num_shards as u64) as usize
    }

    /// Get the number of shards
    pub fn num_shards(&self) -> usize {
        self.num_shards
    }
}
