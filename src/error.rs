//! Construction Errors
//!
//! Steady-state cache operations cannot fail: a missing or expired key is
//! reported as `None`, not as an error. The only failures are invalid
//! construction parameters, and they surface when the cache is built rather
//! than on first use.

use thiserror::Error;

/// Errors that can occur while building a cache.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// A sharded cache needs at least one shard.
    #[error("invalid shard count {0}: a sharded cache needs at least one shard")]
    InvalidShardCount(usize),
}

/// Result type for cache construction.
pub type Result<T> = std::result::Result<T, CacheError>;
