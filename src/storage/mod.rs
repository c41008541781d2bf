//! Storage Module
//!
//! This module provides the core storage functionality for stripecache:
//! a thread-safe key-value table with TTL support, its lock-striped variant,
//! and the background sweeper that reclaims expired entries.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     ShardedCache                            │
//! │  ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌─────────┐           │
//! │  │ Cache 0 │ │ Cache 1 │ │ Cache 2 │ │...N     │           │
//! │  │ RwLock  │ │ RwLock  │ │ RwLock  │ │ shards  │           │
//! │  └────▲────┘ └────▲────┘ └────▲────┘ └────▲────┘           │
//! └───────┼───────────┼───────────┼───────────┼─────────────────┘
//!   ┌─────┴───┐ ┌─────┴───┐ ┌─────┴───┐ ┌─────┴───┐
//!   │ Sweeper │ │ Sweeper │ │ Sweeper │ │ Sweeper │
//!   └─────────┘ └─────────┘ └─────────┘ └─────────┘
//! ```
//!
//! ## Features
//!
//! - **RwLock per partition**: Multiple concurrent readers, exclusive writers
//! - **Sharded Storage**: N independent partitions reduce lock contention
//! - **Lazy Expiry**: Expired keys are removed on access
//! - **Active Expiry**: One background sweeper per partition removes
//!   expired keys nobody reads
//!
//! ## Example
//!
//! ```
//! use stripecache::storage::{Cache, ShardedCache};
//! use std::time::Duration;
//!
//! // A single partition, entries live for an hour
//! let cache = Cache::new(Duration::from_secs(3600), Duration::ZERO);
//! cache.set("name", "Ariz");
//! assert_eq!(cache.get(&"name"), Some("Ariz"));
//!
//! // Sixteen partitions, no expiry
//! let sharded = ShardedCache::new(16, Duration::ZERO, Duration::ZERO).unwrap();
//! sharded.set(1u64, "one");
//! assert_eq!(sharded.get(&1), Some("one"));
//! ```

pub mod entry;
pub mod expiry;
pub mod partition;
pub mod router;
pub mod sharded;

// Re-export commonly used types
pub use entry::{Entry, EvictionListener, RemovalCause};
pub use expiry::{CleanupTarget, Sweeper, SweeperState};
pub use partition::Cache;
pub use router::{DefaultShardHasher, ShardRouter};
pub use sharded::ShardedCache;
