//! # stripecache - An In-Process TTL Cache with Lock Striping
//!
//! stripecache is a thread-safe, in-memory key-value cache with time-based
//! expiry. It can run as a single partition or split its key space over N
//! independently locked partitions for concurrent workloads.
//!
//! ## Features
//!
//! - **Generic**: Any `Eq + Hash` key, any `Clone` value (including other caches)
//! - **TTL Support**: One fixed time-to-live per cache, zero means never expire
//! - **Lock Striping**: `ShardedCache` spreads keys over N `RwLock`s
//! - **Background Sweeping**: One Tokio task per partition reclaims expired entries
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                             stripecache                                 │
//! │                                                                         │
//! │  ┌─────────────┐    ┌─────────────┐    ┌──────────────────────────────┐ │
//! │  │   Caller    │───>│ ShardRouter │───>│        ShardedCache          │ │
//! │  │ set/get/del │    │ hash mod N  │    │ ┌────────┐ ┌────────┐        │ │
//! │  └──────┬──────┘    └─────────────┘    │ │Cache 0 │ │Cache 1 │ ...N   │ │
//! │         │                              │ │RwLock  │ │RwLock  │        │ │
//! │         │                              │ └───▲────┘ └───▲────┘        │ │
//! │         │                              └─────┼──────────┼─────────────┘ │
//! │         │           ┌─────────────┐          │          │               │
//! │         └──────────>│    Cache    │     ┌────┴───┐ ┌────┴───┐           │
//! │                     │   RwLock    │◄────│Sweeper │ │Sweeper │           │
//! │                     └─────────────┘     └────────┘ └────────┘           │
//! │                                        (Background Tokio Tasks)         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```
//! use stripecache::{Cache, ShardedCache};
//! use std::time::Duration;
//!
//! // Entries expire after a minute; a sweeper runs every ten seconds
//! let cache = Cache::new(Duration::from_secs(60), Duration::from_secs(10));
//! cache.set("user:1", "Ariz".to_string());
//! assert_eq!(cache.get(&"user:1"), Some("Ariz".to_string()));
//!
//! // Same surface, spread over 8 partitions
//! let sharded = ShardedCache::new(8, Duration::from_secs(60), Duration::from_secs(10))?;
//! sharded.set("user:1", 1u32);
//! assert_eq!(sharded.get(&"user:1"), Some(1));
//!
//! // Stops the sweepers; entries stay readable
//! sharded.close();
//! # Ok::<(), stripecache::CacheError>(())
//! ```
//!
//! ## Module Overview
//!
//! - [`storage`]: Partitions, the sharded table, routing and the sweeper
//! - [`config`]: Construction parameters and the builder
//! - [`error`]: Construction errors
//!
//! ## Design Highlights
//!
//! ### Lazy + Active Expiry
//!
//! Keys with a TTL are expired in two ways:
//! 1. **Lazy**: When a key is read, we check if it's expired
//! 2. **Active**: A background task periodically scans for expired keys
//!
//! Lazy expiry keeps stale values invisible between sweeps; active expiry
//! keeps memory bounded for keys that are never read again.
//!
//! ### Sweeper Placement
//!
//! Sweepers are spawned onto the current Tokio runtime. Outside a runtime they
//! share one small background runtime built on first use, so caches can be
//! used from plain synchronous code as well.
//!
//! ### Infallible Operations
//!
//! Only construction can fail (a sharded cache with zero shards). A missing or
//! expired key is `None`, never an error.

pub mod config;
pub mod error;
pub mod storage;

// Re-export commonly used types for convenience
pub use config::{CacheBuilder, CacheConfig};
pub use error::{CacheError, Result};
pub use storage::{
    Cache, CleanupTarget, DefaultShardHasher, EvictionListener, RemovalCause, ShardRouter,
    ShardedCache, Sweeper, SweeperState,
};

/// Version of stripecache
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
