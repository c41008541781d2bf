//! Cache entries and removal notifications.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Represents a stored value with optional expiry time.
///
/// Entries are never edited in place: every `set` builds a new one and
/// replaces whatever was stored under the key.
#[derive(Debug, Clone)]
pub struct Entry<V> {
    /// The actual value stored
    pub value: V,
    /// When this entry expires (None = never expires)
    pub expires_at: Option<Instant>,
}

impl<V> Entry<V> {
    /// Creates a new entry without expiry.
    pub fn new(value: V) -> Self {
        Self {
            value,
            expires_at: None,
        }
    }

    /// Creates an entry that expires `ttl` from now.
    ///
    /// A zero `ttl` means the entry never expires, and so does a `ttl` too
    /// large to be represented as an `Instant`.
    pub fn with_ttl(value: V, ttl: Duration) -> Self {
        if ttl.is_zero() {
            return Self::new(value);
        }

        Self {
            value,
            expires_at: Instant::now().checked_add(ttl),
        }
    }

    /// Checks if this entry has expired.
    #[inline]
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Instant::now())
    }

    /// Checks if this entry had expired at `now`.
    ///
    /// Sweeps take a single `now` up front and compare every entry against it.
    #[inline]
    pub fn is_expired_at(&self, now: Instant) -> bool {
        self.expires_at.map(|exp| now >= exp).unwrap_or(false)
    }

    /// Returns the remaining time to live, or None if no expiry.
    pub fn time_remaining(&self) -> Option<Duration> {
        self.expires_at
            .map(|exp| exp.saturating_duration_since(Instant::now()))
    }
}

/// Why an entry left the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemovalCause {
    /// Removed by a `delete` call.
    Explicit,
    /// Found expired, either lazily by `get` or by a sweep.
    Expired,
}

impl fmt::Display for RemovalCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RemovalCause::Explicit => write!(f, "explicit"),
            RemovalCause::Expired => write!(f, "expired"),
        }
    }
}

/// Callback invoked with each removed key, its value and the removal cause.
///
/// Listeners run after the entry has left the table and never while the
/// partition lock is held, so a listener may call back into the same cache.
/// Values that hold external resources (files, connections, nested caches)
/// can release them here.
pub type EvictionListener<K, V> = Arc<dyn Fn(K, V, RemovalCause) + Send + Sync>;
