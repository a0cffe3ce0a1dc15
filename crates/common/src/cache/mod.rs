//! Bounded TTL cache
//!
//! Backs the two shared structures the SDK keeps warm between calls: the
//! session-key cache (whose entries live exactly as long as the remote
//! session) and the trusted verification-key set. Built on moka with
//! per-entry time-to-live and LRU-style bounded capacity.
//!
//! Population is idempotent: concurrent misses for the same key both write,
//! last write wins, and readers always observe a complete value.

use std::hash::Hash;
use std::sync::Arc;
use std::time::{Duration, Instant};

use moka::Expiry;

/// Default TTL applied when an entry is inserted without its own.
pub const DEFAULT_TTL_SECONDS: u64 = 300;

/// Default max capacity of a cache instance.
pub const DEFAULT_MAX_CAPACITY: u64 = 1000;

/// Cache configuration.
#[derive(Debug, Clone)]
pub struct TtlCacheConfig {
    /// Time-to-live for entries inserted without an explicit TTL.
    pub default_ttl: Duration,
    /// Maximum number of entries before eviction.
    pub max_capacity: u64,
}

impl Default for TtlCacheConfig {
    fn default() -> Self {
        Self {
            default_ttl: Duration::from_secs(DEFAULT_TTL_SECONDS),
            max_capacity: DEFAULT_MAX_CAPACITY,
        }
    }
}

impl TtlCacheConfig {
    /// Create config with a custom default TTL (useful for testing).
    #[must_use]
    pub fn with_ttl(default_ttl: Duration) -> Self {
        Self { default_ttl, max_capacity: DEFAULT_MAX_CAPACITY }
    }
}

#[derive(Clone)]
struct Entry<V> {
    value: V,
    ttl: Option<Duration>,
}

struct PerEntryExpiry {
    default_ttl: Duration,
}

impl<K, V> Expiry<K, Entry<V>> for PerEntryExpiry {
    fn expire_after_create(&self, _key: &K, entry: &Entry<V>, _created_at: Instant) -> Option<Duration> {
        Some(entry.ttl.unwrap_or(self.default_ttl))
    }
}

/// Bounded cache with per-entry TTL.
///
/// Cloning is cheap and shares the underlying store.
#[derive(Clone)]
pub struct TtlCache<K, V>
where
    K: Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    inner: moka::sync::Cache<K, Entry<V>>,
    config: Arc<TtlCacheConfig>,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Create a new cache with the given configuration.
    #[must_use]
    pub fn new(config: TtlCacheConfig) -> Self {
        let expiry = PerEntryExpiry { default_ttl: config.default_ttl };
        let inner = moka::sync::Cache::builder()
            .max_capacity(config.max_capacity)
            .expire_after(expiry)
            .build();

        Self { inner, config: Arc::new(config) }
    }

    /// Insert a value with the default TTL.
    pub fn insert(&self, key: K, value: V) {
        self.inner.insert(key, Entry { value, ttl: None });
    }

    /// Insert a value that expires after its own TTL.
    ///
    /// Used for session keys, whose lifetime is the remote `expiry - now`.
    pub fn insert_with_ttl(&self, key: K, value: V, ttl: Duration) {
        tracing::trace!(ttl = ?ttl, "cache entry inserted with explicit TTL");
        self.inner.insert(key, Entry { value, ttl: Some(ttl) });
    }

    /// Look up a live entry.
    pub fn get(&self, key: &K) -> Option<V> {
        self.inner.get(key).map(|entry| entry.value)
    }

    /// Drop a single entry.
    pub fn invalidate(&self, key: &K) {
        self.inner.invalidate(key);
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.inner.invalidate_all();
    }

    /// Number of live entries (runs pending eviction work first).
    pub fn entry_count(&self) -> u64 {
        self.inner.run_pending_tasks();
        self.inner.entry_count()
    }

    /// The configuration this cache was built with.
    pub fn config(&self) -> &TtlCacheConfig {
        &self.config
    }
}
