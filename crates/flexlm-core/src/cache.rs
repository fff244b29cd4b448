//! Time-expiring lookup cache.
//!
//! Fronts slow or unreliable lookups (directory queries) so that every poll
//! cycle does not hit the backend for every user. A lookup never fails from
//! the caller's point of view: resolver errors are replaced by the cache's
//! fallback value, which is cached for the same TTL as a real answer.

use std::collections::HashMap;
use std::fmt::Display;
use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tracing::debug;

/// Default time-to-live for cached entries (5 minutes).
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    inserted_at: Instant,
}

impl<V> CacheEntry<V> {
    fn is_live(&self, now: Instant, ttl: Duration) -> bool {
        now.saturating_duration_since(self.inserted_at) < ttl
    }
}

/// String-keyed cache with TTL expiry and a fallback value.
///
/// A single mutex guards the map. It is never held while a resolver runs.
#[derive(Debug)]
pub struct LookupCache<V> {
    entries: Mutex<HashMap<String, CacheEntry<V>>>,
    ttl: Duration,
    fallback: V,
    enabled: bool,
}

impl<V: Clone> LookupCache<V> {
    /// Creates an enabled cache.
    pub fn new(ttl: Duration, fallback: V) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
            fallback,
            enabled: true,
        }
    }

    /// Creates a cache whose backing subsystem is unavailable.
    ///
    /// Every lookup returns the fallback without calling the resolver.
    pub fn disabled(fallback: V) -> Self {
        Self {
            enabled: false,
            ..Self::new(DEFAULT_TTL, fallback)
        }
    }

    /// Whether lookups reach the resolver at all.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Returns the cached value for `key` or resolves and caches it.
    pub fn get<F, E>(&self, key: &str, resolver: F) -> V
    where
        F: FnOnce(&str) -> Result<V, E>,
        E: Display,
    {
        self.get_at(key, Instant::now(), resolver)
    }

    /// Same as [`get`](Self::get) with an explicit clock reading.
    pub fn get_at<F, E>(&self, key: &str, now: Instant, resolver: F) -> V
    where
        F: FnOnce(&str) -> Result<V, E>,
        E: Display,
    {
        if !self.enabled {
            return self.fallback.clone();
        }
        if let Some(value) = self.live_value(key, now) {
            return value;
        }
        let value = self.or_fallback(key, resolver(key));
        self.insert_at(key, value.clone(), now);
        value
    }

    /// Async variant of [`get`](Self::get).
    ///
    /// Concurrent misses for the same key may each call the resolver; the last
    /// answer wins.
    pub async fn get_async<F, Fut, E>(&self, key: &str, resolver: F) -> V
    where
        F: FnOnce(String) -> Fut,
        Fut: Future<Output = Result<V, E>>,
        E: Display,
    {
        if !self.enabled {
            return self.fallback.clone();
        }
        if let Some(value) = self.live_value(key, Instant::now()) {
            return value;
        }
        let value = self.or_fallback(key, resolver(key.to_string()).await);
        self.insert_at(key, value.clone(), Instant::now());
        value
    }

    /// Returns a live cached value without resolving.
    pub fn peek(&self, key: &str) -> Option<V> {
        self.live_value(key, Instant::now())
    }

    /// Drops every entry.
    pub fn clear(&self) {
        self.lock().clear();
        debug!("lookup cache cleared");
    }

    /// Drops entries older than the TTL. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        self.purge_expired_at(Instant::now())
    }

    pub fn purge_expired_at(&self, now: Instant) -> usize {
        let ttl = self.ttl;
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|_, entry| entry.is_live(now, ttl));
        before - entries.len()
    }

    /// Number of stored entries, including expired ones not yet purged.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn live_value(&self, key: &str, now: Instant) -> Option<V> {
        self.lock()
            .get(key)
            .filter(|entry| entry.is_live(now, self.ttl))
            .map(|entry| entry.value.clone())
    }

    fn insert_at(&self, key: &str, value: V, now: Instant) {
        self.lock().insert(
            key.to_string(),
            CacheEntry {
                value,
                inserted_at: now,
            },
        );
    }

    fn or_fallback<E: Display>(&self, key: &str, result: Result<V, E>) -> V {
        match result {
            Ok(value) => value,
            Err(e) => {
                debug!(key, error = %e, "lookup failed, caching fallback");
                self.fallback.clone()
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, CacheEntry<V>>> {
        // Entries are plain values; a panic mid-insert cannot leave them torn.
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
