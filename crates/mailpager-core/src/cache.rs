//! Bounded LRU caches for id lists and message batches.
//!
//! [`LruCache`] is the plain, unsynchronized structure. [`SharedCache`]
//! wraps it for use from concurrent requests: lookups are serialized by a
//! mutex and misses for the same key are collapsed so only one caller goes
//! to the server while the others wait for its result.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::Mutex as AsyncMutex;
use tracing::debug;

/// Fixed-capacity map with least-recently-used eviction.
pub struct LruCache<V> {
    entries: lru::LruCache<String, V>,
}

impl<V> LruCache<V> {
    /// Creates a cache holding at most `capacity` entries.
    #[must_use]
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            entries: lru::LruCache::new(capacity),
        }
    }

    /// Returns the value for `key` and marks it most recently used.
    pub fn get(&mut self, key: &str) -> Option<&V> {
        self.entries.get(key)
    }

    /// Inserts or overwrites `key` and marks it most recently used.
    ///
    /// Returns the key that was evicted to make room, if any.
    pub fn put(&mut self, key: String, value: V) -> Option<String> {
        let evicted = if self.entries.contains(&key) || self.entries.len() < self.capacity() {
            None
        } else {
            self.entries.peek_lru().map(|(lru_key, _)| lru_key.clone())
        };
        self.entries.put(key, value);
        evicted
    }

    /// Returns true if `key` is cached. Does not touch recency.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains(key)
    }

    /// Number of cached entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Maximum number of entries.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.entries.cap().get()
    }

    /// Keys from most to least recently used.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(key, _)| key.as_str())
    }
}

impl<V> fmt::Debug for LruCache<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LruCache")
            .field("len", &self.len())
            .field("capacity", &self.capacity())
            .finish()
    }
}

/// How a [`SharedCache::get_or_load`] call was answered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup<T> {
    /// The value was already cached, possibly filled by a concurrent
    /// caller while this one waited.
    Hit(T),
    /// This caller ran the loader.
    Loaded(T),
}

impl<T> Lookup<T> {
    /// Returns true if the loader ran.
    #[must_use]
    pub const fn is_loaded(&self) -> bool {
        matches!(self, Self::Loaded(_))
    }

    /// Unwraps the value.
    pub fn into_inner(self) -> T {
        match self {
            Self::Hit(value) | Self::Loaded(value) => value,
        }
    }
}

/// Process-wide cache of shared slices with single-flight loading.
///
/// Empty slices are never stored: "nothing found" must be asked again.
pub struct SharedCache<T> {
    name: &'static str,
    entries: Mutex<LruCache<Arc<[T]>>>,
    in_flight: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl<T> SharedCache<T> {
    /// Creates a named cache. The name only appears in logs.
    #[must_use]
    pub fn new(name: &'static str, capacity: NonZeroUsize) -> Self {
        Self {
            name,
            entries: Mutex::new(LruCache::new(capacity)),
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the cached slice for `key`, promoting it.
    pub fn get(&self, key: &str) -> Option<Arc<[T]>> {
        self.lock_entries().get(key).cloned()
    }

    /// Stores `value` under `key` unless it is empty.
    pub fn put(&self, key: &str, value: Arc<[T]>) {
        if value.is_empty() {
            return;
        }
        if let Some(evicted) = self.lock_entries().put(key.to_string(), value) {
            debug!(cache = self.name, %evicted, "Evicted least recently used entry");
        }
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        self.lock_entries().len()
    }

    /// Returns true if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.lock_entries().is_empty()
    }

    /// Returns the cached slice for `key`, or runs `load` to produce it.
    ///
    /// Concurrent callers missing on the same key queue behind the first
    /// one and re-check the cache once it finishes, so `load` runs once
    /// for all of them when it yields a non-empty slice. An empty slice or
    /// an error is returned to the caller that produced it and is not
    /// cached; the next waiter then loads for itself.
    ///
    /// # Errors
    ///
    /// Returns whatever `load` fails with.
    pub async fn get_or_load<F, Fut, E>(&self, key: &str, load: F) -> Result<Lookup<Arc<[T]>>, E>
    where
        T: Send + Sync,
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<Arc<[T]>, E>> + Send,
    {
        if let Some(value) = self.get(key) {
            return Ok(Lookup::Hit(value));
        }

        let flight = Flight::join(self, key);
        let _turn = Arc::clone(&flight.gate).lock_owned().await;

        if let Some(value) = self.get(key) {
            debug!(cache = self.name, key, "Filled by a concurrent load");
            return Ok(Lookup::Hit(value));
        }

        let value = load().await?;
        self.put(key, Arc::clone(&value));
        Ok(Lookup::Loaded(value))
    }

    fn lock_entries(&self) -> MutexGuard<'_, LruCache<Arc<[T]>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_in_flight(&self) -> MutexGuard<'_, HashMap<String, Arc<AsyncMutex<()>>>> {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T> fmt::Debug for SharedCache<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedCache")
            .field("name", &self.name)
            .field("entries", &*self.lock_entries())
            .finish_non_exhaustive()
    }
}

/// Membership in the queue of callers loading one key. Leaving the last
/// membership removes the key's gate.
struct Flight<'a, T> {
    cache: &'a SharedCache<T>,
    key: &'a str,
    gate: Arc<AsyncMutex<()>>,
}

impl<'a, T> Flight<'a, T> {
    fn join(cache: &'a SharedCache<T>, key: &'a str) -> Self {
        let gate = Arc::clone(cache.lock_in_flight().entry(key.to_string()).or_default());
        Self { cache, key, gate }
    }
}

impl<T> Drop for Flight<'_, T> {
    fn drop(&mut self) {
        let mut in_flight = self.cache.lock_in_flight();
        // One reference lives in the map, one here.
        if Arc::strong_count(&self.gate) <= 2 {
            in_flight.remove(self.key);
        }
    }
}
