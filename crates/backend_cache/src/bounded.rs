// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! A bounded, optionally time-limited, least-recently-used key-value cache.

use std::{
    fmt,
    num::NonZeroUsize,
    sync::{
        Arc, Weak,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use lru::LruCache;
use parking_lot::Mutex;
use tokio::time::Instant;

use crate::telemetry::{self, CacheActivity, CacheOperation};

/// Identity of one stored value, distinct for every insertion.
///
/// Used to remove a value only if it has not been replaced in the meantime.
pub(crate) type EntryId = u64;

static NEXT_ENTRY_ID: AtomicU64 = AtomicU64::new(1);

fn next_entry_id() -> EntryId {
    NEXT_ENTRY_ID.fetch_add(1, Ordering::Relaxed)
}

struct Slot<V> {
    value: V,
    id: EntryId,
    inserted_at: Instant,
}

struct Inner<V> {
    entries: LruCache<String, Slot<V>>,
    ttl: Option<Duration>,
}

/// A bounded key-value cache with least-recently-used eviction.
///
/// Both reads and writes count as use. When constructed with a time-to-live, entries older than
/// the limit read as absent and are dropped at that moment; there is no background sweep.
///
/// The cache is a cheap handle: clones share the same storage. Every operation takes the lock
/// for a short, non-blocking critical section, so "look up, else create and store" sequences
/// like [`BoundedCache::get_or_insert_with`] are atomic.
///
/// # Examples
///
/// ```
/// use backend_cache::BoundedCache;
///
/// let cache = BoundedCache::new("example", 2);
/// cache.set("a", 1);
/// cache.set("b", 2);
/// assert_eq!(cache.get("a"), Some(1));
///
/// // "b" is now the least recently used entry.
/// cache.set("c", 3);
/// assert_eq!(cache.get("b"), None);
/// assert_eq!(cache.len(), 2);
/// ```
pub struct BoundedCache<V> {
    name: &'static str,
    inner: Arc<Mutex<Inner<V>>>,
}

impl<V> Clone for BoundedCache<V> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<V> fmt::Debug for BoundedCache<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("BoundedCache")
            .field("name", &self.name)
            .field("len", &inner.entries.len())
            .field("max", &inner.entries.cap())
            .field("ttl", &inner.ttl)
            .finish()
    }
}

/// A handle to a [`BoundedCache`] that does not keep its storage alive.
///
/// Values stored in a cache hold this handle when they need to reach back into the cache that
/// stores them.
pub(crate) struct WeakBoundedCache<V> {
    name: &'static str,
    inner: Weak<Mutex<Inner<V>>>,
}

impl<V> Clone for WeakBoundedCache<V> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            inner: Weak::clone(&self.inner),
        }
    }
}

impl<V> fmt::Debug for WeakBoundedCache<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakBoundedCache")
            .field("name", &self.name)
            .field("alive", &(self.inner.strong_count() > 0))
            .finish()
    }
}

impl<V> WeakBoundedCache<V> {
    /// Returns the cache if it still exists.
    pub fn upgrade(&self) -> Option<BoundedCache<V>> {
        self.inner.upgrade().map(|inner| BoundedCache { name: self.name, inner })
    }
}

impl<V> BoundedCache<V> {
    /// Creates a cache holding at most `max` entries.
    ///
    /// `name` identifies the cache in log events. A `max` of zero is treated as one.
    #[must_use]
    pub fn new(name: &'static str, max: usize) -> Self {
        Self {
            name,
            inner: Arc::new(Mutex::new(Inner {
                entries: LruCache::new(NonZeroUsize::new(max).unwrap_or(NonZeroUsize::MIN)),
                ttl: None,
            })),
        }
    }

    /// Creates a cache holding at most `max` entries, each for at most `ttl`.
    #[must_use]
    pub fn with_ttl(name: &'static str, max: usize, ttl: Duration) -> Self {
        let cache = Self::new(name, max);
        cache.inner.lock().ttl = Some(ttl);
        cache
    }

    /// Name of the cache as it appears in log events.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Number of stored entries, including expired entries not read since they expired.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    /// Returns `true` if the cache holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().entries.is_empty()
    }

    /// Stores `value` under `key`, replacing any previous value and evicting the least
    /// recently used entry if the cache is full.
    pub fn set(&self, key: impl Into<String>, value: V) {
        let key = key.into();
        let mut inner = self.inner.lock();
        self.store(&mut inner, key, value, next_entry_id());
    }

    /// Removes the value stored under `key`, returning `true` if there was one.
    pub fn delete(&self, key: &str) -> bool {
        let removed = self.inner.lock().entries.pop(key).is_some();
        if removed {
            telemetry::record(self.name, CacheOperation::Invalidate, CacheActivity::Invalidated, Some(key));
        }
        removed
    }

    /// Removes every entry.
    pub fn clear(&self) {
        self.inner.lock().entries.clear();
        telemetry::record(self.name, CacheOperation::Clear, CacheActivity::Cleared, None);
    }

    /// Returns a handle that does not keep the storage alive.
    pub(crate) fn downgrade(&self) -> WeakBoundedCache<V> {
        WeakBoundedCache {
            name: self.name,
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Removes the value stored under `key` only if it is still the value inserted as `id`.
    ///
    /// Returns `true` if the value was removed. Does not count as use.
    pub(crate) fn remove_entry(&self, key: &str, id: EntryId) -> bool {
        let mut inner = self.inner.lock();
        if inner.entries.peek(key).is_some_and(|slot| slot.id == id) {
            inner.entries.pop(key);
            drop(inner);
            telemetry::record(self.name, CacheOperation::Invalidate, CacheActivity::Error, Some(key));
            return true;
        }
        false
    }

    fn store(&self, inner: &mut Inner<V>, key: String, value: V, id: EntryId) {
        let slot = Slot {
            value,
            id,
            inserted_at: Instant::now(),
        };

        if let Some((evicted, _)) = inner.entries.push(key.clone(), slot) {
            if evicted != key {
                telemetry::record(self.name, CacheOperation::Insert, CacheActivity::Evicted, Some(&evicted));
            }
        }
        telemetry::record(self.name, CacheOperation::Insert, CacheActivity::Inserted, Some(&key));
    }
}

impl<V: Clone> BoundedCache<V> {
    /// Returns the value stored under `key`, marking it as recently used.
    ///
    /// An entry older than the time-to-live is removed and reads as absent.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<V> {
        let mut inner = self.inner.lock();
        self.lookup(&mut inner, key)
    }

    /// Returns the value stored under `key`, or stores and returns the value built by `make`.
    ///
    /// `make` receives the identity of the new entry and runs under the cache lock, so it must
    /// not block; it is typically used to store a not-yet-started future.
    pub(crate) fn get_or_insert_with(&self, key: &str, make: impl FnOnce(EntryId) -> V) -> V {
        self.get_or_refresh_with(key, |_| true, make)
    }

    /// Like [`get_or_insert_with`](Self::get_or_insert_with), but also replaces a stored value
    /// that `is_fresh` rejects.
    pub(crate) fn get_or_refresh_with(&self, key: &str, is_fresh: impl FnOnce(&V) -> bool, make: impl FnOnce(EntryId) -> V) -> V {
        let mut inner = self.inner.lock();
        if let Some(value) = self.lookup(&mut inner, key) {
            if is_fresh(&value) {
                return value;
            }
        }

        let id = next_entry_id();
        let value = make(id);
        self.store(&mut inner, key.to_string(), value.clone(), id);
        value
    }

    /// Replaces the value under `key` with the one built by `make` from the current value.
    pub(crate) fn replace_with(&self, key: &str, make: impl FnOnce(Option<V>, EntryId) -> V) -> V {
        let mut inner = self.inner.lock();
        let current = self.lookup(&mut inner, key);
        let id = next_entry_id();
        let value = make(current, id);
        self.store(&mut inner, key.to_string(), value.clone(), id);
        value
    }

    /// Stores `value` under `key` unless a live value is already stored there.
    ///
    /// Returns `true` if the value was stored.
    pub(crate) fn insert_if_absent(&self, key: &str, value: V) -> bool {
        let mut inner = self.inner.lock();
        if self.lookup(&mut inner, key).is_some() {
            return false;
        }
        self.store(&mut inner, key.to_string(), value, next_entry_id());
        true
    }

    fn lookup(&self, inner: &mut Inner<V>, key: &str) -> Option<V> {
        let ttl = inner.ttl;
        let Some(slot) = inner.entries.get(key) else {
            telemetry::record(self.name, CacheOperation::Get, CacheActivity::Miss, Some(key));
            return None;
        };

        if ttl.is_some_and(|ttl| slot.inserted_at.elapsed() >= ttl) {
            inner.entries.pop(key);
            telemetry::record(self.name, CacheOperation::Get, CacheActivity::Expired, Some(key));
            return None;
        }

        let value = slot.value.clone();
        telemetry::record(self.name, CacheOperation::Get, CacheActivity::Hit, Some(key));
        Some(value)
    }
}
