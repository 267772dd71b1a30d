// src/cache/lru.rs
// =============================================================================
// An in-memory cache bounded by total body bytes, not by entry count.
//
// How it works:
// - Every get/set stamps the entry with a fresh "tick" (a counter)
// - `order` maps tick -> key, so the smallest tick is always the least
//   recently used entry
// - When a new entry would push us over the byte ceiling, we pop the
//   smallest ticks until it fits
// - Expired entries are only noticed when someone asks for them (lazy expiry)
//
// Concurrency:
// - One std::sync::Mutex around the whole thing
// - It is never held across an .await, so it never blocks the runtime
// - Two requests missing on the same key may both fetch and both store;
//   the last write wins, which is fine because both fetched the same file
//
// Rust concepts:
// - Arc<T>: Shared read-only access to an entry after it's stored
// - BTreeMap: Sorted map, pop_first() gives the oldest tick
// - Mutex: Interior mutability behind a shared reference
// =============================================================================

use super::entry::CacheEntry;
use crate::locator::CacheKey;
use chrono::{DateTime, Duration, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info};

// The process-wide response cache
//
// Created once in main and handed to the server; never reset.
pub struct ExpiringCache {
    capacity: usize,
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    slots: HashMap<CacheKey, Slot>,
    order: BTreeMap<u64, CacheKey>,
    weight: usize,
    tick: u64,
}

struct Slot {
    entry: Arc<CacheEntry>,
    last_access: u64,
}

impl ExpiringCache {
    // Creates an empty cache that holds at most `capacity` body bytes
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Looks up a fresh entry. Expired entries are dropped and reported as absent.
    pub fn get(&self, key: &CacheKey) -> Option<Arc<CacheEntry>> {
        self.get_at(key, Utc::now())
    }

    // Stores `entry` under `key`, expiring it after `ttl` (None = never).
    //
    // Returns false when the entry is bigger than the whole cache; it is then
    // not stored at all.
    pub fn set(&self, key: CacheKey, entry: CacheEntry, ttl: Option<Duration>) -> bool {
        self.set_at(key, entry, ttl, Utc::now())
    }

    pub(crate) fn get_at(&self, key: &CacheKey, now: DateTime<Utc>) -> Option<Arc<CacheEntry>> {
        let mut inner = self.lock();

        let expired = inner.slots.get(key)?.entry.is_expired_at(now);
        if expired {
            inner.remove(key);
            debug!(component = "cache", key = %key, "dropped expired entry");
            return None;
        }

        let tick = inner.next_tick();
        let slot = inner.slots.get_mut(key)?;
        let previous = std::mem::replace(&mut slot.last_access, tick);
        let entry = Arc::clone(&slot.entry);
        inner.order.remove(&previous);
        inner.order.insert(tick, key.clone());

        Some(entry)
    }

    pub(crate) fn set_at(
        &self,
        key: CacheKey,
        mut entry: CacheEntry,
        ttl: Option<Duration>,
        now: DateTime<Utc>,
    ) -> bool {
        let weight = entry.weight();
        if weight > self.capacity {
            debug!(
                component = "cache",
                key = %key,
                weight,
                capacity = self.capacity,
                "entry larger than the cache, not storing"
            );
            return false;
        }

        entry.expires_at = ttl.map(|ttl| expiry(now, ttl));

        let mut inner = self.lock();
        inner.remove(&key);

        while inner.weight + weight > self.capacity {
            match inner.pop_oldest() {
                Some(evicted) => {
                    info!(component = "cache", key = %evicted, reason = "capacity", "evicted entry");
                }
                None => break,
            }
        }

        let tick = inner.next_tick();
        inner.order.insert(tick, key.clone());
        inner.weight += weight;
        inner.slots.insert(
            key,
            Slot {
                entry: Arc::new(entry),
                last_access: tick,
            },
        );

        true
    }

    /// Number of stored entries (expired ones included until they're read)
    pub fn len(&self) -> usize {
        self.lock().slots.len()
    }

    /// Total body bytes currently stored
    pub fn weight(&self) -> usize {
        self.lock().weight
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // A panic while holding the lock can't leave Inner half-updated in a
        // way that matters here, so keep serving
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Inner {
    fn next_tick(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }

    fn remove(&mut self, key: &CacheKey) -> Option<Slot> {
        let slot = self.slots.remove(key)?;
        self.order.remove(&slot.last_access);
        self.weight -= slot.entry.weight();
        Some(slot)
    }

    fn pop_oldest(&mut self) -> Option<CacheKey> {
        let (_, key) = self.order.pop_first()?;
        if let Some(slot) = self.slots.remove(&key) {
            self.weight -= slot.entry.weight();
        }
        Some(key)
    }
}

fn expiry(now: DateTime<Utc>, ttl: Duration) -> DateTime<Utc> {
    now.checked_add_signed(ttl).unwrap_or(if ttl < Duration::zero() {
        DateTime::<Utc>::MIN_UTC
    } else {
        DateTime::<Utc>::MAX_UTC
    })
}
