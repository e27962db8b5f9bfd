//! In-process decision cache.
//!
//! Entries carry their own absolute expiry; an entry is served only while
//! its expiry lies strictly in the future and is evicted the first time it
//! is observed expired. The backing `moka` cache bounds the entry count and
//! is safe to share between concurrent requests. Clones share storage.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use moka::sync::Cache;
use serde::Serialize;
use tracing::debug;

use crate::types::Decision;

/// Default time-to-live of a cached decision.
pub const DEFAULT_TTL: Duration = Duration::from_secs(30);

/// Default maximum number of cached decisions.
pub const DEFAULT_CAPACITY: u64 = 10_000;

#[derive(Debug, Clone)]
struct CacheEntry {
    decision: Decision,
    /// `None` when `now + ttl` is not representable.
    expires_at: Option<Instant>,
}

impl CacheEntry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| at > now)
    }
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

/// Snapshot of cache counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Entries removed because they were found expired.
    pub evictions: u64,
    pub entries: u64,
}

/// Time-bounded cache of authorization decisions keyed by
/// [`cache_key`](crate::key::cache_key).
#[derive(Clone)]
pub struct DecisionCache {
    entries: Cache<String, CacheEntry>,
    default_ttl: Duration,
    counters: Arc<Counters>,
}

impl std::fmt::Debug for DecisionCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecisionCache")
            .field("default_ttl", &self.default_ttl)
            .field("entries", &self.entries.entry_count())
            .finish()
    }
}

impl Default for DecisionCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY, DEFAULT_TTL)
    }
}

impl DecisionCache {
    pub fn new(capacity: u64, default_ttl: Duration) -> Self {
        Self {
            entries: Cache::builder().max_capacity(capacity).build(),
            default_ttl,
            counters: Arc::new(Counters::default()),
        }
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Cached decision for `key`, if present and not expired.
    pub fn get(&self, key: &str) -> Option<Decision> {
        self.get_at(key, Instant::now())
    }

    /// Like [`get`](Self::get) but against an explicit clock reading.
    pub fn get_at(&self, key: &str, now: Instant) -> Option<Decision> {
        match self.entries.get(key) {
            Some(entry) if entry.is_live(now) => {
                self.counters.hits.fetch_add(1, Ordering::Relaxed);
                Some(entry.decision)
            }
            Some(_) => {
                debug!(key, "evicting expired decision");
                self.entries.invalidate(key);
                self.counters.evictions.fetch_add(1, Ordering::Relaxed);
                self.counters.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
            None => {
                self.counters.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Store `decision` under `key` until `now + ttl`, replacing any previous entry.
    pub fn put(&self, key: impl Into<String>, decision: Decision, ttl: Duration) {
        self.put_at(key, decision, ttl, Instant::now());
    }

    /// Like [`put`](Self::put) but against an explicit clock reading.
    pub fn put_at(&self, key: impl Into<String>, decision: Decision, ttl: Duration, now: Instant) {
        let entry = CacheEntry {
            decision,
            expires_at: now.checked_add(ttl),
        };
        self.entries.insert(key.into(), entry);
    }

    /// Store with the cache's default TTL.
    pub fn insert(&self, key: impl Into<String>, decision: Decision) {
        self.put(key, decision, self.default_ttl);
    }

    /// Drop a single entry.
    pub fn invalidate(&self, key: &str) {
        self.entries.invalidate(key);
    }

    /// Remove every entry whose expiry has passed. Returns the number removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let expired: Vec<Arc<String>> = self
            .entries
            .iter()
            .filter(|(_, entry)| !entry.is_live(now))
            .map(|(key, _)| key)
            .collect();

        for key in &expired {
            self.entries.invalidate(key.as_str());
        }
        self.counters
            .evictions
            .fetch_add(expired.len() as u64, Ordering::Relaxed);
        expired.len()
    }

    /// Remove all entries unconditionally.
    pub fn clear(&self) {
        self.entries.invalidate_all();
        self.entries.run_pending_tasks();
    }

    /// Number of stored entries, expired ones included until observed.
    pub fn len(&self) -> u64 {
        self.entries.run_pending_tasks();
        self.entries.entry_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            evictions: self.counters.evictions.load(Ordering::Relaxed),
            entries: self.len(),
        }
    }
}
