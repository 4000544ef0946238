//! Process-local TTL cache for assembled recommendation payloads.
//!
//! One instance per server process, created at startup and handed to every
//! request handler through the shared state. Entries go stale by TTL;
//! crossing the size limit triggers a batch compaction that keeps the
//! newest half by insertion time. This is not shared storage: each process
//! has its own cache and its own counters.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::models::RecommendationResponse;

/// Composite key: one cache slot per (user, count, policy) combination.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub user_id: String,
    pub count: usize,
    pub mine_only: bool,
}

/// Size snapshot and lifetime counters for the status endpoint.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct CacheStats {
    pub size: usize,
    pub hits: u64,
    pub misses: u64,
}

struct CacheEntry {
    payload: RecommendationResponse,
    inserted_at: Instant,
}

struct CacheInner {
    entries: HashMap<CacheKey, CacheEntry>,
    hits: u64,
    misses: u64,
}

/// Keyed TTL cache in front of the recommendation pipeline.
///
/// All access goes through one coarse mutex. The cache is bounded and even
/// the eviction sort is O(size log size), so the critical section stays
/// short. Two requests missing the same key concurrently may both run the
/// pipeline and both insert; the last writer wins, which is harmless.
pub struct RecommendationCache {
    ttl: Duration,
    max_entries: usize,
    inner: Mutex<CacheInner>,
}

impl RecommendationCache {
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            ttl,
            max_entries,
            inner: Mutex::new(CacheInner {
                entries: HashMap::new(),
                hits: 0,
                misses: 0,
            }),
        }
    }

    /// Returns the cached payload when present and fresh.
    ///
    /// An expired entry counts as a miss but is left in place; it gets
    /// overwritten by the next insert for the key or dropped at the next
    /// compaction.
    pub fn get(&self, key: &CacheKey) -> Option<RecommendationResponse> {
        let mut inner = self.lock();
        let fresh = inner
            .entries
            .get(key)
            .filter(|entry| entry.inserted_at.elapsed() < self.ttl)
            .map(|entry| entry.payload.clone());

        match fresh {
            Some(payload) => {
                inner.hits += 1;
                Some(payload)
            }
            None => {
                inner.misses += 1;
                None
            }
        }
    }

    /// Stores a payload, compacting synchronously when the insert pushes
    /// the cache past its capacity.
    pub fn insert(&self, key: CacheKey, payload: RecommendationResponse) {
        let mut inner = self.lock();
        inner.entries.insert(
            key,
            CacheEntry {
                payload,
                inserted_at: Instant::now(),
            },
        );

        if inner.entries.len() > self.max_entries {
            let keep = self.max_entries / 2;
            tracing::debug!(
                size = inner.entries.len(),
                keep,
                "Compacting recommendation cache"
            );
            compact(&mut inner.entries, keep);
        }
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.lock();
        CacheStats {
            size: inner.entries.len(),
            hits: inner.hits,
            misses: inner.misses,
        }
    }

    fn lock(&self) -> MutexGuard<'_, CacheInner> {
        // a poisoned lock still holds a usable map
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

/// Batch compaction: retain the `keep` most recently inserted entries.
fn compact(entries: &mut HashMap<CacheKey, CacheEntry>, keep: usize) {
    let mut by_age: Vec<(CacheKey, CacheEntry)> = entries.drain().collect();
    by_age.sort_by_key(|(_, entry)| entry.inserted_at);
    let newest = by_age.split_off(by_age.len() - keep.min(by_age.len()));
    entries.extend(newest);
}
