//! In-memory extraction cache with TTL expiry and LRU eviction.

use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use indexmap::IndexMap;

use prospector_shared::{CacheConfig, InsightPayload, normalize_domain};

use crate::collaborators::ExtractionCache;

struct CacheEntry {
    payload: InsightPayload,
    inserted_at: Instant,
}

/// Domain-keyed insight cache shared by all enrichment tasks in a process.
///
/// Entries older than the TTL are never served. When full, the least
/// recently used entry is evicted. Map order is recency order: index 0 is
/// the LRU entry.
pub struct TtlLruCache {
    entries: Mutex<IndexMap<String, CacheEntry>>,
    ttl: Duration,
    max_entries: usize,
}

impl TtlLruCache {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            entries: Mutex::new(IndexMap::new()),
            ttl: config.ttl,
            max_entries: config.max_entries.max(1),
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // A panic while holding the lock cannot leave the map half-updated, so a
    // poisoned lock is still safe to use.
    fn lock(&self) -> MutexGuard<'_, IndexMap<String, CacheEntry>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn get_at(&self, website: &str, now: Instant) -> Option<InsightPayload> {
        let domain = normalize_domain(website);
        if domain.is_empty() {
            return None;
        }

        let mut entries = self.lock();
        let expired = {
            let entry = entries.get(&domain)?;
            now.saturating_duration_since(entry.inserted_at) >= self.ttl
        };

        let entry = entries.shift_remove(&domain)?;
        if expired {
            tracing::debug!(%domain, "cache entry expired");
            return None;
        }

        let payload = entry.payload.clone();
        entries.insert(domain, entry);
        Some(payload)
    }

    fn set_at(&self, website: &str, payload: InsightPayload, now: Instant) {
        let domain = normalize_domain(website);
        if domain.is_empty() {
            return;
        }

        let mut entries = self.lock();
        entries.shift_remove(&domain);

        while entries.len() >= self.max_entries {
            if let Some((evicted, _)) = entries.shift_remove_index(0) {
                tracing::debug!(domain = %evicted, "cache entry evicted");
            }
        }

        entries.insert(
            domain,
            CacheEntry {
                payload,
                inserted_at: now,
            },
        );
    }
}

impl ExtractionCache for TtlLruCache {
    fn get(&self, website: &str) -> Option<InsightPayload> {
        self.get_at(website, Instant::now())
    }

    fn set(&self, website: &str, payload: InsightPayload) {
        self.set_at(website, payload, Instant::now())
    }
}
