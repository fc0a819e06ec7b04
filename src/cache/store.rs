//! Response cache store with per-entry TTL and LFU eviction by url.
//!
//! # Responsibilities
//! - Serve fresh entries and count their lookups
//! - Drop expired entries when they are looked up
//! - Keep the number of distinct urls under the configured limit
//!
//! # Design Decisions
//! - One flat map keyed by (url, identity, language) plus a per-url index
//!   holding the aggregate lookup count, so LFU selection never walks entries
//! - A single mutex guards both maps: lookup counters and eviction can't race
//! - Expiry is checked lazily on lookup; there is no background sweeper
//! - Eviction only targets urls that have been looked up at least once;
//!   brand-new urls are never the victim

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::cache::options::CacheKey;
use crate::http::handler::Reply;
use crate::observability::metrics;

/// A stored response.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub expires_at: Instant,
    pub reply: Reply,
    pub lookups: u64,
}

/// A fresh entry returned by `lookup`, lookup count already incremented.
#[derive(Debug, Clone)]
pub struct CacheHit {
    pub reply: Reply,
    pub expires_at: Instant,
    pub lookups: u64,
}

#[derive(Debug)]
struct UrlStats {
    /// Order in which the url first entered the cache; breaks LFU ties.
    seq: u64,
    /// Sum of `lookups` over every entry under this url.
    lookups: u64,
    entries: usize,
}

#[derive(Debug, Default)]
struct Inner {
    entries: HashMap<CacheKey, CacheEntry>,
    urls: HashMap<String, UrlStats>,
    next_seq: u64,
}

impl Inner {
    /// Least-used url among those looked up at least once.
    fn evict_target(&self) -> Option<String> {
        self.urls
            .iter()
            .filter(|(_, stats)| stats.lookups > 0)
            .min_by_key(|(_, stats)| (stats.lookups, stats.seq))
            .map(|(url, _)| url.clone())
    }

    fn remove_url(&mut self, url: &str) -> usize {
        if self.urls.remove(url).is_none() {
            return 0;
        }
        let before = self.entries.len();
        self.entries.retain(|key, _| key.url != url);
        before - self.entries.len()
    }
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    expired: AtomicU64,
    evicted: AtomicU64,
    stored: AtomicU64,
}

/// Aggregate lookups for one url, as reported by `snapshot`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UrlUsage {
    pub url: String,
    pub lookups: u64,
    pub entries: usize,
}

/// Point-in-time view of the cache for the admin API.
#[derive(Debug, Clone, Serialize)]
pub struct CacheSnapshot {
    pub urls: usize,
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
    pub expired: u64,
    pub evicted: u64,
    pub stored: u64,
    /// Every url, least used first (the order eviction would follow).
    pub usage: Vec<UrlUsage>,
}

/// Process-wide response cache shared by all request tasks.
#[derive(Debug, Default)]
pub struct CacheStore {
    inner: Mutex<Inner>,
    counters: Counters,
}

impl CacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the entry for `key` if it is still fresh at `now`.
    ///
    /// An expired entry is removed and reported as a miss. The url itself
    /// stays indexed until the next insert prunes empty urls.
    pub fn lookup(&self, key: &CacheKey, now: Instant) -> Option<CacheHit> {
        let mut guard = self.inner.lock().expect("cache mutex poisoned");
        let inner = &mut *guard;

        let Some(entry) = inner.entries.get_mut(key) else {
            self.counters.misses.fetch_add(1, Ordering::Relaxed);
            metrics::record_cache_event("miss");
            return None;
        };

        if entry.expires_at > now {
            entry.lookups += 1;
            if let Some(stats) = inner.urls.get_mut(&key.url) {
                stats.lookups += 1;
            }
            self.counters.hits.fetch_add(1, Ordering::Relaxed);
            metrics::record_cache_event("hit");
            return Some(CacheHit {
                reply: entry.reply.clone(),
                expires_at: entry.expires_at,
                lookups: entry.lookups,
            });
        }

        let stale_lookups = entry.lookups;
        inner.entries.remove(key);
        if let Some(stats) = inner.urls.get_mut(&key.url) {
            stats.lookups -= stale_lookups;
            stats.entries -= 1;
        }
        self.counters.expired.fetch_add(1, Ordering::Relaxed);
        self.counters.misses.fetch_add(1, Ordering::Relaxed);
        metrics::record_cache_event("expired");
        tracing::debug!(url = %key.url, identity = %key.identity, "Cache entry expired");
        None
    }

    /// Store `reply` under `key` for `ttl`, then evict least-used urls while
    /// more than `limit` urls are cached. Returns the evicted urls.
    ///
    /// Overwriting an existing entry resets its lookup count.
    pub fn insert(&self, key: CacheKey, reply: Reply, ttl: Duration, limit: usize, now: Instant) -> Vec<String> {
        let mut guard = self.inner.lock().expect("cache mutex poisoned");
        let inner = &mut *guard;

        let next_seq = inner.next_seq;
        let stats = inner.urls.entry(key.url.clone()).or_insert(UrlStats {
            seq: next_seq,
            lookups: 0,
            entries: 0,
        });
        if stats.seq == next_seq {
            inner.next_seq += 1;
        }

        let entry = CacheEntry {
            expires_at: now + ttl,
            reply,
            lookups: 0,
        };
        match inner.entries.insert(key, entry) {
            Some(previous) => stats.lookups -= previous.lookups,
            None => stats.entries += 1,
        }
        self.counters.stored.fetch_add(1, Ordering::Relaxed);
        metrics::record_cache_event("stored");

        inner.urls.retain(|_, stats| stats.entries > 0);

        let mut evicted = Vec::new();
        while inner.urls.len() > limit {
            let Some(url) = inner.evict_target() else {
                break;
            };
            let removed = inner.remove_url(&url);
            tracing::debug!(url = %url, entries = removed, "Evicted least-used url from cache");
            self.counters.evicted.fetch_add(1, Ordering::Relaxed);
            metrics::record_cache_event("evicted");
            evicted.push(url);
        }

        metrics::record_cache_size(inner.urls.len());
        evicted
    }

    /// The url LFU eviction would remove next, if any url has been used.
    pub fn evict_target(&self) -> Option<String> {
        self.inner.lock().expect("cache mutex poisoned").evict_target()
    }

    /// Remove every entry under `url`. Returns how many entries went away.
    pub fn evict(&self, url: &str) -> usize {
        let mut inner = self.inner.lock().expect("cache mutex poisoned");
        let removed = inner.remove_url(url);
        metrics::record_cache_size(inner.urls.len());
        removed
    }

    /// Drop everything. Returns how many entries went away.
    pub fn clear(&self) -> usize {
        let mut inner = self.inner.lock().expect("cache mutex poisoned");
        let removed = inner.entries.len();
        inner.entries.clear();
        inner.urls.clear();
        metrics::record_cache_size(0);
        removed
    }

    /// Number of distinct urls indexed.
    pub fn url_count(&self) -> usize {
        self.inner.lock().expect("cache mutex poisoned").urls.len()
    }

    /// Number of stored entries across all urls.
    pub fn entry_count(&self) -> usize {
        self.inner.lock().expect("cache mutex poisoned").entries.len()
    }

    pub fn snapshot(&self) -> CacheSnapshot {
        let inner = self.inner.lock().expect("cache mutex poisoned");
        let mut ranked: Vec<(&String, &UrlStats)> = inner.urls.iter().collect();
        ranked.sort_by_key(|(_, stats)| (stats.lookups, stats.seq));

        CacheSnapshot {
            urls: inner.urls.len(),
            entries: inner.entries.len(),
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            expired: self.counters.expired.load(Ordering::Relaxed),
            evicted: self.counters.evicted.load(Ordering::Relaxed),
            stored: self.counters.stored.load(Ordering::Relaxed),
            usage: ranked
                .into_iter()
                .map(|(url, stats)| UrlUsage {
                    url: url.clone(),
                    lookups: stats.lookups,
                    entries: stats.entries,
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TTL: Duration = Duration::from_secs(4);

    fn key(url: &str) -> CacheKey {
        CacheKey::new(url, "public", "global")
    }

    fn hit(store: &CacheStore, url: &str, times: usize, now: Instant) {
        for _ in 0..times {
            assert!(store.lookup(&key(url), now).is_some(), "{} should be cached", url);
        }
    }

    #[test]
    fn test_insert_then_lookup_counts() {
        let store = CacheStore::new();
        let now = Instant::now();
        store.insert(key("/cache"), Reply::text("payload"), TTL, 8, now);

        let first = store.lookup(&key("/cache"), now + Duration::from_secs(1)).unwrap();
        assert_eq!(first.reply.body, "payload");
        assert_eq!(first.lookups, 1);
        assert_eq!(first.expires_at, now + TTL);

        let second = store.lookup(&key("/cache"), now + Duration::from_secs(2)).unwrap();
        assert_eq!(second.lookups, 2);
    }

    #[test]
    fn test_levels_are_independent() {
        let store = CacheStore::new();
        let now = Instant::now();
        store.insert(CacheKey::new("/feed", "u-1", "en"), Reply::text("en"), TTL, 8, now);

        assert!(store.lookup(&CacheKey::new("/feed", "u-1", "fr"), now).is_none());
        assert!(store.lookup(&CacheKey::new("/feed", "public", "en"), now).is_none());
        assert!(store.lookup(&CacheKey::new("/other", "u-1", "en"), now).is_none());
        assert!(store.lookup(&CacheKey::new("/feed", "u-1", "en"), now).is_some());
    }

    #[test]
    fn test_expired_entry_is_removed() {
        let store = CacheStore::new();
        let now = Instant::now();
        store.insert(key("/cache"), Reply::text("payload"), TTL, 8, now);
        hit(&store, "/cache", 3, now);

        // expires_at == now + ttl is no longer fresh.
        assert!(store.lookup(&key("/cache"), now + TTL).is_none());
        assert_eq!(store.entry_count(), 0);

        let snapshot = store.snapshot();
        assert_eq!(snapshot.expired, 1);
        assert_eq!(snapshot.hits, 3);
        // Url stays indexed with its lookups withdrawn until the next insert.
        assert_eq!(
            snapshot.usage,
            vec![UrlUsage {
                url: "/cache".into(),
                lookups: 0,
                entries: 0
            }]
        );

        store.insert(key("/next"), Reply::text("n"), TTL, 8, now + TTL);
        assert_eq!(store.url_count(), 1);
    }

    #[test]
    fn test_overwrite_resets_lookups() {
        let store = CacheStore::new();
        let now = Instant::now();
        store.insert(key("/a"), Reply::text("v1"), TTL, 8, now);
        hit(&store, "/a", 5, now);

        store.insert(key("/a"), Reply::text("v2"), TTL, 8, now);
        let again = store.lookup(&key("/a"), now).unwrap();
        assert_eq!(again.reply.body, "v2");
        assert_eq!(again.lookups, 1);
        assert_eq!(store.snapshot().usage[0].lookups, 1);
    }

    #[test]
    fn test_evict_target_picks_least_used() {
        let store = CacheStore::new();
        let now = Instant::now();
        for url in ["/seven", "/four", "/two"] {
            store.insert(key(url), Reply::text(url), TTL, 8, now);
        }
        hit(&store, "/seven", 7, now);
        hit(&store, "/four", 4, now);
        hit(&store, "/two", 2, now);

        assert_eq!(store.evict_target().as_deref(), Some("/two"));
    }

    #[test]
    fn test_evict_target_sums_identities_and_languages() {
        let store = CacheStore::new();
        let now = Instant::now();
        store.insert(CacheKey::new("/a", "u-1", "en"), Reply::text("a"), TTL, 8, now);
        store.insert(CacheKey::new("/a", "u-2", "fr"), Reply::text("a"), TTL, 8, now);
        store.insert(key("/b"), Reply::text("b"), TTL, 8, now);

        store.lookup(&CacheKey::new("/a", "u-1", "en"), now);
        store.lookup(&CacheKey::new("/a", "u-2", "fr"), now);
        hit(&store, "/b", 3, now);
        assert_eq!(store.evict_target().as_deref(), Some("/a"));

        store.lookup(&CacheKey::new("/a", "u-2", "fr"), now);
        store.lookup(&CacheKey::new("/a", "u-2", "fr"), now);
        // 4 vs 3 now.
        assert_eq!(store.evict_target().as_deref(), Some("/b"));
    }

    #[test]
    fn test_evict_target_none_when_untouched() {
        let store = CacheStore::new();
        let now = Instant::now();
        for url in ["/a", "/b", "/c"] {
            store.insert(key(url), Reply::text(url), TTL, 8, now);
        }
        assert_eq!(store.evict_target(), None);

        // Zero-lookup urls are skipped even when another url is in use.
        hit(&store, "/c", 1, now);
        assert_eq!(store.evict_target().as_deref(), Some("/c"));
    }

    #[test]
    fn test_ties_go_to_oldest_url() {
        let store = CacheStore::new();
        let now = Instant::now();
        for url in ["/first", "/second"] {
            store.insert(key(url), Reply::text(url), TTL, 8, now);
        }
        hit(&store, "/second", 2, now);
        hit(&store, "/first", 2, now);
        assert_eq!(store.evict_target().as_deref(), Some("/first"));
    }

    #[test]
    fn test_insert_over_limit_evicts() {
        let store = CacheStore::new();
        let now = Instant::now();
        store.insert(key("/a"), Reply::text("a"), TTL, 2, now);
        store.insert(key("/b"), Reply::text("b"), TTL, 2, now);
        hit(&store, "/a", 3, now);
        hit(&store, "/b", 1, now);

        let evicted = store.insert(key("/c"), Reply::text("c"), TTL, 2, now);
        assert_eq!(evicted, vec!["/b".to_string()]);
        assert_eq!(store.url_count(), 2);
        assert!(store.lookup(&key("/b"), now).is_none());
        assert!(store.lookup(&key("/c"), now).is_some());
        assert_eq!(store.snapshot().evicted, 1);
    }

    #[test]
    fn test_insert_over_limit_without_target_keeps_everything() {
        let store = CacheStore::new();
        let now = Instant::now();
        for url in ["/a", "/b", "/c"] {
            let evicted = store.insert(key(url), Reply::text(url), TTL, 2, now);
            assert!(evicted.is_empty());
        }
        assert_eq!(store.url_count(), 3);
    }

    #[test]
    fn test_evict_removes_whole_url() {
        let store = CacheStore::new();
        let now = Instant::now();
        store.insert(CacheKey::new("/a", "u-1", "en"), Reply::text("1"), TTL, 8, now);
        store.insert(CacheKey::new("/a", "u-2", "en"), Reply::text("2"), TTL, 8, now);
        store.insert(key("/b"), Reply::text("b"), TTL, 8, now);

        assert_eq!(store.evict("/a"), 2);
        assert_eq!(store.evict("/a"), 0);
        assert_eq!(store.entry_count(), 1);

        store.clear();
        assert_eq!(store.url_count(), 0);
    }

    #[test]
    fn test_parallel_lookups_are_all_counted() {
        let store = CacheStore::new();
        let now = Instant::now();
        let alice = CacheKey::new("/feed", "alice", "global");
        store.insert(key("/feed"), Reply::text("public"), TTL, 8, now);
        store.insert(alice.clone(), Reply::text("alice"), TTL, 8, now);

        std::thread::scope(|s| {
            for t in 0..8 {
                let store = &store;
                let alice = &alice;
                s.spawn(move || {
                    for _ in 0..250 {
                        let key = if t % 2 == 0 { key("/feed") } else { alice.clone() };
                        assert!(store.lookup(&key, now).is_some());
                    }
                });
            }
        });

        let snap = store.snapshot();
        assert_eq!(snap.hits, 2000);
        assert_eq!(snap.usage.len(), 1);
        assert_eq!(snap.usage[0].lookups, 2000);
        assert_eq!(store.lookup(&key("/feed"), now).unwrap().lookups, 1001);
    }

    #[test]
    fn test_parallel_inserts_keep_index_consistent() {
        let store = CacheStore::new();
        let now = Instant::now();
        let limit = 4;

        std::thread::scope(|s| {
            for t in 0..8 {
                let store = &store;
                s.spawn(move || {
                    for i in 0..50 {
                        let url = format!("/t{}/{}", t, i);
                        store.insert(key(&url), Reply::text("x"), TTL, limit, now);
                        store.lookup(&key(&url), now);
                    }
                });
            }
        });

        let snap = store.snapshot();
        assert_eq!(snap.stored, 400);
        assert_eq!(snap.usage.iter().map(|u| u.entries).sum::<usize>(), snap.entries);
        assert_eq!(snap.urls, snap.usage.len());
        // At most one not-yet-looked-up url per thread can sit above the limit.
        assert!(snap.urls <= limit + 8, "{} urls left", snap.urls);
        assert_eq!(snap.evicted as usize + snap.urls, 400);
    }
}
