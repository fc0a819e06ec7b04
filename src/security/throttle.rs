//! Fixed-window request throttle.
//!
//! # Responsibilities
//! - Count hits per (client criteria, route pattern, method)
//! - Reset a counter once its window has expired
//! - Decide admission against the effective limit
//!
//! # Design Decisions
//! - Fixed window, not sliding: an expired window restarts at zero
//! - `DashMap` entry locking makes each increment atomic per key
//! - Expiry is checked when the key is hit again; no background sweeper
//! - `regrow` is carried through options but does not alter the reset

use std::time::{Duration, Instant};

use dashmap::DashMap;
use serde::Serialize;

use crate::config::ThrottleConfig;
use crate::routing::Route;

/// Effective throttle settings for one route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThrottleOptions {
    pub enabled: bool,
    pub ttl: Duration,
    pub limit: u64,
    pub regrow: bool,
}

impl ThrottleOptions {
    /// Whether a request whose hit count is `entry.hits` may proceed.
    pub fn admits(&self, entry: &ThrottleEntry) -> bool {
        entry.hits <= self.limit
    }
}

/// Route override over process defaults; enabled only when both ttl and
/// limit end up positive.
pub fn throttle_options(route: &Route, defaults: &ThrottleConfig) -> ThrottleOptions {
    let ttl = route.throttle.ttl.unwrap_or_else(|| defaults.ttl());
    let limit = route.throttle.limit.unwrap_or(defaults.limit);
    let regrow = route.throttle.regrow.unwrap_or(defaults.regrow);

    ThrottleOptions {
        enabled: !ttl.is_zero() && limit > 0,
        ttl,
        limit,
        regrow,
    }
}

/// Counter location: who, where, how.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ThrottleKey {
    /// Client discriminator, e.g. the remote IP.
    pub criteria: String,
    /// Matched route pattern, e.g. `/user/:id`.
    pub endpoint: String,
    pub method: String,
}

impl ThrottleKey {
    pub fn new(criteria: impl Into<String>, endpoint: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            criteria: criteria.into(),
            endpoint: endpoint.into(),
            method: method.into(),
        }
    }
}

/// Hit counter for one window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThrottleEntry {
    pub expires_at: Instant,
    pub hits: u64,
}

impl ThrottleEntry {
    /// Time left in the window, rounded up to whole seconds for `Retry-After`.
    pub fn retry_after_secs(&self, now: Instant) -> u64 {
        let left = self.expires_at.saturating_duration_since(now);
        let secs = left.as_secs();
        if left.subsec_nanos() > 0 {
            secs + 1
        } else {
            secs
        }
    }
}

/// Point-in-time view for the admin API.
#[derive(Debug, Clone, Serialize)]
pub struct ThrottleSnapshot {
    /// Keys currently tracked (including stale ones not yet hit again).
    pub tracked: usize,
    /// Keys whose window is still open.
    pub active: usize,
}

/// Process-wide throttle counters shared by all request tasks.
#[derive(Debug, Default)]
pub struct ThrottleStore {
    entries: DashMap<ThrottleKey, ThrottleEntry>,
}

impl ThrottleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one hit for `key` and return the updated window.
    ///
    /// A missing or expired window starts fresh at `now + ttl`.
    pub fn lookup(&self, key: ThrottleKey, ttl: Duration, now: Instant) -> ThrottleEntry {
        let mut entry = self.entries.entry(key).or_insert_with(|| ThrottleEntry {
            expires_at: now + ttl,
            hits: 0,
        });

        if entry.expires_at <= now {
            entry.expires_at = now + ttl;
            entry.hits = 0;
        }
        entry.hits += 1;
        *entry
    }

    /// Current window for `key` without counting a hit.
    pub fn peek(&self, key: &ThrottleKey) -> Option<ThrottleEntry> {
        self.entries.get(key).map(|e| *e.value())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn snapshot(&self, now: Instant) -> ThrottleSnapshot {
        let active = self
            .entries
            .iter()
            .filter(|e| e.value().expires_at > now)
            .count();
        ThrottleSnapshot {
            tracked: self.entries.len(),
            active,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RoutingConfig;
    use crate::http::handler::{Context, HandlerError, Reply};
    use crate::routing::{Endpoint, RouteTable};
    use std::sync::Arc;

    async fn ok(_ctx: Context) -> Result<Reply, HandlerError> {
        Ok(Reply::empty())
    }

    fn route(endpoint: Endpoint) -> Arc<Route> {
        let mut table = RouteTable::new(RoutingConfig::default());
        table.register(endpoint);
        table.routes()[0].clone()
    }

    fn key() -> ThrottleKey {
        ThrottleKey::new("127.0.0.1", "/throttle", "GET")
    }

    #[test]
    fn test_hits_count_up_within_window() {
        let store = ThrottleStore::new();
        let ttl = Duration::from_secs(8);
        let start = Instant::now();

        let hits: Vec<u64> = (0..5)
            .map(|i| store.lookup(key(), ttl, start + Duration::from_secs(i)).hits)
            .collect();
        assert_eq!(hits, vec![1, 2, 3, 4, 5]);
        assert_eq!(store.peek(&key()).unwrap().expires_at, start + ttl);
    }

    #[test]
    fn test_window_resets_after_expiry() {
        let store = ThrottleStore::new();
        let ttl = Duration::from_secs(8);
        let start = Instant::now();
        for _ in 0..4 {
            store.lookup(key(), ttl, start);
        }

        let later = start + ttl;
        let entry = store.lookup(key(), ttl, later);
        assert_eq!(entry.hits, 1);
        assert_eq!(entry.expires_at, later + ttl);
    }

    #[test]
    fn test_keys_are_independent() {
        let store = ThrottleStore::new();
        let ttl = Duration::from_secs(8);
        let now = Instant::now();

        store.lookup(key(), ttl, now);
        store.lookup(key(), ttl, now);
        assert_eq!(store.lookup(ThrottleKey::new("10.0.0.9", "/throttle", "GET"), ttl, now).hits, 1);
        assert_eq!(store.lookup(ThrottleKey::new("127.0.0.1", "/other", "GET"), ttl, now).hits, 1);
        assert_eq!(store.lookup(ThrottleKey::new("127.0.0.1", "/throttle", "POST"), ttl, now).hits, 1);
        assert_eq!(store.len(), 4);
    }

    #[test]
    fn test_admission_scenario() {
        let defaults = ThrottleConfig {
            ttl_secs: 8,
            limit: 4,
            regrow: false,
        };
        let opts = throttle_options(&route(Endpoint::get("/throttle", ok)), &defaults);
        assert!(opts.enabled);

        let store = ThrottleStore::new();
        let start = Instant::now();
        for _ in 0..4 {
            assert!(opts.admits(&store.lookup(key(), opts.ttl, start)));
        }
        let fifth = store.lookup(key(), opts.ttl, start + Duration::from_millis(500));
        assert!(!opts.admits(&fifth));
        assert_eq!(fifth.retry_after_secs(start + Duration::from_millis(500)), 8);

        let after = store.lookup(key(), opts.ttl, start + Duration::from_secs(8));
        assert_eq!(after.hits, 1);
        assert!(opts.admits(&after));
    }

    #[test]
    fn test_options_override_and_disable() {
        let defaults = ThrottleConfig {
            ttl_secs: 8,
            limit: 4,
            regrow: true,
        };
        let custom = route(Endpoint::get("/x", ok).throttle(Duration::from_secs(1), 100));
        let opts = throttle_options(&custom, &defaults);
        assert_eq!(opts.ttl, Duration::from_secs(1));
        assert_eq!(opts.limit, 100);
        assert!(opts.regrow);

        let off = route(Endpoint::get("/x", ok).throttle(Duration::from_secs(1), 0));
        assert!(!throttle_options(&off, &defaults).enabled);

        let plain = route(Endpoint::get("/x", ok));
        assert!(!throttle_options(&plain, &ThrottleConfig::default()).enabled);
    }

    #[test]
    fn test_snapshot_counts_open_windows() {
        let store = ThrottleStore::new();
        let now = Instant::now();
        store.lookup(key(), Duration::from_secs(1), now);
        store.lookup(ThrottleKey::new("10.0.0.2", "/a", "GET"), Duration::from_secs(10), now);

        let snap = store.snapshot(now + Duration::from_secs(2));
        assert_eq!(snap.tracked, 2);
        assert_eq!(snap.active, 1);
    }

    #[test]
    fn test_parallel_hits_are_never_lost() {
        let store = ThrottleStore::new();
        let ttl = Duration::from_secs(60);
        let now = Instant::now();

        std::thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| {
                    for _ in 0..250 {
                        store.lookup(key(), ttl, now);
                    }
                });
            }
        });

        assert_eq!(store.peek(&key()).unwrap().hits, 2000);
        assert_eq!(store.len(), 1);
    }
}
