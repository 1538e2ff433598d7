// crates/bloxgate-resilience/src/cache.rs
// ============================================================================
// Module: Response Cache
// Description: Per-tool TTL cache with LRU eviction.
// Purpose: Serve repeated read calls without touching the upstream.
// Dependencies: serde_json, tokio
// ============================================================================

//! ## Overview
//! Entries are keyed by `(tool, argument fingerprint)` and carry an
//! absolute expiry. Each tool has its own capacity; inserting beyond it
//! evicts the least recently used entry. Expiry uses `tokio::time::Instant`
//! so tests cross TTL boundaries with virtual time. Readers never see torn
//! entries: the whole cache sits behind one short-lived mutex.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::time::Duration;

use serde_json::Value;
use tokio::time::Instant;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Cache tuning applied to every tool.
#[derive(Debug, Clone, Copy)]
pub struct CacheSettings {
    /// Global toggle; disabled degrades every policy to no caching.
    pub enabled: bool,
    /// TTL used when a tool declares caching without an explicit value.
    pub default_ttl: Duration,
    /// Maximum entries per tool before LRU eviction.
    pub max_entries_per_tool: usize,
}

// ============================================================================
// SECTION: Entries
// ============================================================================

/// One cached response.
#[derive(Debug, Clone)]
struct CacheEntry {
    /// Stored response payload.
    value: Value,
    /// Absolute expiry instant.
    expires_at: Instant,
    /// Recency tick for LRU ordering.
    last_used: u64,
}

// ============================================================================
// SECTION: Cache
// ============================================================================

/// Per-tool response cache.
///
/// # Invariants
/// - A hit returns a byte-identical clone of the stored response.
/// - No tool holds more than `max_entries_per_tool` live entries.
#[derive(Debug)]
pub struct ToolCache {
    /// Shared tuning.
    settings: CacheSettings,
    /// Entries keyed by tool, then argument fingerprint.
    inner: Mutex<HashMap<String, HashMap<String, CacheEntry>>>,
    /// Monotonic recency counter.
    tick: AtomicU64,
}

impl ToolCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new(settings: CacheSettings) -> Self {
        Self {
            settings,
            inner: Mutex::new(HashMap::new()),
            tick: AtomicU64::new(0),
        }
    }

    /// Returns whether caching is enabled at all.
    #[must_use]
    pub const fn enabled(&self) -> bool {
        self.settings.enabled
    }

    /// Returns the configured default TTL.
    #[must_use]
    pub const fn default_ttl(&self) -> Duration {
        self.settings.default_ttl
    }

    /// Looks up a non-expired entry, refreshing its recency.
    #[must_use]
    pub fn lookup(&self, tool: &str, fingerprint: &str) -> Option<Value> {
        if !self.settings.enabled {
            return None;
        }
        let now = Instant::now();
        let tick = self.tick.fetch_add(1, Ordering::Relaxed);
        let mut inner = self.inner.lock().ok()?;
        let entries = inner.get_mut(tool)?;
        match entries.get_mut(fingerprint) {
            Some(entry) if entry.expires_at > now => {
                entry.last_used = tick;
                Some(entry.value.clone())
            }
            Some(_) => {
                entries.remove(fingerprint);
                None
            }
            None => None,
        }
    }

    /// Inserts a response with the given TTL, evicting LRU on overflow.
    pub fn insert(&self, tool: &str, fingerprint: &str, value: Value, ttl: Duration) {
        if !self.settings.enabled {
            return;
        }
        let now = Instant::now();
        let tick = self.tick.fetch_add(1, Ordering::Relaxed);
        let Ok(mut inner) = self.inner.lock() else {
            return;
        };
        let entries = inner.entry(tool.to_string()).or_default();
        entries.retain(|_, entry| entry.expires_at > now);
        if entries.len() >= self.settings.max_entries_per_tool
            && !entries.contains_key(fingerprint)
        {
            if let Some(oldest) = entries
                .iter()
                .min_by_key(|(_, entry)| entry.last_used)
                .map(|(key, _)| key.clone())
            {
                entries.remove(&oldest);
            }
        }
        entries.insert(
            fingerprint.to_string(),
            CacheEntry {
                value,
                expires_at: now + ttl,
                last_used: tick,
            },
        );
    }

    /// Returns the number of live entries across all tools.
    #[must_use]
    pub fn entry_count(&self) -> usize {
        let now = Instant::now();
        self.inner.lock().map_or(0, |inner| {
            inner
                .values()
                .map(|entries| {
                    entries.values().filter(|entry| entry.expires_at > now).count()
                })
                .sum()
        })
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "Test-only assertions.")]

    use serde_json::json;

    use super::*;

    fn cache(max_entries: usize) -> ToolCache {
        ToolCache::new(CacheSettings {
            enabled: true,
            default_ttl: Duration::from_secs(300),
            max_entries_per_tool: max_entries,
        })
    }

    #[tokio::test(start_paused = true)]
    async fn hit_inside_ttl_miss_after() {
        let cache = cache(10);
        cache.insert("list_subnets", "abc", json!({"results": [1]}), Duration::from_secs(60));

        tokio::time::advance(Duration::from_secs(59)).await;
        assert_eq!(cache.lookup("list_subnets", "abc"), Some(json!({"results": [1]})));

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(cache.lookup("list_subnets", "abc"), None);
        assert_eq!(cache.entry_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn tools_do_not_share_entries() {
        let cache = cache(10);
        cache.insert("list_subnets", "abc", json!(1), Duration::from_secs(60));
        assert_eq!(cache.lookup("list_ip_spaces", "abc"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn overflow_evicts_least_recently_used() {
        let cache = cache(2);
        cache.insert("list_subnets", "a", json!("a"), Duration::from_secs(60));
        cache.insert("list_subnets", "b", json!("b"), Duration::from_secs(60));
        // Touch "a" so "b" becomes the eviction candidate.
        let _ = cache.lookup("list_subnets", "a");
        cache.insert("list_subnets", "c", json!("c"), Duration::from_secs(60));

        assert_eq!(cache.lookup("list_subnets", "a"), Some(json!("a")));
        assert_eq!(cache.lookup("list_subnets", "b"), None);
        assert_eq!(cache.lookup("list_subnets", "c"), Some(json!("c")));
    }

    #[tokio::test(start_paused = true)]
    async fn reinsert_overwrites_without_eviction() {
        let cache = cache(2);
        cache.insert("list_subnets", "a", json!("a1"), Duration::from_secs(60));
        cache.insert("list_subnets", "b", json!("b"), Duration::from_secs(60));
        cache.insert("list_subnets", "a", json!("a2"), Duration::from_secs(60));
        assert_eq!(cache.lookup("list_subnets", "a"), Some(json!("a2")));
        assert_eq!(cache.lookup("list_subnets", "b"), Some(json!("b")));
    }

    #[tokio::test(start_paused = true)]
    async fn disabled_cache_stores_nothing() {
        let cache = ToolCache::new(CacheSettings {
            enabled: false,
            default_ttl: Duration::from_secs(300),
            max_entries_per_tool: 10,
        });
        cache.insert("list_subnets", "a", json!("a"), Duration::from_secs(60));
        assert_eq!(cache.lookup("list_subnets", "a"), None);
        assert_eq!(cache.entry_count(), 0);
    }
}
