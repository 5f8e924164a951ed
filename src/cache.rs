// src/cache.rs
//! Time-bounded memoization of listing fetches, keyed by (view, max items).
//!
//! Read-through pattern: views ask the cache first; on a miss the cache
//! delegates to the adapter chain, merges the result into the store, and
//! writes the listed projection back. Expired entries are evicted lazily on
//! read.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use metrics::{counter, describe_counter};
use once_cell::sync::OnceCell;

use crate::article::ArticleRecord;
use crate::error::FetchError;
use crate::sources::AdapterChain;
use crate::store::{ArticleStore, ListFilter};

pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("sync_cache_hits_total", "Cache reads served from memory.");
        describe_counter!("sync_cache_misses_total", "Cache reads that went to the chain.");
        describe_counter!("sync_cache_evictions_total", "Entries evicted on expired read.");
    });
}

/// Cache key derived from the consuming view. `max_items == 0` means
/// unbounded.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub view_id: String,
    pub max_items: usize,
}

impl CacheKey {
    pub fn new(view_id: impl Into<String>, max_items: usize) -> Self {
        Self {
            view_id: view_id.into(),
            max_items,
        }
    }
}

struct CacheEntry {
    data: Vec<ArticleRecord>,
    stored_at: Instant,
    ttl: Duration,
}

impl CacheEntry {
    fn expired(&self) -> bool {
        self.stored_at.elapsed() > self.ttl
    }
}

pub struct CacheLayer {
    inner: Mutex<HashMap<CacheKey, CacheEntry>>,
    default_ttl: Duration,
    /// Opaque marker last reported by the remote stats endpoint. Cleared by
    /// a full invalidation so the next poll always reconciles.
    remote_marker: Mutex<Option<String>>,
}

impl CacheLayer {
    pub fn new(default_ttl: Duration) -> Self {
        ensure_metrics_described();
        Self {
            inner: Mutex::new(HashMap::new()),
            default_ttl,
            remote_marker: Mutex::new(None),
        }
    }

    /// `None` when missing or TTL-expired; expiry evicts the entry.
    pub fn get(&self, key: &CacheKey) -> Option<Vec<ArticleRecord>> {
        let mut map = self.inner.lock().expect("cache mutex poisoned");
        match map.get(key) {
            Some(entry) if !entry.expired() => {
                counter!("sync_cache_hits_total").increment(1);
                Some(entry.data.clone())
            }
            Some(_) => {
                map.remove(key);
                counter!("sync_cache_evictions_total").increment(1);
                counter!("sync_cache_misses_total").increment(1);
                None
            }
            None => {
                counter!("sync_cache_misses_total").increment(1);
                None
            }
        }
    }

    pub fn set(&self, key: CacheKey, data: Vec<ArticleRecord>, ttl: Option<Duration>) {
        let mut map = self.inner.lock().expect("cache mutex poisoned");
        map.insert(
            key,
            CacheEntry {
                data,
                stored_at: Instant::now(),
                ttl: ttl.unwrap_or(self.default_ttl),
            },
        );
    }

    /// Clear one entry, or everything plus the remote marker when no key is
    /// given. Dropping the marker forces the next stats poll to reconcile.
    pub fn invalidate(&self, key: Option<&CacheKey>) {
        let mut map = self.inner.lock().expect("cache mutex poisoned");
        match key {
            Some(k) => {
                map.remove(k);
            }
            None => {
                map.clear();
                *self.remote_marker.lock().expect("marker mutex poisoned") = None;
            }
        }
    }

    /// Drop all listing entries but keep the remote marker. Reconciliation
    /// uses this; wiping the marker there would make every stable-marker
    /// poll look like a change.
    pub fn clear_entries(&self) {
        self.inner.lock().expect("cache mutex poisoned").clear();
    }

    /// Freshness probe without side effects, for diagnostics and tests.
    pub fn is_fresh(&self, key: &CacheKey) -> bool {
        let map = self.inner.lock().expect("cache mutex poisoned");
        map.get(key).is_some_and(|e| !e.expired())
    }

    pub fn remote_marker(&self) -> Option<String> {
        self.remote_marker
            .lock()
            .expect("marker mutex poisoned")
            .clone()
    }

    pub fn set_remote_marker(&self, marker: impl Into<String>) {
        *self.remote_marker.lock().expect("marker mutex poisoned") = Some(marker.into());
    }

    /// Forget the remembered marker so the next stats poll re-triggers a
    /// reconcile. Called when a pass fails after the marker was committed.
    pub fn forget_remote_marker(&self) {
        *self.remote_marker.lock().expect("marker mutex poisoned") = None;
    }

    /// Read-through fetch for one view. `force_refresh` bypasses the cache
    /// read but still writes the fresh result back.
    pub async fn get_or_fetch(
        &self,
        key: &CacheKey,
        filter: &ListFilter,
        chain: &AdapterChain,
        store: &ArticleStore,
        force_refresh: bool,
    ) -> Result<Vec<ArticleRecord>, FetchError> {
        if !force_refresh {
            if let Some(hit) = self.get(key) {
                return Ok(hit);
            }
        }

        let records = chain.fetch_first(key.max_items).await?;
        store.merge(records);

        let mut filter = filter.clone();
        filter.limit = None;
        let mut data = store.list(&filter);
        if key.max_items > 0 {
            data.truncate(key.max_items);
        }
        self.set(key.clone(), data.clone(), None);
        Ok(data)
    }
}

impl Default for CacheLayer {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}
