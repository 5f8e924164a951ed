// src/store.rs
//! Authoritative in-memory article table for one browsing context.
//!
//! All consumers in a context share one instance behind an `Arc`; mutation
//! goes through the methods here only, and the table is re-sorted by
//! effective date (descending) after every mutation.

use std::collections::BTreeMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};

use crate::article::{ArticleRecord, ArticleStatus};

/// Listing filter. `status` defaults to `Published`; soft-deleted records
/// are excluded regardless of the requested status.
#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    pub status: Option<ArticleStatus>,
    pub category: Option<String>,
    pub limit: Option<usize>,
}

/// Per-status and per-category counts plus the newest effective date,
/// used as the locally remembered "last updated" marker.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ArticleStats {
    pub total: usize,
    pub published: usize,
    pub draft: usize,
    pub deleted: usize,
    pub categories: BTreeMap<String, usize>,
    pub last_updated: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
pub struct ArticleStore {
    inner: Mutex<Vec<ArticleRecord>>,
}

impl ArticleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace by id, then re-sort. Tolerates partial records;
    /// display fallbacks are the renderer's concern.
    pub fn upsert(&self, record: ArticleRecord) {
        let mut v = self.inner.lock().expect("article store mutex poisoned");
        match v.iter_mut().find(|r| r.id == record.id) {
            Some(slot) => *slot = record,
            None => v.push(record),
        }
        sort_newest_first(&mut v);
    }

    /// Hard removal from the in-memory set. Distinct from soft deletion;
    /// reconciliation never calls this.
    pub fn remove(&self, id: &str) -> bool {
        let mut v = self.inner.lock().expect("article store mutex poisoned");
        let before = v.len();
        v.retain(|r| r.id != id);
        v.len() != before
    }

    /// Soft delete: flag the record and stamp `deleted_at`. It stays
    /// retrievable via [`get`](Self::get) but never appears in listings.
    pub fn mark_deleted(&self, id: &str) -> bool {
        let mut v = self.inner.lock().expect("article store mutex poisoned");
        match v.iter_mut().find(|r| r.id == id) {
            Some(r) => {
                r.status = ArticleStatus::Deleted;
                r.deleted_at = Some(Utc::now());
                true
            }
            None => false,
        }
    }

    pub fn get(&self, id: &str) -> Option<ArticleRecord> {
        let v = self.inner.lock().expect("article store mutex poisoned");
        v.iter().find(|r| r.id == id).cloned()
    }

    /// Defensive copy of the matching records, newest first. Soft-deleted
    /// records are excluded even when `Deleted` status is requested.
    pub fn list(&self, filter: &ListFilter) -> Vec<ArticleRecord> {
        let status = filter.status.unwrap_or(ArticleStatus::Published);
        let v = self.inner.lock().expect("article store mutex poisoned");
        let mut out: Vec<ArticleRecord> = v
            .iter()
            .filter(|r| !r.is_soft_deleted())
            .filter(|r| r.status == status)
            .filter(|r| match &filter.category {
                Some(c) => r.display_category() == c,
                None => true,
            })
            .cloned()
            .collect();
        if let Some(limit) = filter.limit {
            out.truncate(limit);
        }
        out
    }

    /// Apply a freshly fetched batch. Within the batch, later records win on
    /// duplicate ids; against the store, a record never regresses an
    /// existing entry that carries a newer update timestamp. No implicit
    /// notification happens here; callers notify explicitly.
    pub fn merge(&self, records: Vec<ArticleRecord>) -> usize {
        // Batch-internal dedup, last one in iteration order wins.
        let mut batch: Vec<ArticleRecord> = Vec::with_capacity(records.len());
        for rec in records {
            batch.retain(|r| r.id != rec.id);
            batch.push(rec);
        }

        let mut applied = 0usize;
        let mut v = self.inner.lock().expect("article store mutex poisoned");
        for rec in batch {
            match v.iter_mut().find(|r| r.id == rec.id) {
                Some(slot) => {
                    if rec.effective_date() >= slot.effective_date() {
                        *slot = rec;
                        applied += 1;
                    }
                }
                None => {
                    v.push(rec);
                    applied += 1;
                }
            }
        }
        sort_newest_first(&mut v);
        metrics::gauge!("sync_store_last_merge_ts").set(Utc::now().timestamp() as f64);
        applied
    }

    /// Full clone of the table, soft-deleted records included. This is the
    /// persistence shape, not a listing.
    pub fn snapshot_all(&self) -> Vec<ArticleRecord> {
        self.inner
            .lock()
            .expect("article store mutex poisoned")
            .clone()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("article store mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> ArticleStats {
        let v = self.inner.lock().expect("article store mutex poisoned");
        let mut stats = ArticleStats {
            total: v.len(),
            published: 0,
            draft: 0,
            deleted: 0,
            categories: BTreeMap::new(),
            last_updated: None,
        };
        for r in v.iter() {
            if r.is_soft_deleted() {
                stats.deleted += 1;
            } else {
                match r.status {
                    ArticleStatus::Published => stats.published += 1,
                    ArticleStatus::Draft => stats.draft += 1,
                    ArticleStatus::Deleted => {}
                }
                *stats
                    .categories
                    .entry(r.display_category().to_string())
                    .or_insert(0) += 1;
            }
            let d = r.effective_date();
            if stats.last_updated.map_or(true, |cur| d > cur) {
                stats.last_updated = Some(d);
            }
        }
        stats
    }
}

fn sort_newest_first(v: &mut [ArticleRecord]) {
    v.sort_by(|a, b| {
        b.effective_date()
            .cmp(&a.effective_date())
            .then_with(|| a.id.cmp(&b.id))
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn published(id: &str, created: &str) -> ArticleRecord {
        let mut a = ArticleRecord::new(id);
        a.status = ArticleStatus::Published;
        a.created_at = created.parse().unwrap();
        a
    }

    #[test]
    fn upsert_replaces_by_id_and_resorts() {
        let store = ArticleStore::new();
        store.upsert(published("a", "2025-01-01T00:00:00Z"));
        store.upsert(published("b", "2025-03-01T00:00:00Z"));
        let mut newer_a = published("a", "2025-05-01T00:00:00Z");
        newer_a.title = Some("rewritten".into());
        store.upsert(newer_a);

        let listed = store.list(&ListFilter::default());
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, "a");
        assert_eq!(listed[0].title.as_deref(), Some("rewritten"));
    }

    #[test]
    fn mark_deleted_keeps_record_retrievable_but_unlisted() {
        let store = ArticleStore::new();
        store.upsert(published("a", "2025-01-01T00:00:00Z"));
        assert!(store.mark_deleted("a"));

        assert!(store.get("a").is_some());
        assert!(store.list(&ListFilter::default()).is_empty());
        // Even an explicit request for deleted records yields nothing.
        let f = ListFilter {
            status: Some(ArticleStatus::Deleted),
            ..Default::default()
        };
        assert!(store.list(&f).is_empty());
    }

    #[test]
    fn merge_never_regresses_newer_update() {
        let store = ArticleStore::new();
        let mut current = published("x", "2025-01-01T00:00:00Z");
        current.updated_at = Some("2025-06-01T00:00:00Z".parse().unwrap());
        current.title = Some("fresh".into());
        store.upsert(current);

        let mut stale = published("x", "2025-01-01T00:00:00Z");
        stale.updated_at = Some("2025-02-01T00:00:00Z".parse().unwrap());
        stale.title = Some("stale".into());
        store.merge(vec![stale]);

        assert_eq!(store.get("x").unwrap().title.as_deref(), Some("fresh"));
    }
}
