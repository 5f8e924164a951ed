// tests/view_render.rs
//! ViewBinder projection states: truncation, explicit empty, failure with
//! fallback, and the unmounted-region no-op.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use article_sync::cache::CacheLayer;
use article_sync::error::FetchError;
use article_sync::sources::types::SourceAdapter;
use article_sync::sources::AdapterChain;
use article_sync::store::ArticleStore;
use article_sync::view::{RegionSink, RegionSpec, RegionState, ViewBinder, EMPTY_MESSAGE};
use article_sync::{ArticleRecord, ArticleStatus};

#[derive(Default)]
struct CollectingSink {
    states: Mutex<HashMap<String, Vec<RegionState>>>,
}

impl CollectingSink {
    fn all(&self, region_id: &str) -> Vec<RegionState> {
        let map = self.states.lock().unwrap();
        map.get(region_id).cloned().unwrap_or_default()
    }
    fn last(&self, region_id: &str) -> Option<RegionState> {
        self.all(region_id).last().cloned()
    }
}

impl RegionSink for CollectingSink {
    fn apply(&self, region_id: &str, state: RegionState) {
        let mut map = self.states.lock().unwrap();
        map.entry(region_id.to_string()).or_default().push(state);
    }
}

struct FixedAdapter(Vec<ArticleRecord>);

#[async_trait::async_trait]
impl SourceAdapter for FixedAdapter {
    async fn fetch(&self, _limit: usize) -> Result<Vec<ArticleRecord>, FetchError> {
        Ok(self.0.clone())
    }
    fn name(&self) -> &'static str {
        "fixed"
    }
}

struct FailingAdapter;

#[async_trait::async_trait]
impl SourceAdapter for FailingAdapter {
    async fn fetch(&self, _limit: usize) -> Result<Vec<ArticleRecord>, FetchError> {
        Err(FetchError::Network("offline".into()))
    }
    fn name(&self) -> &'static str {
        "failing"
    }
}

fn published(id: &str, day: u32) -> ArticleRecord {
    let mut a = ArticleRecord::new(id);
    a.status = ArticleStatus::Published;
    a.created_at = format!("2025-01-{day:02}T00:00:00Z").parse().unwrap();
    a
}

fn binder(
    chain: AdapterChain,
    sink: Arc<CollectingSink>,
    fallback: bool,
) -> (Arc<ArticleStore>, ViewBinder) {
    let store = Arc::new(ArticleStore::new());
    let cache = Arc::new(CacheLayer::default());
    let vb = ViewBinder::new(store.clone(), cache, Arc::new(chain), sink, fallback);
    (store, vb)
}

#[tokio::test]
async fn max_items_renders_the_five_most_recent_of_ten() {
    let records: Vec<ArticleRecord> = (1..=10).map(|d| published(&format!("a{d}"), d)).collect();
    let sink = Arc::new(CollectingSink::default());
    let (_store, vb) = binder(
        AdapterChain::new().push(FixedAdapter(records)),
        sink.clone(),
        false,
    );

    vb.mount("region", RegionSpec::with_max(5)).await;

    match sink.last("region").unwrap() {
        RegionState::List(items) => {
            assert_eq!(items.len(), 5);
            // Newest first: days 10 down to 6.
            let ids: Vec<&str> = items.iter().map(|i| i.id.as_str()).collect();
            assert_eq!(ids, vec!["a10", "a9", "a8", "a7", "a6"]);
        }
        other => panic!("expected list, got {other:?}"),
    }
}

#[tokio::test]
async fn mount_starts_with_loading_state() {
    let sink = Arc::new(CollectingSink::default());
    let (_store, vb) = binder(
        AdapterChain::new().push(FixedAdapter(vec![published("a", 1)])),
        sink.clone(),
        false,
    );
    vb.mount("region", RegionSpec::with_max(0)).await;

    let states = sink.all("region");
    assert_eq!(states.first(), Some(&RegionState::Loading));
}

#[tokio::test]
async fn zero_eligible_records_is_an_explicit_empty_state() {
    let sink = Arc::new(CollectingSink::default());
    let (_store, vb) = binder(
        AdapterChain::new().push(FixedAdapter(Vec::new())),
        sink.clone(),
        false,
    );
    vb.mount("region", RegionSpec::with_max(5)).await;

    assert_eq!(sink.last("region"), Some(RegionState::Empty));
    // The literal consumers render for the empty state.
    assert_eq!(EMPTY_MESSAGE, "no published items");
}

#[tokio::test]
async fn chain_exhaustion_renders_retry_with_fallback_dataset() {
    let sink = Arc::new(CollectingSink::default());
    let (_store, vb) = binder(AdapterChain::new().push(FailingAdapter), sink.clone(), true);
    vb.mount("region", RegionSpec::with_max(5)).await;

    match sink.last("region").unwrap() {
        RegionState::Failed { retry, fallback } => {
            assert!(retry);
            let items = fallback.expect("fallback dataset configured");
            assert!(!items.is_empty(), "region is never left blank");
        }
        other => panic!("expected failed state, got {other:?}"),
    }
}

#[tokio::test]
async fn chain_exhaustion_without_fallback_still_offers_retry() {
    let sink = Arc::new(CollectingSink::default());
    let (_store, vb) = binder(AdapterChain::new().push(FailingAdapter), sink.clone(), false);
    vb.mount("region", RegionSpec::with_max(5)).await;

    assert_eq!(
        sink.last("region"),
        Some(RegionState::Failed {
            retry: true,
            fallback: None
        })
    );
}

#[tokio::test]
async fn rendering_an_unmounted_region_is_a_no_op() {
    let sink = Arc::new(CollectingSink::default());
    let (_store, vb) = binder(
        AdapterChain::new().push(FixedAdapter(vec![published("a", 1)])),
        sink.clone(),
        false,
    );

    vb.render("missing-region").await;
    assert!(sink.all("missing-region").is_empty());
}

#[tokio::test]
async fn unmount_removes_region_and_subscription() {
    let sink = Arc::new(CollectingSink::default());
    let (_store, vb) = binder(
        AdapterChain::new().push(FixedAdapter(vec![published("a", 1)])),
        sink.clone(),
        false,
    );

    vb.mount("region", RegionSpec::with_max(0)).await;
    assert_eq!(vb.registry().len(), 1);

    vb.unmount("region");
    assert!(vb.registry().is_empty());
    let before = sink.all("region").len();
    vb.render("region").await;
    assert_eq!(sink.all("region").len(), before, "no render after unmount");
}
