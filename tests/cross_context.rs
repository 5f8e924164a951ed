// tests/cross_context.rs
//! Two sync contexts sharing a broadcast hub and a snapshot file: an
//! editor-side save in one context shows up in the other without a reload.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use article_sync::context::{SyncContext, SyncContextBuilder};
use article_sync::propagate::transports::BroadcastHub;
use article_sync::sources::local::LocalSnapshotStore;
use article_sync::view::{RegionSink, RegionSpec, RegionState};
use article_sync::SyncConfig;

#[derive(Default)]
struct CollectingSink {
    states: Mutex<HashMap<String, Vec<RegionState>>>,
}

impl CollectingSink {
    fn last(&self, region_id: &str) -> Option<RegionState> {
        let map = self.states.lock().unwrap();
        map.get(region_id).and_then(|v| v.last().cloned())
    }
}

impl RegionSink for CollectingSink {
    fn apply(&self, region_id: &str, state: RegionState) {
        let mut map = self.states.lock().unwrap();
        map.entry(region_id.to_string()).or_default().push(state);
    }
}

fn offline_context(
    hub: &BroadcastHub,
    snapshot: Arc<LocalSnapshotStore>,
    sink: Arc<CollectingSink>,
) -> SyncContext {
    SyncContextBuilder::new(SyncConfig::default(), sink)
        .without_remote()
        .with_hub(hub.clone())
        .with_snapshot(snapshot)
        .build()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn save_in_one_context_rerenders_the_other() {
    let dir = tempfile::tempdir().unwrap();
    let snapshot = Arc::new(LocalSnapshotStore::new(dir.path().join("articles.json")));
    let hub = BroadcastHub::new("article-sync-test");

    let editor_sink = Arc::new(CollectingSink::default());
    let viewer_sink = Arc::new(CollectingSink::default());

    let editor = offline_context(&hub, snapshot.clone(), editor_sink);
    let viewer = offline_context(&hub, snapshot.clone(), viewer_sink.clone());

    viewer
        .views
        .mount("news-list-home", RegionSpec::with_max(10))
        .await;

    let mut article = SyncContext::new_published_article("y");
    article.title = Some("合同説明会を開催します".into());
    editor.save_article(article).await.unwrap();

    // The broadcast (and the storage pulse behind it) drive the viewer's
    // reconcile pass; no manual reload happens anywhere.
    tokio::time::timeout(Duration::from_secs(5), viewer.propagation.wait_for_passes(1))
        .await
        .expect("viewer reconciles after the broadcast");

    let state = viewer_sink
        .last("news-list-home")
        .expect("region rendered at least once");
    match state {
        RegionState::List(items) => {
            assert!(
                items.iter().any(|i| i.id == "y"),
                "viewer region must include the saved article"
            );
        }
        other => panic!("expected a rendered list, got {other:?}"),
    }
    assert!(viewer.store.get("y").is_some());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn delete_propagates_as_soft_delete() {
    let dir = tempfile::tempdir().unwrap();
    let snapshot = Arc::new(LocalSnapshotStore::new(dir.path().join("articles.json")));
    let hub = BroadcastHub::new("article-sync-test-del");

    let editor_sink = Arc::new(CollectingSink::default());
    let viewer_sink = Arc::new(CollectingSink::default());

    let editor = offline_context(&hub, snapshot.clone(), editor_sink);
    let viewer = offline_context(&hub, snapshot.clone(), viewer_sink.clone());

    let article = SyncContext::new_published_article("gone");
    editor.save_article(article).await.unwrap();
    viewer
        .views
        .mount("news-list-all", RegionSpec::with_max(0))
        .await;
    wait_until(|| viewer.store.get("gone").is_some()).await;

    assert!(editor.delete_article("gone").await.unwrap());
    wait_until(|| {
        viewer
            .store
            .get("gone")
            .map(|r| r.is_soft_deleted())
            .unwrap_or(false)
    })
    .await;

    // Soft-deleted: retrievable in the editor store, absent from listings.
    assert!(editor.store.get("gone").is_some());
    match viewer_sink.last("news-list-all").unwrap() {
        RegionState::List(items) => assert!(items.iter().all(|i| i.id != "gone")),
        RegionState::Empty => {}
        other => panic!("unexpected region state {other:?}"),
    }
}

/// Poll until the condition holds, failing after five seconds.
async fn wait_until(cond: impl Fn() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !cond() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not reached in time"
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}
