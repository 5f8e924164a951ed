// src/context.rs
//! Per-context wiring. One [`SyncContext`] is constructed at page-context
//! load and handed to everything that needs the shared singletons,
//! explicit dependency injection instead of module-level globals.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::article::{ArticleRecord, ArticleStatus};
use crate::cache::CacheLayer;
use crate::config::SyncConfig;
use crate::propagate::transports::{
    spawn_broadcast_listener, spawn_stats_poller, spawn_storage_listener, spawn_worker_listener,
    ArticleUpdateMessage, BroadcastHub, StatsPollerCfg, WorkerMessage,
};
use crate::propagate::{Transport, UpdateAction, UpdatePropagation, UpdateSignal};
use crate::sources::embedded::EmbeddedAdapter;
use crate::sources::local::{LocalSnapshotAdapter, LocalSnapshotStore};
use crate::sources::remote::RemoteApiAdapter;
use crate::sources::AdapterChain;
use crate::store::ArticleStore;
use crate::view::{RegionSink, ViewBinder};

static CONTEXT_SEQ: AtomicU64 = AtomicU64::new(0);

fn next_context_id() -> String {
    let seq = CONTEXT_SEQ.fetch_add(1, Ordering::Relaxed);
    format!("ctx-{}-{}", std::process::id(), seq)
}

pub struct SyncContextBuilder {
    config: SyncConfig,
    sink: Arc<dyn RegionSink>,
    hub: Option<BroadcastHub>,
    snapshot: Option<Arc<LocalSnapshotStore>>,
    use_remote: bool,
    start_poller: bool,
    worker_rx: Option<mpsc::Receiver<WorkerMessage>>,
    chain_override: Option<AdapterChain>,
}

impl SyncContextBuilder {
    pub fn new(config: SyncConfig, sink: Arc<dyn RegionSink>) -> Self {
        Self {
            config,
            sink,
            hub: None,
            snapshot: None,
            use_remote: true,
            start_poller: true,
            worker_rx: None,
            chain_override: None,
        }
    }

    /// Join a cross-context broadcast channel shared with other contexts.
    pub fn with_hub(mut self, hub: BroadcastHub) -> Self {
        self.hub = Some(hub);
        self
    }

    /// Share a persisted snapshot store (and its storage wake-up channel).
    pub fn with_snapshot(mut self, snapshot: Arc<LocalSnapshotStore>) -> Self {
        self.snapshot = Some(snapshot);
        self
    }

    /// Disable the remote adapters and the stats poller (offline contexts,
    /// tests).
    pub fn without_remote(mut self) -> Self {
        self.use_remote = false;
        self.start_poller = false;
        self
    }

    pub fn without_poller(mut self) -> Self {
        self.start_poller = false;
        self
    }

    /// Attach the receiving end of a background worker channel.
    pub fn with_worker_channel(mut self, rx: mpsc::Receiver<WorkerMessage>) -> Self {
        self.worker_rx = Some(rx);
        self
    }

    /// Replace the default adapter chain entirely.
    pub fn with_chain(mut self, chain: AdapterChain) -> Self {
        self.chain_override = Some(chain);
        self
    }

    pub fn build(self) -> SyncContext {
        let id = next_context_id();
        let config = self.config;

        let store = Arc::new(ArticleStore::new());
        let cache = Arc::new(CacheLayer::new(config.cache_ttl()));

        let chain = match self.chain_override {
            Some(c) => c,
            None => {
                // Priority order: fast remote probe, primary remote,
                // persisted snapshot, embedded fallback.
                let mut chain = AdapterChain::new();
                if self.use_remote {
                    chain = chain
                        .push(RemoteApiAdapter::fast(&config.api_base))
                        .push(RemoteApiAdapter::new(&config.api_base));
                }
                if let Some(snap) = &self.snapshot {
                    chain = chain.push(LocalSnapshotAdapter::new(snap.clone()));
                }
                chain.push(EmbeddedAdapter::new())
            }
        };
        let chain = Arc::new(chain);

        let views = Arc::new(ViewBinder::new(
            store.clone(),
            cache.clone(),
            chain.clone(),
            self.sink,
            config.fallback_on_failure,
        ));

        let (propagation, reconcile_task) = UpdatePropagation::spawn(
            id.clone(),
            store.clone(),
            cache.clone(),
            chain.clone(),
            views.clone(),
            config.default_fetch_limit,
        );

        let mut tasks: Vec<JoinHandle<()>> = vec![reconcile_task];
        if let Some(hub) = &self.hub {
            tasks.push(spawn_broadcast_listener(hub, propagation.clone()));
        }
        if let Some(snap) = &self.snapshot {
            tasks.push(spawn_storage_listener(snap.subscribe(), propagation.clone()));
        }
        if self.use_remote && self.start_poller {
            let poller_adapter = Arc::new(RemoteApiAdapter::new(&config.api_base));
            tasks.push(spawn_stats_poller(
                poller_adapter,
                cache.clone(),
                propagation.clone(),
                StatsPollerCfg {
                    interval: config.poll_interval(),
                    min_spacing: config.min_recheck_spacing(),
                },
            ));
        }
        if let Some(rx) = self.worker_rx {
            tasks.push(spawn_worker_listener(rx, propagation.clone()));
        }

        debug!(context = %id, adapters = chain.len(), "sync context ready");

        SyncContext {
            id,
            config,
            store,
            cache,
            chain,
            views,
            propagation,
            hub: self.hub,
            snapshot: self.snapshot,
            tasks,
        }
    }
}

/// The per-browsing-context singleton set: store, cache, chain, views and
/// the propagation handle, plus the background listener tasks.
pub struct SyncContext {
    pub id: String,
    pub config: SyncConfig,
    pub store: Arc<ArticleStore>,
    pub cache: Arc<CacheLayer>,
    pub chain: Arc<AdapterChain>,
    pub views: Arc<ViewBinder>,
    pub propagation: UpdatePropagation,
    hub: Option<BroadcastHub>,
    snapshot: Option<Arc<LocalSnapshotStore>>,
    tasks: Vec<JoinHandle<()>>,
}

impl SyncContext {
    /// Editor-side save: apply locally, persist the snapshot, invalidate,
    /// tell other contexts, re-render our own regions.
    pub async fn save_article(&self, mut record: ArticleRecord) -> Result<ArticleRecord> {
        let now = Utc::now();
        if self.store.get(&record.id).is_some() {
            record.updated_at = Some(now);
        } else if record.created_at > now {
            record.created_at = now;
        }
        self.store.upsert(record.clone());

        self.persist_snapshot().await;
        self.cache.invalidate(None);

        if let Some(hub) = &self.hub {
            hub.publish(ArticleUpdateMessage::new(
                UpdateAction::Save,
                Some(record.id.clone()),
                Some(record.clone()),
                &self.id,
            ));
        }

        self.views
            .notify_and_render(&UpdateSignal {
                action: UpdateAction::Save,
                article_id: Some(record.id.clone()),
                article: Some(record.clone()),
                timestamp: now,
                origin: self.id.clone(),
                transport: Transport::Local,
            })
            .await;

        Ok(record)
    }

    /// Editor-side delete. Soft-delete only: the record stays retrievable
    /// by id but vanishes from every listing.
    pub async fn delete_article(&self, article_id: &str) -> Result<bool> {
        let found = self.store.mark_deleted(article_id);
        if !found {
            return Ok(false);
        }

        self.persist_snapshot().await;
        self.cache.invalidate(None);

        if let Some(hub) = &self.hub {
            hub.publish(ArticleUpdateMessage::new(
                UpdateAction::Delete,
                Some(article_id.to_string()),
                self.store.get(article_id),
                &self.id,
            ));
        }

        self.views
            .notify_and_render(&UpdateSignal {
                action: UpdateAction::Delete,
                article_id: Some(article_id.to_string()),
                article: None,
                timestamp: Utc::now(),
                origin: self.id.clone(),
                transport: Transport::Local,
            })
            .await;

        Ok(true)
    }

    /// Manual refresh entry point (retry button, page focus handler).
    pub fn force_refresh(&self) {
        self.propagation
            .on_external_signal(UpdateSignal::refresh(self.id.clone(), Transport::Local));
    }

    async fn persist_snapshot(&self) {
        if let Some(snap) = &self.snapshot {
            if let Err(e) = snap.write(&self.store.snapshot_all(), &self.id).await {
                warn!(context = %self.id, error = %format!("{e:#}"), "snapshot persist failed");
            }
        }
    }

    /// Create an article id the way the editor shell does.
    pub fn generate_article_id() -> String {
        format!(
            "article-{}-{}",
            Utc::now().timestamp_millis(),
            CONTEXT_SEQ.fetch_add(1, Ordering::Relaxed)
        )
    }

    /// Convenience for editors: a published record stamped now.
    pub fn new_published_article(id: impl Into<String>) -> ArticleRecord {
        let mut rec = ArticleRecord::new(id);
        rec.status = ArticleStatus::Published;
        rec
    }
}

impl Drop for SyncContext {
    fn drop(&mut self) {
        for t in &self.tasks {
            t.abort();
        }
    }
}
