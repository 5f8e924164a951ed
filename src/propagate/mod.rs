// src/propagate/mod.rs
//! Multi-channel update propagation.
//!
//! Every transport (same-context bus, cross-context broadcast, storage
//! wake-up, stats poll, background worker) normalizes its payload into one
//! [`UpdateSignal`] and feeds [`UpdatePropagation::on_external_signal`].
//! A single reconcile task per context serializes passes: signals arriving
//! while a pass is in flight are coalesced, never queued up. A failed
//! refetch keeps the previous store contents visible.

pub mod transports;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use metrics::{counter, describe_counter};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use crate::article::ArticleRecord;
use crate::cache::CacheLayer;
use crate::sources::AdapterChain;
use crate::store::ArticleStore;
use crate::view::ViewBinder;

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "sync_reconcile_runs_total",
            "Reconciliation passes started."
        );
        describe_counter!(
            "sync_reconcile_failures_total",
            "Reconciliation passes whose refetch failed."
        );
        describe_counter!(
            "sync_signals_coalesced_total",
            "Update signals merged into an already-pending pass."
        );
    });
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateAction {
    Create,
    Update,
    Save,
    Delete,
    Refresh,
}

/// Which channel delivered a signal. Logging only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Local,
    Broadcast,
    Storage,
    Poll,
    Worker,
}

impl Transport {
    pub fn label(&self) -> &'static str {
        match self {
            Transport::Local => "local",
            Transport::Broadcast => "broadcast",
            Transport::Storage => "storage",
            Transport::Poll => "poll",
            Transport::Worker => "worker",
        }
    }
}

/// Normalized update event. The embedded article payload is advisory: the
/// reconcile pass always refetches current truth through the chain.
#[derive(Debug, Clone)]
pub struct UpdateSignal {
    pub action: UpdateAction,
    pub article_id: Option<String>,
    pub article: Option<ArticleRecord>,
    pub timestamp: DateTime<Utc>,
    /// Context id of the producer; empty when unknown.
    pub origin: String,
    pub transport: Transport,
}

impl UpdateSignal {
    pub fn refresh(origin: impl Into<String>, transport: Transport) -> Self {
        Self {
            action: UpdateAction::Refresh,
            article_id: None,
            article: None,
            timestamp: Utc::now(),
            origin: origin.into(),
            transport,
        }
    }
}

/// Handle to the per-context reconcile task. Cheap to clone; every
/// transport keeps one.
#[derive(Clone)]
pub struct UpdatePropagation {
    context_id: String,
    tx: mpsc::Sender<UpdateSignal>,
    completed: watch::Receiver<u64>,
}

impl UpdatePropagation {
    /// Spawn the reconcile task for one context. `fetch_limit == 0` pulls
    /// everything the winning adapter has.
    pub fn spawn(
        context_id: String,
        store: Arc<ArticleStore>,
        cache: Arc<CacheLayer>,
        chain: Arc<AdapterChain>,
        views: Arc<ViewBinder>,
        fetch_limit: usize,
    ) -> (Self, JoinHandle<()>) {
        ensure_metrics_described();
        // Capacity 1: one signal may wait while a pass runs; anything
        // beyond that is coalesced in on_external_signal.
        let (tx, rx) = mpsc::channel::<UpdateSignal>(1);
        let (done_tx, done_rx) = watch::channel(0u64);

        let ctx = context_id.clone();
        let handle = tokio::spawn(async move {
            reconcile_loop(ctx, rx, done_tx, store, cache, chain, views, fetch_limit).await;
        });

        (
            Self {
                context_id,
                tx,
                completed: done_rx,
            },
            handle,
        )
    }

    pub fn context_id(&self) -> &str {
        &self.context_id
    }

    /// The single entry point every transport funnels into. Signals that
    /// cannot be enqueued because a pass plus one follow-up are already
    /// pending are coalesced (the refetch pulls current truth anyway).
    pub fn on_external_signal(&self, signal: UpdateSignal) {
        if signal.transport == Transport::Broadcast && signal.origin == self.context_id {
            trace!(context = %self.context_id, "ignoring own broadcast echo");
            return;
        }
        match self.tx.try_send(signal) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(sig)) => {
                counter!("sync_signals_coalesced_total").increment(1);
                trace!(
                    action = ?sig.action,
                    transport = sig.transport.label(),
                    "signal coalesced into pending pass"
                );
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                warn!(context = %self.context_id, "reconcile task gone; signal dropped");
            }
        }
    }

    /// Number of completed reconciliation passes (failed refetches count:
    /// the pass ran and returned to idle).
    pub fn completed_passes(&self) -> u64 {
        *self.completed.borrow()
    }

    /// Wait until at least `n` passes have completed.
    pub async fn wait_for_passes(&self, n: u64) {
        let mut rx = self.completed.clone();
        while *rx.borrow() < n {
            if rx.changed().await.is_err() {
                return;
            }
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn reconcile_loop(
    context_id: String,
    mut rx: mpsc::Receiver<UpdateSignal>,
    done_tx: watch::Sender<u64>,
    store: Arc<ArticleStore>,
    cache: Arc<CacheLayer>,
    chain: Arc<AdapterChain>,
    views: Arc<ViewBinder>,
    fetch_limit: usize,
) {
    while let Some(first) = rx.recv().await {
        // Idle -> Reconciling. Drain whatever piled up in the same tick;
        // the last payload is authoritative for logging only.
        let mut signal = first;
        while let Ok(extra) = rx.try_recv() {
            counter!("sync_signals_coalesced_total").increment(1);
            signal = extra;
        }

        counter!("sync_reconcile_runs_total").increment(1);
        debug!(
            context = %context_id,
            action = ?signal.action,
            transport = signal.transport.label(),
            article_id = signal.article_id.as_deref().unwrap_or("-"),
            "reconciling"
        );

        cache.clear_entries();
        match chain.fetch_first(fetch_limit).await {
            Ok(records) => {
                let applied = store.merge(records);
                trace!(context = %context_id, applied, "store merged; notifying views");
                // Reconciling -> NotifyingViews.
                views.notify_and_render(&signal).await;
            }
            Err(e) => {
                // Previous store contents stay visible: stale-but-present
                // over blank. Dropping the marker re-arms the stats poller,
                // which otherwise would not fire again until the server
                // marker moves a second time.
                counter!("sync_reconcile_failures_total").increment(1);
                cache.forget_remote_marker();
                warn!(
                    context = %context_id,
                    kind = e.kind(),
                    error = %e,
                    "reconciliation refetch failed; keeping previous articles"
                );
            }
        }

        // NotifyingViews -> Idle.
        done_tx.send_modify(|c| *c += 1);
    }
}
