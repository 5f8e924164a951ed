// src/propagate/transports.rs
//! Transport adapters. Each one listens on its channel, normalizes the
//! payload into an [`UpdateSignal`], and calls
//! [`UpdatePropagation::on_external_signal`], nothing else.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use crate::article::ArticleRecord;
use crate::cache::CacheLayer;
use crate::propagate::{Transport, UpdateAction, UpdatePropagation, UpdateSignal};
use crate::sources::local::StoragePulse;
use crate::sources::remote::RemoteApiAdapter;

/// Cross-context article-update message, mirroring the named broadcast
/// channel contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleUpdateMessage {
    #[serde(rename = "type")]
    pub kind: String,
    pub action: UpdateAction,
    pub article_id: Option<String>,
    pub article_data: Option<ArticleRecord>,
    pub timestamp: DateTime<Utc>,
    /// Context id of the sender; receivers drop their own messages.
    pub source: String,
}

impl ArticleUpdateMessage {
    pub fn new(
        action: UpdateAction,
        article_id: Option<String>,
        article_data: Option<ArticleRecord>,
        source: impl Into<String>,
    ) -> Self {
        Self {
            kind: "ARTICLE_UPDATE".to_string(),
            action,
            article_id,
            article_data,
            timestamp: Utc::now(),
            source: source.into(),
        }
    }
}

/// Named channel shared by every context in a process, standing in for a
/// cross-tab broadcast channel.
#[derive(Clone)]
pub struct BroadcastHub {
    name: String,
    tx: broadcast::Sender<ArticleUpdateMessage>,
}

impl BroadcastHub {
    pub fn new(name: impl Into<String>) -> Self {
        let (tx, _) = broadcast::channel(64);
        Self {
            name: name.into(),
            tx,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// No receivers is fine: a lone tab broadcasts into the void.
    pub fn publish(&self, msg: ArticleUpdateMessage) {
        let receivers = self.tx.send(msg).unwrap_or(0);
        trace!(channel = %self.name, receivers, "article update broadcast");
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ArticleUpdateMessage> {
        self.tx.subscribe()
    }
}

/// Forward cross-context broadcasts into the propagation entry point.
/// Messages from this context's own id are dropped there.
pub fn spawn_broadcast_listener(
    hub: &BroadcastHub,
    prop: UpdatePropagation,
) -> JoinHandle<()> {
    let mut rx = hub.subscribe();
    let channel = hub.name().to_string();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(msg) => {
                    prop.on_external_signal(UpdateSignal {
                        action: msg.action,
                        article_id: msg.article_id,
                        article: msg.article_data,
                        timestamp: msg.timestamp,
                        origin: msg.source,
                        transport: Transport::Broadcast,
                    });
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    // Dropped messages are harmless: the next pass refetches
                    // current truth anyway.
                    debug!(channel = %channel, skipped = n, "broadcast listener lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

/// Watch the storage wake-up channel pulsed by snapshot writes. The pulse
/// carries no article data on purpose; it only says "go look".
pub fn spawn_storage_listener(
    mut rx: watch::Receiver<StoragePulse>,
    prop: UpdatePropagation,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while rx.changed().await.is_ok() {
            let pulse = rx.borrow().clone();
            if pulse.origin == prop.context_id() {
                trace!("ignoring own storage pulse");
                continue;
            }
            prop.on_external_signal(UpdateSignal::refresh(pulse.origin, Transport::Storage));
        }
    })
}

#[derive(Debug, Clone, Copy)]
pub struct StatsPollerCfg {
    pub interval: Duration,
    /// Lower bound between two marker checks, shared with the
    /// focus/visibility style triggers in the host shell.
    pub min_spacing: Duration,
}

impl Default for StatsPollerCfg {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            min_spacing: Duration::from_secs(30),
        }
    }
}

/// Poll the lightweight stats endpoint and compare the server's reported
/// "last updated" marker against the locally remembered one.
pub fn spawn_stats_poller(
    adapter: Arc<RemoteApiAdapter>,
    cache: Arc<CacheLayer>,
    prop: UpdatePropagation,
    cfg: StatsPollerCfg,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(cfg.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        let mut last_check: Option<tokio::time::Instant> = None;

        loop {
            ticker.tick().await;
            if last_check.is_some_and(|t| t.elapsed() < cfg.min_spacing) {
                continue;
            }
            last_check = Some(tokio::time::Instant::now());

            match adapter.fetch_stats().await {
                Ok(stats) => {
                    let marker = stats.marker();
                    let remembered = cache.remote_marker();
                    if remembered.as_deref() != Some(marker.as_str()) {
                        debug!(marker = %marker, "stats marker changed; triggering reconcile");
                        cache.set_remote_marker(marker);
                        prop.on_external_signal(UpdateSignal::refresh("", Transport::Poll));
                    }
                }
                Err(e) => {
                    // Poll failures are routine (offline tab); next tick retries.
                    debug!(kind = e.kind(), error = %e, "stats poll failed");
                }
            }
        }
    })
}

/// Message shape of the background worker channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum WorkerMessage {
    #[serde(rename = "NEWS_UPDATE_DETECTED")]
    NewsUpdateDetected {
        #[serde(default)]
        data: Option<serde_json::Value>,
        timestamp: DateTime<Utc>,
    },
    #[serde(rename = "FORCE_NEWS_REFRESH")]
    ForceNewsRefresh { timestamp: DateTime<Utc> },
}

/// Forward background-worker detections to the foreground entry point.
pub fn spawn_worker_listener(
    mut rx: mpsc::Receiver<WorkerMessage>,
    prop: UpdatePropagation,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            match msg {
                WorkerMessage::NewsUpdateDetected { timestamp, .. }
                | WorkerMessage::ForceNewsRefresh { timestamp } => {
                    let mut sig = UpdateSignal::refresh("", Transport::Worker);
                    sig.timestamp = timestamp;
                    prop.on_external_signal(sig);
                }
            }
        }
    })
}

/// Long-interval background poller standing in for the service-worker
/// process: it watches the stats marker on its own and forwards detections
/// over the worker channel.
pub fn spawn_background_worker(
    adapter: Arc<RemoteApiAdapter>,
    interval: Duration,
    tx: mpsc::Sender<WorkerMessage>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        let mut remembered: Option<String> = None;

        loop {
            ticker.tick().await;
            match adapter.fetch_stats().await {
                Ok(stats) => {
                    let marker = stats.marker();
                    if remembered.as_deref() != Some(marker.as_str()) {
                        remembered = Some(marker);
                        let msg = WorkerMessage::NewsUpdateDetected {
                            data: None,
                            timestamp: Utc::now(),
                        };
                        if tx.send(msg).await.is_err() {
                            // Foreground side is gone; stop polling.
                            break;
                        }
                    }
                }
                Err(e) => {
                    warn!(kind = e.kind(), error = %e, "background worker poll failed");
                }
            }
        }
    })
}
