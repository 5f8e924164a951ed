//! Demo binary: boots one sync context against the configured article API
//! and prints region states as they land.
//!
//! Run with `SYNC_API_BASE=... cargo run --bin sync_demo`.

use std::sync::Arc;

use article_sync::context::SyncContextBuilder;
use article_sync::propagate::transports::{spawn_background_worker, BroadcastHub};
use article_sync::sources::remote::RemoteApiAdapter;
use article_sync::view::{RegionSink, RegionSpec, RegionState};
use article_sync::SyncConfig;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

struct StdoutSink;

impl RegionSink for StdoutSink {
    fn apply(&self, region_id: &str, state: RegionState) {
        match state {
            RegionState::Loading => println!("[{region_id}] loading…"),
            RegionState::Empty => println!("[{region_id}] no published items"),
            RegionState::List(items) => {
                println!("[{region_id}] {} item(s):", items.len());
                for it in items {
                    println!("  {} {} [{}] {}", it.date_label, it.title, it.category_badge, it.link);
                }
            }
            RegionState::Failed { fallback, .. } => {
                println!(
                    "[{region_id}] fetch failed; fallback items: {}",
                    fallback.map(|f| f.len()).unwrap_or(0)
                );
            }
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("article_sync=info,warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();

    let config = SyncConfig::load_default()?;
    let hub = BroadcastHub::new(&config.channel_name);

    // Long-interval background poller, feeding the context over the worker
    // channel like a service worker would.
    let (worker_tx, worker_rx) = tokio::sync::mpsc::channel(8);
    let worker = spawn_background_worker(
        Arc::new(RemoteApiAdapter::new(&config.api_base)),
        config.worker_poll_interval(),
        worker_tx,
    );

    let ctx = SyncContextBuilder::new(config, Arc::new(StdoutSink))
        .with_hub(hub)
        .with_worker_channel(worker_rx)
        .build();

    ctx.views.mount("news-list-home", RegionSpec::with_max(5)).await;
    ctx.views.mount("news-list-all", RegionSpec::with_max(0)).await;

    let stats = ctx.store.stats();
    println!(
        "store: {} total, {} published, last updated {:?}",
        stats.total, stats.published, stats.last_updated
    );

    println!("watching for updates; ctrl-c to exit");
    tokio::signal::ctrl_c().await?;
    worker.abort();
    Ok(())
}
