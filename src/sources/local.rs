// src/sources/local.rs
//! Persisted local snapshot: a single named JSON file holding the article
//! array, shared by every context on the same host profile.
//!
//! Writes pulse a watch channel that other contexts use purely as a wake-up
//! signal (the payload is never trusted as truth; receivers refetch).

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tokio::{fs, sync::watch};

use crate::article::ArticleRecord;
use crate::error::FetchError;
use crate::sources::types::SourceAdapter;

/// Wake-up pulse emitted after each snapshot write. `origin` lets the
/// writing context ignore its own pulse.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoragePulse {
    pub seq: u64,
    pub origin: String,
}

pub struct LocalSnapshotStore {
    path: PathBuf,
    tx: watch::Sender<StoragePulse>,
}

impl LocalSnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let (tx, _) = watch::channel(StoragePulse::default());
        Self {
            path: path.into(),
            tx,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn subscribe(&self) -> watch::Receiver<StoragePulse> {
        self.tx.subscribe()
    }

    /// Missing or unreadable snapshot reads as empty; a corrupt one is an
    /// error the caller logs and falls through.
    pub async fn read(&self) -> Result<Vec<ArticleRecord>> {
        match fs::read_to_string(&self.path).await {
            Ok(s) if s.trim().is_empty() => Ok(Vec::new()),
            Ok(s) => serde_json::from_str(&s)
                .with_context(|| format!("parsing snapshot {}", self.path.display())),
            Err(_) => Ok(Vec::new()),
        }
    }

    /// Replace the snapshot and pulse the wake-up channel.
    pub async fn write(&self, records: &[ArticleRecord], origin: &str) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)
                .await
                .with_context(|| format!("creating snapshot dir {}", dir.display()))?;
        }
        let body = serde_json::to_vec_pretty(records).context("serializing snapshot")?;
        fs::write(&self.path, body)
            .await
            .with_context(|| format!("writing snapshot {}", self.path.display()))?;

        self.tx.send_modify(|p| {
            p.seq += 1;
            p.origin = origin.to_string();
        });
        Ok(())
    }
}

/// Read side of the snapshot, usable in an adapter chain.
pub struct LocalSnapshotAdapter {
    store: std::sync::Arc<LocalSnapshotStore>,
}

impl LocalSnapshotAdapter {
    pub fn new(store: std::sync::Arc<LocalSnapshotStore>) -> Self {
        Self { store }
    }
}

#[async_trait::async_trait]
impl SourceAdapter for LocalSnapshotAdapter {
    async fn fetch(&self, limit: usize) -> Result<Vec<ArticleRecord>, FetchError> {
        let mut records = self
            .store
            .read()
            .await
            .map_err(|e| FetchError::Parse(format!("{e:#}")))?;
        if records.is_empty() {
            // An absent snapshot should not short-circuit the chain.
            return Err(FetchError::Empty);
        }
        if limit > 0 {
            records.truncate(limit);
        }
        Ok(records)
    }

    fn name(&self) -> &'static str {
        "local-snapshot"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn write_then_read_round_trips_and_pulses() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalSnapshotStore::new(dir.path().join("articles.json"));
        let mut rx = store.subscribe();

        let records = vec![ArticleRecord::new("a"), ArticleRecord::new("b")];
        store.write(&records, "ctx-1").await.unwrap();

        assert_eq!(store.read().await.unwrap().len(), 2);
        rx.changed().await.unwrap();
        let pulse = rx.borrow().clone();
        assert_eq!(pulse.seq, 1);
        assert_eq!(pulse.origin, "ctx-1");
    }

    #[tokio::test]
    async fn missing_snapshot_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalSnapshotStore::new(dir.path().join("nothing.json"));
        assert!(store.read().await.unwrap().is_empty());
    }
}
