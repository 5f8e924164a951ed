// src/config.rs
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

const ENV_PATH: &str = "SYNC_CONFIG_PATH";
const DEFAULT_PATH: &str = "config/sync.toml";

/// Tuning knobs for one sync context. The timing constants are
/// representative defaults, not load-bearing contracts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Base URL of the hosted article API.
    pub api_base: String,
    pub cache_ttl_secs: u64,
    pub poll_interval_secs: u64,
    /// Minimum spacing between two stats-marker checks, whatever triggered
    /// them.
    pub min_recheck_secs: u64,
    /// Background worker polls on a longer interval than the foreground.
    pub worker_poll_secs: u64,
    pub snapshot_path: String,
    pub channel_name: String,
    /// 0 = fetch everything the winning adapter has.
    pub default_fetch_limit: usize,
    /// Fall through to the embedded dataset when the chain is exhausted.
    pub fallback_on_failure: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            api_base: "https://asia-northeast1-jaa-hp.cloudfunctions.net".to_string(),
            cache_ttl_secs: 5 * 60,
            poll_interval_secs: 60,
            min_recheck_secs: 30,
            worker_poll_secs: 5 * 60,
            snapshot_path: "state/articles.json".to_string(),
            channel_name: "article-sync".to_string(),
            default_fetch_limit: 0,
            fallback_on_failure: true,
        }
    }
}

impl SyncConfig {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn min_recheck_spacing(&self) -> Duration {
        Duration::from_secs(self.min_recheck_secs)
    }

    pub fn worker_poll_interval(&self) -> Duration {
        Duration::from_secs(self.worker_poll_secs)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading sync config from {}", path.display()))?;
        let cfg: SyncConfig = toml::from_str(&content)
            .with_context(|| format!("parsing sync config {}", path.display()))?;
        Ok(cfg.with_env_overrides())
    }

    /// Load order: $SYNC_CONFIG_PATH, then config/sync.toml, then built-in
    /// defaults. Env overrides apply on top in every case.
    pub fn load_default() -> Result<Self> {
        if let Ok(p) = std::env::var(ENV_PATH) {
            let pb = std::path::PathBuf::from(p);
            if pb.exists() {
                return Self::load_from(&pb);
            }
            anyhow::bail!("SYNC_CONFIG_PATH points to non-existent path");
        }
        let default_p = std::path::PathBuf::from(DEFAULT_PATH);
        if default_p.exists() {
            return Self::load_from(&default_p);
        }
        Ok(Self::default().with_env_overrides())
    }

    fn with_env_overrides(mut self) -> Self {
        if let Ok(v) = std::env::var("SYNC_API_BASE") {
            if !v.trim().is_empty() {
                self.api_base = v;
            }
        }
        if let Some(v) = env_u64("SYNC_CACHE_TTL_SECS") {
            self.cache_ttl_secs = v;
        }
        if let Some(v) = env_u64("SYNC_POLL_SECS") {
            self.poll_interval_secs = v;
        }
        if let Some(v) = env_u64("SYNC_MIN_RECHECK_SECS") {
            self.min_recheck_secs = v;
        }
        if let Ok(v) = std::env::var("SYNC_SNAPSHOT_PATH") {
            if !v.trim().is_empty() {
                self.snapshot_path = v;
            }
        }
        self
    }
}

fn env_u64(key: &str) -> Option<u64> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_timing_constants() {
        let cfg = SyncConfig::default();
        assert_eq!(cfg.cache_ttl(), Duration::from_secs(300));
        assert_eq!(cfg.poll_interval(), Duration::from_secs(60));
        assert_eq!(cfg.min_recheck_spacing(), Duration::from_secs(30));
    }
}
