// src/sources/remote.rs
//! Adapter for the hosted article API.
//!
//! Endpoints (all GET, JSON envelope `{success, data, error?}`):
//!   `<base>/getNews?limit=<n>&status=published`
//!   `<base>/getNewsById?id=<id>`
//!   `<base>/getNewsStats` → `{lastUpdated}` opaque comparable marker

use std::time::Duration;

use metrics::counter;
use serde::Deserialize;

use crate::article::ArticleRecord;
use crate::error::FetchError;
use crate::sources::types::SourceAdapter;

const PRIMARY_TIMEOUT: Duration = Duration::from_secs(10);
// The "fast" probe gives up quickly so the chain can move on.
const FAST_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    success: bool,
    #[serde(default = "none")]
    data: Option<T>,
    #[serde(default)]
    error: Option<String>,
}

fn none<T>() -> Option<T> {
    None
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewsStats {
    pub last_updated: serde_json::Value,
}

impl NewsStats {
    /// String form of the opaque marker, suitable for equality comparison.
    pub fn marker(&self) -> String {
        match &self.last_updated {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

pub struct RemoteApiAdapter {
    base: String,
    client: reqwest::Client,
    name: &'static str,
}

impl RemoteApiAdapter {
    /// Primary API adapter with the default timeout.
    pub fn new(base: impl Into<String>) -> Self {
        Self::with_timeout(base, "remote", PRIMARY_TIMEOUT)
    }

    /// Short-timeout variant tried ahead of the primary adapter: answers
    /// fast out of the server-side cache or not at all.
    pub fn fast(base: impl Into<String>) -> Self {
        Self::with_timeout(base, "remote-fast", FAST_TIMEOUT)
    }

    fn with_timeout(base: impl Into<String>, name: &'static str, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self {
            base: base.into().trim_end_matches('/').to_string(),
            client,
            name,
        }
    }

    async fn get_envelope<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
    ) -> Result<T, FetchError> {
        let resp = self.client.get(url).send().await.map_err(FetchError::from)?;
        let status = resp.status();
        if !status.is_success() {
            counter!("sync_fetch_errors_total", "adapter" => self.name).increment(1);
            return Err(FetchError::Http {
                status: status.as_u16(),
            });
        }
        let body = resp.text().await.map_err(FetchError::from)?;
        let env: Envelope<T> = serde_json::from_str(body.trim())?;
        if !env.success {
            return Err(FetchError::Api(
                env.error.unwrap_or_else(|| "unspecified api error".into()),
            ));
        }
        env.data.ok_or(FetchError::Empty)
    }

    pub async fn fetch_by_id(&self, id: &str) -> Result<ArticleRecord, FetchError> {
        let url = format!("{}/getNewsById?id={}", self.base, id);
        self.get_envelope(&url).await
    }

    pub async fn fetch_stats(&self) -> Result<NewsStats, FetchError> {
        let url = format!("{}/getNewsStats", self.base);
        self.get_envelope(&url).await
    }
}

#[async_trait::async_trait]
impl SourceAdapter for RemoteApiAdapter {
    async fn fetch(&self, limit: usize) -> Result<Vec<ArticleRecord>, FetchError> {
        let url = if limit > 0 {
            format!("{}/getNews?limit={}&status=published", self.base, limit)
        } else {
            format!("{}/getNews?status=published", self.base)
        };
        self.get_envelope(&url).await
    }

    fn name(&self) -> &'static str {
        self.name
    }
}
