// src/sources/embedded.rs
//! Embedded fallback dataset, compiled into the binary.
//!
//! This adapter never fails, so any chain that ends with it terminates with
//! something renderable ("never blank unless truly empty").

use once_cell::sync::Lazy;

use crate::article::ArticleRecord;
use crate::error::FetchError;
use crate::sources::types::SourceAdapter;

static FALLBACK_ARTICLES: Lazy<Vec<ArticleRecord>> = Lazy::new(|| {
    serde_json::from_str(include_str!("fallback_articles.json"))
        .expect("embedded fallback dataset must parse")
});

#[derive(Debug, Default)]
pub struct EmbeddedAdapter;

impl EmbeddedAdapter {
    pub fn new() -> Self {
        Self
    }

    /// Synchronous access for views that need the fixed dataset as a
    /// failure fall-through.
    pub fn dataset(limit: usize) -> Vec<ArticleRecord> {
        let mut out = FALLBACK_ARTICLES.clone();
        if limit > 0 {
            out.truncate(limit);
        }
        out
    }
}

#[async_trait::async_trait]
impl SourceAdapter for EmbeddedAdapter {
    async fn fetch(&self, limit: usize) -> Result<Vec<ArticleRecord>, FetchError> {
        Ok(Self::dataset(limit))
    }

    fn name(&self) -> &'static str {
        "embedded"
    }
}
