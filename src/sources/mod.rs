// src/sources/mod.rs
pub mod embedded;
pub mod local;
pub mod remote;
pub mod types;

use metrics::{counter, describe_counter};
use once_cell::sync::OnceCell;
use tracing::warn;

use crate::article::ArticleRecord;
use crate::error::FetchError;
use crate::sources::types::SourceAdapter;

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("sync_fetch_errors_total", "Adapter fetch failures by kind.");
        describe_counter!(
            "sync_chain_fallbacks_total",
            "Fetches answered by a non-first adapter."
        );
        describe_counter!(
            "sync_chain_exhausted_total",
            "Fetches where every adapter failed."
        );
    });
}

/// Ordered fallback chain over source adapters. The first adapter to
/// succeed short-circuits; failures are logged at the point of occurrence
/// and never propagate past the chain. Exhaustion is the only hard failure.
pub struct AdapterChain {
    adapters: Vec<Box<dyn SourceAdapter>>,
}

impl AdapterChain {
    pub fn new() -> Self {
        ensure_metrics_described();
        Self {
            adapters: Vec::new(),
        }
    }

    pub fn push(mut self, adapter: impl SourceAdapter + 'static) -> Self {
        self.adapters.push(Box::new(adapter));
        self
    }

    pub fn push_boxed(mut self, adapter: Box<dyn SourceAdapter>) -> Self {
        self.adapters.push(adapter);
        self
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }

    /// Try adapters in priority order; records from the winning adapter get
    /// its name stamped as their provenance tag.
    pub async fn fetch_first(&self, limit: usize) -> Result<Vec<ArticleRecord>, FetchError> {
        for (idx, adapter) in self.adapters.iter().enumerate() {
            match adapter.fetch(limit).await {
                Ok(mut records) => {
                    if idx > 0 {
                        counter!("sync_chain_fallbacks_total").increment(1);
                    }
                    for r in &mut records {
                        r.source = Some(adapter.name().to_string());
                    }
                    return Ok(records);
                }
                Err(e) => {
                    counter!("sync_fetch_errors_total", "kind" => e.kind()).increment(1);
                    warn!(adapter = adapter.name(), kind = e.kind(), error = %e, "source adapter failed");
                }
            }
        }
        counter!("sync_chain_exhausted_total").increment(1);
        Err(FetchError::Exhausted)
    }
}

impl Default for AdapterChain {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Failing;

    #[async_trait::async_trait]
    impl SourceAdapter for Failing {
        async fn fetch(&self, _limit: usize) -> Result<Vec<ArticleRecord>, FetchError> {
            Err(FetchError::Network("connection refused".into()))
        }
        fn name(&self) -> &'static str {
            "failing"
        }
    }

    struct Fixed(Vec<ArticleRecord>);

    #[async_trait::async_trait]
    impl SourceAdapter for Fixed {
        async fn fetch(&self, _limit: usize) -> Result<Vec<ArticleRecord>, FetchError> {
            Ok(self.0.clone())
        }
        fn name(&self) -> &'static str {
            "fixed"
        }
    }

    #[tokio::test]
    async fn first_success_short_circuits_and_tags_provenance() {
        let chain = AdapterChain::new()
            .push(Failing)
            .push(Fixed(vec![ArticleRecord::new("a")]));
        let out = chain.fetch_first(0).await.unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].source.as_deref(), Some("fixed"));
    }

    #[tokio::test]
    async fn exhausted_chain_is_the_only_hard_failure() {
        let chain = AdapterChain::new().push(Failing).push(Failing);
        let err = chain.fetch_first(0).await.unwrap_err();
        assert!(matches!(err, FetchError::Exhausted));
    }
}
