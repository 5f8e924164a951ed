// src/sources/types.rs
use crate::article::ArticleRecord;
use crate::error::FetchError;

/// One article origin. `limit == 0` means "everything the source has".
///
/// Implementations must be infallible about panics: failures come back as
/// [`FetchError`] so the chain can fall through.
#[async_trait::async_trait]
pub trait SourceAdapter: Send + Sync {
    async fn fetch(&self, limit: usize) -> Result<Vec<ArticleRecord>, FetchError>;
    fn name(&self) -> &'static str;
}
