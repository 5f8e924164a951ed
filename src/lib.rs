// src/lib.rs
// Public library surface for integration tests (and the demo binary).

pub mod article;
pub mod cache;
pub mod config;
pub mod context;
pub mod error;
pub mod propagate;
pub mod sources;
pub mod store;
pub mod view;

// Outbound collaborators (verification mail)
pub mod notify;

// ---- Re-exports for stable public API ----
pub use crate::article::{ArticleRecord, ArticleStatus};
pub use crate::cache::{CacheKey, CacheLayer};
pub use crate::config::SyncConfig;
pub use crate::context::{SyncContext, SyncContextBuilder};
pub use crate::error::FetchError;
pub use crate::propagate::{Transport, UpdateAction, UpdatePropagation, UpdateSignal};
pub use crate::sources::AdapterChain;
pub use crate::store::{ArticleStore, ListFilter};
pub use crate::view::{RegionSink, RegionSpec, RegionState, ViewBinder};
