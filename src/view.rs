// src/view.rs
//! View binding: projects the article store into named display regions and
//! re-renders them on update notifications.
//!
//! Rendering here means producing a [`RegionState`] projection; turning that
//! into markup is the page shell's job.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use once_cell::sync::OnceCell;
use tracing::{debug, warn};

use crate::article::ArticleRecord;
use crate::cache::{CacheKey, CacheLayer};
use crate::propagate::{UpdateAction, UpdateSignal};
use crate::sources::embedded::EmbeddedAdapter;
use crate::sources::AdapterChain;
use crate::store::{ArticleStore, ListFilter};

/// Literal shown for a region with zero eligible records. An empty result
/// is an explicit state, never an error.
pub const EMPTY_MESSAGE: &str = "no published items";

/// Display projection of one article.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedItem {
    pub id: String,
    pub title: String,
    pub category_badge: String,
    pub date_label: String,
    pub link: String,
    pub source_badge: Option<String>,
    pub excerpt: String,
}

impl RenderedItem {
    pub fn project(record: &ArticleRecord) -> Self {
        Self {
            id: record.id.clone(),
            title: record.display_title().to_string(),
            category_badge: record.display_category().to_string(),
            date_label: record.effective_date().format("%Y.%m.%d").to_string(),
            link: format!("news-detail.html?id={}", record.id),
            source_badge: record.source.clone(),
            excerpt: excerpt(record.display_content(), 120),
        }
    }
}

/// What a display region currently shows.
#[derive(Debug, Clone, PartialEq)]
pub enum RegionState {
    Loading,
    List(Vec<RenderedItem>),
    /// Zero eligible records; render [`EMPTY_MESSAGE`].
    Empty,
    /// Chain exhaustion. Always offers a retry affordance; optionally the
    /// embedded fallback dataset so the region is never left blank.
    Failed {
        retry: bool,
        fallback: Option<Vec<RenderedItem>>,
    },
}

/// Where region states land. Regions are "exists or does not": a sink may
/// ignore ids it does not know.
pub trait RegionSink: Send + Sync {
    fn apply(&self, region_id: &str, state: RegionState);
}

#[derive(Debug, Clone)]
pub struct RegionSpec {
    /// 0 = unbounded.
    pub max_items: usize,
    pub filter: ListFilter,
}

impl RegionSpec {
    pub fn with_max(max_items: usize) -> Self {
        Self {
            max_items,
            filter: ListFilter::default(),
        }
    }
}

type UpdateCallback = Box<dyn Fn(UpdateAction, Option<&str>, Option<&ArticleRecord>) + Send + Sync>;

/// Consumer id → update callback. Entries come and go with region mounts;
/// external consumers (toasts, badges) may register their own.
#[derive(Default)]
pub struct SubscriptionRegistry {
    inner: Mutex<HashMap<String, UpdateCallback>>,
}

impl SubscriptionRegistry {
    pub fn register(
        &self,
        consumer_id: impl Into<String>,
        callback: impl Fn(UpdateAction, Option<&str>, Option<&ArticleRecord>) + Send + Sync + 'static,
    ) {
        let mut map = self.inner.lock().expect("registry mutex poisoned");
        map.insert(consumer_id.into(), Box::new(callback));
    }

    pub fn unregister(&self, consumer_id: &str) {
        let mut map = self.inner.lock().expect("registry mutex poisoned");
        map.remove(consumer_id);
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("registry mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn notify_all(
        &self,
        action: UpdateAction,
        article_id: Option<&str>,
        record: Option<&ArticleRecord>,
    ) {
        let map = self.inner.lock().expect("registry mutex poisoned");
        for cb in map.values() {
            cb(action, article_id, record);
        }
    }
}

pub struct ViewBinder {
    store: Arc<ArticleStore>,
    cache: Arc<CacheLayer>,
    chain: Arc<AdapterChain>,
    sink: Arc<dyn RegionSink>,
    registry: SubscriptionRegistry,
    regions: Mutex<HashMap<String, RegionSpec>>,
    /// Fall through to the embedded dataset when the chain is exhausted.
    fallback_on_failure: bool,
}

impl ViewBinder {
    pub fn new(
        store: Arc<ArticleStore>,
        cache: Arc<CacheLayer>,
        chain: Arc<AdapterChain>,
        sink: Arc<dyn RegionSink>,
        fallback_on_failure: bool,
    ) -> Self {
        Self {
            store,
            cache,
            chain,
            sink,
            registry: SubscriptionRegistry::default(),
            regions: Mutex::new(HashMap::new()),
            fallback_on_failure,
        }
    }

    pub fn registry(&self) -> &SubscriptionRegistry {
        &self.registry
    }

    pub fn mounted_regions(&self) -> Vec<String> {
        let map = self.regions.lock().expect("regions mutex poisoned");
        map.keys().cloned().collect()
    }

    /// Register the region and perform its first render through the cache.
    pub async fn mount(&self, region_id: &str, spec: RegionSpec) {
        {
            let mut map = self.regions.lock().expect("regions mutex poisoned");
            map.insert(region_id.to_string(), spec.clone());
        }
        let id = region_id.to_string();
        self.registry.register(region_id, move |action, article_id, _| {
            debug!(region = %id, ?action, article_id = article_id.unwrap_or("-"), "region notified");
        });

        self.sink.apply(region_id, RegionState::Loading);

        let key = CacheKey::new(region_id, spec.max_items);
        match self
            .cache
            .get_or_fetch(&key, &spec.filter, &self.chain, &self.store, false)
            .await
        {
            Ok(data) => self.sink.apply(region_id, Self::project(&data)),
            Err(e) => {
                warn!(region = region_id, kind = e.kind(), error = %e, "first render failed");
                self.sink.apply(region_id, self.failure_state(spec.max_items));
            }
        }
    }

    pub fn unmount(&self, region_id: &str) {
        let mut map = self.regions.lock().expect("regions mutex poisoned");
        map.remove(region_id);
        drop(map);
        self.registry.unregister(region_id);
    }

    /// Re-render one region from current store contents. Unknown regions
    /// are a warn-level no-op.
    pub async fn render(&self, region_id: &str) {
        let spec = {
            let map = self.regions.lock().expect("regions mutex poisoned");
            map.get(region_id).cloned()
        };
        let Some(spec) = spec else {
            warn!(region = region_id, "render target region is not mounted");
            return;
        };

        let mut filter = spec.filter.clone();
        filter.limit = None;
        let mut data = self.store.list(&filter);
        if spec.max_items > 0 {
            data.truncate(spec.max_items);
        }
        self.sink.apply(region_id, Self::project(&data));
    }

    pub async fn render_all(&self) {
        let ids = self.mounted_regions();
        for id in ids {
            self.render(&id).await;
        }
    }

    /// Notification pass driven by update propagation: tell subscribers,
    /// then re-render every mounted region.
    pub async fn notify_and_render(&self, signal: &UpdateSignal) {
        self.registry.notify_all(
            signal.action,
            signal.article_id.as_deref(),
            signal.article.as_ref(),
        );
        self.render_all().await;
    }

    fn project(data: &[ArticleRecord]) -> RegionState {
        if data.is_empty() {
            RegionState::Empty
        } else {
            RegionState::List(data.iter().map(RenderedItem::project).collect())
        }
    }

    fn failure_state(&self, max_items: usize) -> RegionState {
        let fallback = if self.fallback_on_failure {
            let items = EmbeddedAdapter::dataset(max_items)
                .iter()
                .map(RenderedItem::project)
                .collect();
            Some(items)
        } else {
            None
        };
        RegionState::Failed {
            retry: true,
            fallback,
        }
    }
}

/// Strip tags and entities, collapse whitespace, cap at `max_chars`.
/// Tags go first: decoding first would turn an encoded `&lt;` into a `<`
/// that the tag regex then eats along with the following text.
pub fn excerpt(html: &str, max_chars: usize) -> String {
    static RE_TAGS: OnceCell<regex::Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[^>]+>").unwrap());
    let stripped = re_tags.replace_all(html, " ");

    let decoded = html_escape::decode_html_entities(stripped.as_ref()).to_string();

    static RE_WS: OnceCell<regex::Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").unwrap());
    let mut out = re_ws.replace_all(&decoded, " ").trim().to_string();

    if out.chars().count() > max_chars {
        out = out.chars().take(max_chars).collect();
        out.push('…');
    }
    out
}
