// src/article.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Publication status of an article. Only `Published` records are eligible
/// for display; `Deleted` records stay retrievable by id for audit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArticleStatus {
    Draft,
    Published,
    Deleted,
}

impl Default for ArticleStatus {
    fn default() -> Self {
        ArticleStatus::Draft
    }
}

/// One news item, shared wire shape across all source adapters.
///
/// Field names follow the remote API (camelCase). Optional display fields
/// fall back to defined placeholder values at render time, never here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleRecord {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient_status")]
    pub status: ArticleStatus,
    /// Provenance tag: which adapter produced this record. UI badge only.
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
    /// Legacy flag still emitted by older writers; any truthy value means
    /// the record is soft-deleted.
    #[serde(default)]
    pub is_deleted: bool,
}

impl ArticleRecord {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: None,
            category: None,
            content: None,
            author: None,
            created_at: Utc::now(),
            updated_at: None,
            status: ArticleStatus::Draft,
            source: None,
            deleted_at: None,
            is_deleted: false,
        }
    }

    /// Sort and staleness key: `updated_at` when present, else `created_at`.
    pub fn effective_date(&self) -> DateTime<Utc> {
        self.updated_at.unwrap_or(self.created_at)
    }

    pub fn is_soft_deleted(&self) -> bool {
        self.status == ArticleStatus::Deleted || self.is_deleted || self.deleted_at.is_some()
    }

    /// Eligible for listing output: published and not soft-deleted.
    pub fn is_listable(&self) -> bool {
        self.status == ArticleStatus::Published && !self.is_soft_deleted()
    }

    pub fn display_title(&self) -> &str {
        non_blank(self.title.as_deref()).unwrap_or("untitled")
    }

    pub fn display_category(&self) -> &str {
        non_blank(self.category.as_deref()).unwrap_or("notice")
    }

    pub fn display_author(&self) -> &str {
        non_blank(self.author.as_deref()).unwrap_or("JSA Secretariat")
    }

    pub fn display_content(&self) -> &str {
        self.content.as_deref().unwrap_or("")
    }
}

fn non_blank(s: Option<&str>) -> Option<&str> {
    s.map(str::trim).filter(|t| !t.is_empty())
}

/// Tolerate unknown or non-string status values from older writers by
/// mapping them to `Draft` instead of failing the whole payload.
fn lenient_status<'de, D>(de: D) -> Result<ArticleStatus, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = serde_json::Value::deserialize(de)?;
    Ok(match raw.as_str().map(str::to_ascii_lowercase).as_deref() {
        Some("published") => ArticleStatus::Published,
        Some("deleted") => ArticleStatus::Deleted,
        _ => ArticleStatus::Draft,
    })
}
