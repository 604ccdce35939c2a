//! Source documents: one fetched and cleaned article per canonical URL.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::extraction::QuotedEvidence;

/// One fetched/cleaned article. Identity is the canonical URL (unique);
/// immutable once persisted except for metadata corrections.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceDocument {
    pub source_id: Uuid,
    pub event_id: Uuid,
    pub url: String,
    pub publisher: Option<String>,
    pub article_title: Option<String>,
    pub date_published: Option<NaiveDate>,
    pub cleaned_text: Option<String>,
    pub quoted_evidence: Option<QuotedEvidence>,
    pub summary_bullets: Option<Vec<String>>,
    pub date_scraped: Option<DateTime<Utc>>,
}

/// Fields for creating a source document.
#[derive(Debug, Clone, Default)]
pub struct NewSource {
    pub event_id: Uuid,
    pub url: String,
    pub publisher: Option<String>,
    pub article_title: Option<String>,
    pub date_published: Option<NaiveDate>,
    pub cleaned_text: Option<String>,
    pub date_scraped: Option<DateTime<Utc>>,
}

impl NewSource {
    /// Create a new source for an event and URL.
    pub fn new(event_id: Uuid, url: impl Into<String>) -> Self {
        Self {
            event_id,
            url: url.into(),
            ..Default::default()
        }
    }
}

/// Identifiers of an existing source, returned by dedupe lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceRef {
    pub source_id: Uuid,
    pub event_id: Uuid,
}

/// Weak metadata recovered from HTML during cleaning.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WeakMetadata {
    pub title: Option<String>,
    pub author: Option<String>,
    pub published: Option<NaiveDate>,
}

/// Source-level metadata corrections proposed by a refinement pass.
///
/// Applied to the source document only, never to the incident record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceMetaPatch {
    pub publisher: Option<String>,
    pub article_title: Option<String>,
    pub date_published: Option<NaiveDate>,
}

impl SourceMetaPatch {
    /// True when the patch would change nothing.
    pub fn is_empty(&self) -> bool {
        self.publisher.is_none() && self.article_title.is_none() && self.date_published.is_none()
    }
}
