//! In-memory storage implementation for testing and development.
//!
//! Mirrors the Postgres backend's semantics, including unique-URL
//! recovery: creating a source for an already-claimed URL returns the
//! existing row instead of erroring.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;
use uuid::Uuid;

use crate::error::StoreResult;
use crate::traits::geocoder::GeocodeHit;
use crate::traits::store::IncidentStore;
use crate::types::extraction::QuotedEvidence;
use crate::types::incident::{IncidentPatch, IncidentRecord, SarSegment};
use crate::types::source::{NewSource, SourceDocument, SourceMetaPatch, SourceRef};

/// In-memory incident store. Not suitable for production: data is lost on
/// restart.
#[derive(Default)]
pub struct MemoryStore {
    incidents: RwLock<HashMap<Uuid, IncidentRecord>>,
    sources: RwLock<HashMap<Uuid, SourceDocument>>,
    source_by_url: RwLock<HashMap<String, Uuid>>,
    sar: RwLock<HashMap<Uuid, Vec<SarSegment>>>,
}

impl MemoryStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of incident records.
    pub fn incident_count(&self) -> usize {
        self.incidents.read().unwrap().len()
    }

    /// Number of source documents.
    pub fn source_count(&self) -> usize {
        self.sources.read().unwrap().len()
    }
}

#[async_trait]
impl IncidentStore for MemoryStore {
    async fn get_source_by_url(&self, url: &str) -> StoreResult<Option<SourceRef>> {
        let by_url = self.source_by_url.read().unwrap();
        let sources = self.sources.read().unwrap();
        Ok(by_url.get(url).and_then(|id| {
            sources.get(id).map(|s| SourceRef {
                source_id: s.source_id,
                event_id: s.event_id,
            })
        }))
    }

    async fn create_incident(&self) -> StoreResult<IncidentRecord> {
        let record = IncidentRecord::new(Uuid::new_v4());
        self.incidents
            .write()
            .unwrap()
            .insert(record.event_id, record.clone());
        Ok(record)
    }

    async fn create_source(&self, source: NewSource) -> StoreResult<SourceDocument> {
        let mut by_url = self.source_by_url.write().unwrap();
        let mut sources = self.sources.write().unwrap();

        // Unique-URL guard: the first writer wins, later writers get the
        // winner's row back.
        if let Some(existing_id) = by_url.get(&source.url) {
            if let Some(existing) = sources.get(existing_id) {
                return Ok(existing.clone());
            }
        }

        let document = SourceDocument {
            source_id: Uuid::new_v4(),
            event_id: source.event_id,
            url: source.url.clone(),
            publisher: source.publisher,
            article_title: source.article_title,
            date_published: source.date_published,
            cleaned_text: source.cleaned_text,
            quoted_evidence: None,
            summary_bullets: None,
            date_scraped: source.date_scraped,
        };
        by_url.insert(source.url, document.source_id);
        sources.insert(document.source_id, document.clone());
        Ok(document)
    }

    async fn get_incident(&self, event_id: Uuid) -> StoreResult<Option<IncidentRecord>> {
        Ok(self.incidents.read().unwrap().get(&event_id).cloned())
    }

    async fn sources_for_incident(&self, event_id: Uuid) -> StoreResult<Vec<SourceDocument>> {
        let mut sources: Vec<SourceDocument> = self
            .sources
            .read()
            .unwrap()
            .values()
            .filter(|s| s.event_id == event_id)
            .cloned()
            .collect();
        // Most recently published first, undated last
        sources.sort_by(|a, b| match (a.date_published, b.date_published) {
            (Some(x), Some(y)) => y.cmp(&x),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => std::cmp::Ordering::Equal,
        });
        Ok(sources)
    }

    async fn update_incident(&self, event_id: Uuid, patch: &IncidentPatch) -> StoreResult<()> {
        if let Some(record) = self.incidents.write().unwrap().get_mut(&event_id) {
            patch.apply(record);
        }
        Ok(())
    }

    async fn update_source_annotations(
        &self,
        source_id: Uuid,
        quoted_evidence: Option<&QuotedEvidence>,
        summary_bullets: Option<&[String]>,
    ) -> StoreResult<()> {
        if let Some(source) = self.sources.write().unwrap().get_mut(&source_id) {
            if let Some(evidence) = quoted_evidence {
                source.quoted_evidence = Some(evidence.clone());
            }
            if let Some(bullets) = summary_bullets {
                source.summary_bullets = Some(bullets.to_vec());
            }
        }
        Ok(())
    }

    async fn update_source_metadata(
        &self,
        source_id: Uuid,
        patch: &SourceMetaPatch,
    ) -> StoreResult<()> {
        if let Some(source) = self.sources.write().unwrap().get_mut(&source_id) {
            if let Some(publisher) = &patch.publisher {
                source.publisher = Some(publisher.clone());
            }
            if let Some(title) = &patch.article_title {
                source.article_title = Some(title.clone());
            }
            if let Some(date) = patch.date_published {
                source.date_published = Some(date);
            }
        }
        Ok(())
    }

    async fn replace_sar_segments(
        &self,
        event_id: Uuid,
        segments: &[SarSegment],
    ) -> StoreResult<()> {
        self.sar
            .write()
            .unwrap()
            .insert(event_id, segments.to_vec());
        Ok(())
    }

    async fn sar_segments(&self, event_id: Uuid) -> StoreResult<Vec<SarSegment>> {
        Ok(self
            .sar
            .read()
            .unwrap()
            .get(&event_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn set_geocode(
        &self,
        event_id: Uuid,
        hit: &GeocodeHit,
        tz_local: Option<&str>,
    ) -> StoreResult<()> {
        if let Some(record) = self.incidents.write().unwrap().get_mut(&event_id) {
            record.lat = Some(hit.lat);
            record.lon = Some(hit.lon);
            // Fill, never overwrite, the jurisdiction-derived metadata
            if record.iso_country.is_none() {
                record.iso_country = hit.iso_country.clone();
            }
            if record.admin_area.is_none() {
                record.admin_area = hit.admin_area.clone();
            }
            if record.tz_local.is_none() {
                record.tz_local = tz_local.map(str::to_string);
            }
        }
        Ok(())
    }
}
