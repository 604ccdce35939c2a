//! Persistence trait for incident records, source documents, and SAR
//! segments.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::StoreResult;
use crate::traits::geocoder::GeocodeHit;
use crate::types::extraction::QuotedEvidence;
use crate::types::incident::{IncidentPatch, IncidentRecord, SarSegment};
use crate::types::source::{NewSource, SourceDocument, SourceMetaPatch, SourceRef};

/// Persistence collaborator, keyed by canonical URL for dedupe.
///
/// # Concurrency
///
/// The only concurrency hazard is the unique-URL constraint on sources: a
/// race between two workers ingesting the same URL must be resolved inside
/// `create_source` by returning the winner's row instead of an error.
#[async_trait]
pub trait IncidentStore: Send + Sync {
    /// Look up an existing source by its canonical URL.
    async fn get_source_by_url(&self, url: &str) -> StoreResult<Option<SourceRef>>;

    /// Create a fresh incident record (jurisdiction unset).
    async fn create_incident(&self) -> StoreResult<IncidentRecord>;

    /// Create a source document. Idempotent on the unique URL: when a
    /// concurrent insert wins the race, the winner's row is returned.
    async fn create_source(&self, source: NewSource) -> StoreResult<SourceDocument>;

    /// Fetch one incident record.
    async fn get_incident(&self, event_id: Uuid) -> StoreResult<Option<IncidentRecord>>;

    /// All sources of an incident, most recently published first
    /// (undated sources last).
    async fn sources_for_incident(&self, event_id: Uuid) -> StoreResult<Vec<SourceDocument>>;

    /// Apply a partial field update to an incident.
    async fn update_incident(&self, event_id: Uuid, patch: &IncidentPatch) -> StoreResult<()>;

    /// Store per-field evidence quotes and summary bullets on a source.
    async fn update_source_annotations(
        &self,
        source_id: Uuid,
        quoted_evidence: Option<&QuotedEvidence>,
        summary_bullets: Option<&[String]>,
    ) -> StoreResult<()>;

    /// Apply refined source-level metadata corrections.
    async fn update_source_metadata(
        &self,
        source_id: Uuid,
        patch: &SourceMetaPatch,
    ) -> StoreResult<()>;

    /// Replace the full SAR segment set for an incident
    /// (delete-then-insert, never append).
    async fn replace_sar_segments(
        &self,
        event_id: Uuid,
        segments: &[SarSegment],
    ) -> StoreResult<()>;

    /// All SAR segments for an incident.
    async fn sar_segments(&self, event_id: Uuid) -> StoreResult<Vec<SarSegment>>;

    /// Record a geocoding hit: coordinates are updated, while country,
    /// admin area, and timezone are only filled where currently missing.
    async fn set_geocode(
        &self,
        event_id: Uuid,
        hit: &GeocodeHit,
        tz_local: Option<&str>,
    ) -> StoreResult<()>;
}
