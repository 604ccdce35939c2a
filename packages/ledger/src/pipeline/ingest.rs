//! The ingestion state machine.
//!
//! One accumulated state value is threaded through a fixed stage sequence:
//!
//! `fetch → dup_check → clean → extract → persist → augment → geocode`
//!
//! Entry is routed by which input is already available: raw text skips
//! fetch and clean, HTML skips fetch. `skipped` and `exists` are
//! first-class terminal states, not exceptions, and no stage retries.

use chrono::{NaiveDate, Utc};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{FetchError, Result};
use crate::extract;
use crate::fetch::canonicalize_url;
use crate::pipeline::merge::{merge, needs_augment};
use crate::traits::cleaner::Cleaner;
use crate::traits::fetcher::Fetcher;
use crate::traits::geocoder::Geocoder;
use crate::traits::refiner::{PublicationMeta, Refiner};
use crate::traits::store::IncidentStore;
use crate::types::config::LedgerConfig;
use crate::types::extraction::ExtractionResult;
use crate::types::incident::Jurisdiction;
use crate::types::source::{NewSource, SourceDocument, SourceRef};

/// Terminal status of one ingestion run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestStatus {
    /// A new incident and source were created.
    Created,
    /// The URL was already ingested; identifiers point at the existing rows.
    Exists,
    /// Policy or fetch failure; nothing was persisted.
    Skipped,
}

impl IngestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            IngestStatus::Created => "created",
            IngestStatus::Exists => "exists",
            IngestStatus::Skipped => "skipped",
        }
    }
}

/// Outcome of one ingestion run.
#[derive(Debug, Clone)]
pub struct IngestOutcome {
    pub status: IngestStatus,
    pub event_id: Option<Uuid>,
    pub source_id: Option<Uuid>,
    /// Skip reason, for `Skipped` outcomes.
    pub reason: Option<String>,
}

impl IngestOutcome {
    fn exists(existing: SourceRef) -> Self {
        Self {
            status: IngestStatus::Exists,
            event_id: Some(existing.event_id),
            source_id: Some(existing.source_id),
            reason: None,
        }
    }

    fn skipped(reason: impl Into<String>) -> Self {
        Self {
            status: IngestStatus::Skipped,
            event_id: None,
            source_id: None,
            reason: Some(reason.into()),
        }
    }
}

/// One ingestion request: a URL plus whatever inputs are already known.
#[derive(Debug, Clone, Default)]
pub struct IngestRequest {
    pub url: String,
    /// Raw HTML, when the fetch already happened upstream.
    pub html: Option<String>,
    /// Cleaned text, when both fetch and clean happened upstream.
    pub clean_text: Option<String>,
    pub publisher: Option<String>,
    pub article_title: Option<String>,
    pub date_published: Option<NaiveDate>,
}

impl IngestRequest {
    /// Ingest from a URL: the full pipeline.
    pub fn for_url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Ingest already-fetched HTML: skips the fetch stage.
    pub fn for_html(url: impl Into<String>, html: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            html: Some(html.into()),
            ..Default::default()
        }
    }

    /// Ingest already-cleaned text: skips fetch and clean.
    pub fn for_text(url: impl Into<String>, clean_text: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            clean_text: Some(clean_text.into()),
            ..Default::default()
        }
    }

    /// Set known publication metadata.
    pub fn with_publication(
        mut self,
        publisher: Option<String>,
        article_title: Option<String>,
        date_published: Option<NaiveDate>,
    ) -> Self {
        self.publisher = publisher;
        self.article_title = article_title;
        self.date_published = date_published;
        self
    }
}

/// Accumulated pipeline state, threaded through the stages.
struct IngestState {
    url: String,
    final_url: Option<String>,
    html: Option<String>,
    text_body: Option<String>,
    publisher: Option<String>,
    article_title: Option<String>,
    pub_date: Option<NaiveDate>,
    extracted: ExtractionResult,
    /// Geocode basis, refreshed by the augment stage when it runs.
    geo_peak: Option<String>,
    geo_location: Option<String>,
    geo_jurisdiction: Option<Jurisdiction>,
    event_id: Option<Uuid>,
    source_id: Option<Uuid>,
}

impl IngestState {
    fn new(url: String, request: IngestRequest) -> Self {
        Self {
            url,
            final_url: None,
            html: request.html,
            text_body: request.clean_text,
            publisher: request.publisher,
            article_title: request.article_title,
            pub_date: request.date_published,
            extracted: ExtractionResult::empty(),
            geo_peak: None,
            geo_location: None,
            geo_jurisdiction: None,
            event_id: None,
            source_id: None,
        }
    }

    fn best_url(&self) -> &str {
        self.final_url.as_deref().unwrap_or(&self.url)
    }
}

/// The ingestion pipeline over injected collaborators.
pub struct Pipeline<S: IncidentStore> {
    store: Arc<S>,
    fetcher: Arc<dyn Fetcher>,
    cleaner: Arc<dyn Cleaner>,
    refiner: Option<Arc<dyn Refiner>>,
    geocoder: Option<Arc<dyn Geocoder>>,
    config: LedgerConfig,
}

impl<S: IncidentStore> Pipeline<S> {
    /// Create a pipeline with the required collaborators.
    pub fn new(
        store: Arc<S>,
        fetcher: Arc<dyn Fetcher>,
        cleaner: Arc<dyn Cleaner>,
        config: LedgerConfig,
    ) -> Self {
        Self {
            store,
            fetcher,
            cleaner,
            refiner: None,
            geocoder: None,
            config,
        }
    }

    /// Wire the optional refiner.
    pub fn with_refiner(mut self, refiner: Arc<dyn Refiner>) -> Self {
        self.refiner = Some(refiner);
        self
    }

    /// Wire the optional geocoder.
    pub fn with_geocoder(mut self, geocoder: Arc<dyn Geocoder>) -> Self {
        self.geocoder = Some(geocoder);
        self
    }

    /// The store (for callers that need direct reads).
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Run the state machine for one request.
    ///
    /// Idempotent per URL: a second run for the same URL terminates in
    /// `Exists` with the first run's identifiers.
    pub async fn ingest(&self, request: IngestRequest) -> Result<IngestOutcome> {
        let canonical = canonicalize_url(&request.url);

        // Duplicate pre-check on the input URL, before any I/O.
        if let Some(existing) = self.store.get_source_by_url(&canonical).await? {
            debug!(url = %canonical, "duplicate input URL, short-circuiting");
            return Ok(IngestOutcome::exists(existing));
        }

        let mut state = IngestState::new(canonical, request);

        // Entry routing: have_text skips fetch+clean, have_html skips fetch.
        if state.text_body.is_none() && state.html.is_none() {
            if let Some(outcome) = self.fetch_stage(&mut state).await {
                return Ok(outcome);
            }
            // dup_check against the redirect-resolved URL
            if let Some(existing) = self.dup_check(&state).await? {
                info!(url = %state.best_url(), "redirect-resolved duplicate");
                return Ok(IngestOutcome::exists(existing));
            }
        }
        if state.text_body.is_none() {
            self.clean_stage(&mut state);
        }

        self.extract_stage(&mut state);

        if let Some(outcome) = self.persist_stage(&mut state).await? {
            return Ok(outcome);
        }
        self.augment_stage(&mut state).await;
        self.geocode_stage(&state).await;

        Ok(IngestOutcome {
            status: IngestStatus::Created,
            event_id: state.event_id,
            source_id: state.source_id,
            reason: None,
        })
    }

    /// fetch: robots-disallowed or any hard error terminates as `skipped`.
    /// No retries, no partial persistence — callers own retry policy.
    async fn fetch_stage(&self, state: &mut IngestState) -> Option<IngestOutcome> {
        match self.fetcher.fetch(&state.url).await {
            Ok(page) => {
                state.html = Some(page.html);
                state.final_url = Some(page.final_url);
                None
            }
            Err(FetchError::RobotsDisallowed { url }) => {
                warn!(url = %url, "fetch blocked by robots.txt");
                Some(IngestOutcome::skipped("robots_blocked"))
            }
            Err(e) => {
                warn!(url = %state.url, error = %e, "fetch failed");
                Some(IngestOutcome::skipped(e.to_string()))
            }
        }
    }

    async fn dup_check(&self, state: &IngestState) -> Result<Option<SourceRef>> {
        for url in [state.final_url.as_deref(), Some(state.url.as_str())]
            .into_iter()
            .flatten()
        {
            if let Some(existing) = self.store.get_source_by_url(url).await? {
                return Ok(Some(existing));
            }
        }
        Ok(None)
    }

    /// clean: HTML to text plus weak metadata; backfills a missing
    /// publication date.
    fn clean_stage(&self, state: &mut IngestState) {
        let html = state.html.as_deref().unwrap_or_default();
        let cleaned = self.cleaner.clean(html, Some(state.best_url()));
        state.text_body = Some(cleaned.text);
        if state.pub_date.is_none() {
            state.pub_date = cleaned.meta.published;
        }
        if state.article_title.is_none() {
            state.article_title = cleaned.meta.title;
        }
    }

    /// extract: the deterministic pass. Infallible; empty or malformed
    /// text degrades to an all-null result and the document still persists.
    fn extract_stage(&self, state: &mut IngestState) {
        let text = state.text_body.as_deref().unwrap_or_default();
        state.extracted = extract::extract(text, state.pub_date, &self.config.extractor);
        state.geo_peak = state.extracted.peak_name.clone();
        state.geo_location = state.extracted.location_name.clone();
        state.geo_jurisdiction = state.extracted.jurisdiction;
    }

    /// persist: create the incident (jurisdiction unset) and its source,
    /// then apply extracted fields, annotations, and SAR segments.
    ///
    /// Returns an early outcome only when the unique-URL race was lost,
    /// in which case the winner's identifiers are adopted.
    async fn persist_stage(&self, state: &mut IngestState) -> Result<Option<IngestOutcome>> {
        let record = self.store.create_incident().await?;

        let source = self
            .store
            .create_source(NewSource {
                event_id: record.event_id,
                url: state.best_url().to_string(),
                publisher: state.publisher.clone(),
                article_title: state.article_title.clone(),
                date_published: state.pub_date,
                cleaned_text: state.text_body.clone(),
                date_scraped: Some(Utc::now()),
            })
            .await?;

        if source.event_id != record.event_id {
            // Lost the unique-URL race: the winner's row came back.
            warn!(url = %state.best_url(), "concurrent ingest won the URL; adopting its rows");
            return Ok(Some(IngestOutcome::exists(SourceRef {
                source_id: source.source_id,
                event_id: source.event_id,
            })));
        }

        state.event_id = Some(record.event_id);
        state.source_id = Some(source.source_id);

        let extracted = &state.extracted;
        self.store
            .update_incident(record.event_id, &extracted.to_patch())
            .await?;
        self.store
            .update_source_annotations(
                source.source_id,
                (!extracted.quoted_evidence.is_empty()).then_some(&extracted.quoted_evidence),
                (!extracted.summary_bullets.is_empty())
                    .then_some(extracted.summary_bullets.as_slice()),
            )
            .await?;
        self.store
            .replace_sar_segments(record.event_id, &extracted.sar)
            .await?;

        info!(
            event_id = %record.event_id,
            source_id = %source.source_id,
            "persisted new incident"
        );
        Ok(None)
    }

    /// augment: optional LLM refinement over the combined context of all
    /// the incident's sources. Only runs when enabled, a refiner is wired,
    /// and a core field is still missing. Failures degrade to "no
    /// refinement this pass".
    async fn augment_stage(&self, state: &mut IngestState) {
        if !self.config.augment_enabled {
            return;
        }
        let Some(refiner) = &self.refiner else {
            return;
        };
        let Some(event_id) = state.event_id else {
            return;
        };

        if let Err(e) = self.try_augment(refiner.as_ref(), event_id, state).await {
            warn!(event_id = %event_id, error = %e, "augment failed; continuing without refinement");
        }
    }

    async fn try_augment(
        &self,
        refiner: &dyn Refiner,
        event_id: Uuid,
        state: &mut IngestState,
    ) -> Result<()> {
        let Some(record) = self.store.get_incident(event_id).await? else {
            return Ok(());
        };
        if !needs_augment(&record) {
            debug!(event_id = %event_id, "core fields complete, skipping augment");
            return Ok(());
        }

        let sources = self.store.sources_for_incident(event_id).await?;
        let Some(latest) = sources.first().cloned() else {
            return Ok(());
        };
        let (combined, meta) = build_context(&sources);
        if combined.is_empty() {
            return Ok(());
        }

        info!(
            event_id = %event_id,
            sources = sources.len(),
            context_len = combined.len(),
            "augmenting via refiner"
        );
        let payload = refiner.refine(&combined, &meta, &record).await?;
        let outcome = merge(&record, &payload);

        self.store.update_incident(event_id, &outcome.patch).await?;
        if outcome.summary_bullets.is_some() || !outcome.quoted_evidence.is_empty() {
            self.store
                .update_source_annotations(
                    latest.source_id,
                    (!outcome.quoted_evidence.is_empty()).then_some(&outcome.quoted_evidence),
                    outcome.summary_bullets.as_deref(),
                )
                .await?;
        }
        if !outcome.source_meta.is_empty() {
            self.store
                .update_source_metadata(latest.source_id, &outcome.source_meta)
                .await?;
        }
        if let Some(sar) = &outcome.sar {
            self.store.replace_sar_segments(event_id, sar).await?;
        }

        // Refresh the geocode basis with the merged fields.
        if outcome.patch.peak_name.is_some() {
            state.geo_peak = outcome.patch.peak_name.clone();
        }
        if outcome.patch.location_name.is_some() {
            state.geo_location = outcome.patch.location_name.clone();
        }
        if outcome.patch.jurisdiction.is_some() {
            state.geo_jurisdiction = outcome.patch.jurisdiction;
        }
        Ok(())
    }

    /// geocode: resolve a coordinate from peak/location plus jurisdiction
    /// hint; fill in country/admin-area/timezone without overwriting
    /// values already present. Failures are logged and swallowed.
    async fn geocode_stage(&self, state: &IngestState) {
        let Some(geocoder) = &self.geocoder else {
            return;
        };
        let Some(event_id) = state.event_id else {
            return;
        };
        let Some(query) = state.geo_peak.as_deref().or(state.geo_location.as_deref()) else {
            return;
        };

        match geocoder.geocode(query, state.geo_jurisdiction).await {
            Ok(Some(hit)) => {
                let tz = state.geo_jurisdiction.map(|j| j.timezone());
                if let Err(e) = self.store.set_geocode(event_id, &hit, tz).await {
                    warn!(event_id = %event_id, error = %e, "failed to store geocode");
                } else {
                    debug!(event_id = %event_id, lat = hit.lat, lon = hit.lon, "geocoded");
                }
            }
            Ok(None) => debug!(query = %query, "geocoder found nothing"),
            Err(e) => warn!(query = %query, error = %e, "geocode failed; continuing"),
        }
    }
}

/// Combined refiner context from all of an incident's sources, most
/// recent first, with a lightweight provenance header per source.
fn build_context(sources: &[SourceDocument]) -> (String, PublicationMeta) {
    let parts: Vec<String> = sources
        .iter()
        .filter_map(|s| {
            let text = s.cleaned_text.as_deref()?.trim();
            if text.is_empty() {
                return None;
            }
            let header = format!(
                "Source: {} | {} | {}",
                s.publisher.as_deref().unwrap_or(""),
                s.article_title.as_deref().unwrap_or(""),
                s.url
            );
            Some(format!("{}\n\n{}", header.trim(), text))
        })
        .collect();

    let meta = sources
        .first()
        .map(PublicationMeta::from)
        .unwrap_or_default();
    (parts.join("\n\n---\n\n"), meta)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_routing_inputs() {
        let by_url = IngestRequest::for_url("https://example.com/story");
        assert!(by_url.html.is_none() && by_url.clean_text.is_none());

        let by_html = IngestRequest::for_html("https://example.com/story", "<p>x</p>");
        assert!(by_html.html.is_some() && by_html.clean_text.is_none());

        let by_text = IngestRequest::for_text("https://example.com/story", "x");
        assert!(by_text.clean_text.is_some());
    }

    #[test]
    fn test_build_context_headers_and_separator() {
        let mk = |url: &str, publisher: Option<&str>, text: Option<&str>| SourceDocument {
            source_id: Uuid::new_v4(),
            event_id: Uuid::new_v4(),
            url: url.to_string(),
            publisher: publisher.map(str::to_string),
            article_title: Some("Title".to_string()),
            date_published: None,
            cleaned_text: text.map(str::to_string),
            quoted_evidence: None,
            summary_bullets: None,
            date_scraped: None,
        };

        let sources = vec![
            mk("https://a.example/1", Some("A Times"), Some("First body")),
            mk("https://b.example/2", None, Some("Second body")),
            mk("https://c.example/3", None, None), // no text: excluded
        ];
        let (combined, meta) = build_context(&sources);
        assert!(combined.contains("Source: A Times | Title | https://a.example/1"));
        assert!(combined.contains("\n\n---\n\n"));
        assert!(combined.contains("Second body"));
        assert!(!combined.contains("c.example"));
        assert_eq!(meta.publisher.as_deref(), Some("A Times"));
    }
}
