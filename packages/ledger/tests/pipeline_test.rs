//! End-to-end pipeline scenarios over the in-memory store and mock
//! collaborators.

use std::sync::Arc;
use std::time::Duration;

use alpine_ledger::testing::{MockFetcher, MockGeocoder, MockRefiner};
use alpine_ledger::{
    run_batch, Activity, BatchConfig, BatchStatus, FetchError, FetchedPage, Fetcher, GeocodeHit,
    HtmlCleaner, IncidentStore, IngestRequest, IngestStatus, Jurisdiction, LedgerConfig,
    MemoryStore, Pipeline, RefinedSarSegment, RefinementPayload, SarOpType,
};
use async_trait::async_trait;
use chrono::NaiveDate;

const SCENARIO_TEXT: &str = "Two hikers went missing near Mount Example on June 2, 2023. \
     Search and Rescue teams, alongside RCMP, began searching June 3. \
     Bodies were recovered June 10, 2023.";

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn pipeline_with(
    store: Arc<MemoryStore>,
    fetcher: Arc<MockFetcher>,
    config: LedgerConfig,
) -> Pipeline<MemoryStore> {
    Pipeline::new(store, fetcher, Arc::new(HtmlCleaner::new()), config)
}

#[tokio::test]
async fn ingest_url_twice_is_idempotent() {
    let store = Arc::new(MemoryStore::new());
    let fetcher = Arc::new(MockFetcher::new().with_page(
        "https://news.example.com/story",
        "<p>Two hikers went missing near Mount Example on June 2, 2023.</p>",
    ));
    let pipeline = pipeline_with(store.clone(), fetcher, LedgerConfig::default());

    let first = pipeline
        .ingest(IngestRequest::for_url("https://news.example.com/story"))
        .await
        .unwrap();
    assert_eq!(first.status, IngestStatus::Created);

    let second = pipeline
        .ingest(IngestRequest::for_url("https://news.example.com/story"))
        .await
        .unwrap();
    assert_eq!(second.status, IngestStatus::Exists);
    assert_eq!(second.event_id, first.event_id);
    assert_eq!(second.source_id, first.source_id);
    assert_eq!(store.incident_count(), 1);
    assert_eq!(store.source_count(), 1);
}

#[tokio::test]
async fn redirect_resolved_duplicate_is_exists() {
    let store = Arc::new(MemoryStore::new());
    let fetcher = Arc::new(
        MockFetcher::new()
            .with_page("https://news.example.com/story", "<p>body text</p>")
            .with_redirect(
                "https://news.example.com/short",
                "https://news.example.com/story",
                "<p>body text</p>",
            ),
    );
    let pipeline = pipeline_with(store.clone(), fetcher, LedgerConfig::default());

    let first = pipeline
        .ingest(IngestRequest::for_url("https://news.example.com/story"))
        .await
        .unwrap();
    let via_redirect = pipeline
        .ingest(IngestRequest::for_url("https://news.example.com/short"))
        .await
        .unwrap();

    assert_eq!(via_redirect.status, IngestStatus::Exists);
    assert_eq!(via_redirect.event_id, first.event_id);
}

#[tokio::test]
async fn robots_blocked_is_terminal_skip() {
    let store = Arc::new(MemoryStore::new());
    let fetcher = Arc::new(MockFetcher::new().blocking("https://blocked.example.com/story"));
    let pipeline = pipeline_with(store.clone(), fetcher, LedgerConfig::default());

    let outcome = pipeline
        .ingest(IngestRequest::for_url("https://blocked.example.com/story"))
        .await
        .unwrap();

    assert_eq!(outcome.status, IngestStatus::Skipped);
    assert_eq!(outcome.reason.as_deref(), Some("robots_blocked"));
    // no partial persistence
    assert_eq!(store.incident_count(), 0);
    assert_eq!(store.source_count(), 0);
}

#[tokio::test]
async fn fetch_failure_is_terminal_skip_with_reason() {
    let store = Arc::new(MemoryStore::new());
    let fetcher = Arc::new(MockFetcher::new().failing("https://down.example.com/story"));
    let pipeline = pipeline_with(store.clone(), fetcher, LedgerConfig::default());

    let outcome = pipeline
        .ingest(IngestRequest::for_url("https://down.example.com/story"))
        .await
        .unwrap();

    assert_eq!(outcome.status, IngestStatus::Skipped);
    assert!(outcome.reason.is_some());
    assert_eq!(store.incident_count(), 0);
}

#[tokio::test]
async fn raw_text_ingest_extracts_and_persists() {
    let store = Arc::new(MemoryStore::new());
    let pipeline = pipeline_with(
        store.clone(),
        Arc::new(MockFetcher::new()),
        LedgerConfig::default(),
    );

    let outcome = pipeline
        .ingest(IngestRequest::for_text(
            "https://news.example.com/hikers",
            SCENARIO_TEXT,
        ))
        .await
        .unwrap();
    assert_eq!(outcome.status, IngestStatus::Created);

    let record = store
        .get_incident(outcome.event_id.unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.n_fatalities, Some(2));
    assert_eq!(record.event_type.as_deref(), Some("fatality"));
    assert_eq!(record.date_event_start, Some(date(2023, 6, 2)));
    assert_eq!(record.date_recovery, Some(date(2023, 6, 10)));
    assert_eq!(record.time_to_recovery_days, Some(8));

    let segments = store
        .sar_segments(outcome.event_id.unwrap())
        .await
        .unwrap();
    let search: Vec<_> = segments
        .iter()
        .filter(|s| s.op_type == SarOpType::Search)
        .collect();
    assert_eq!(search.len(), 1);
    assert_eq!(
        search[0].started_at.map(|t| t.date_naive()),
        Some(date(2023, 6, 3))
    );
    let recovery: Vec<_> = segments
        .iter()
        .filter(|s| s.op_type == SarOpType::Recovery)
        .collect();
    assert_eq!(recovery.len(), 1);
    assert_eq!(
        recovery[0].started_at.map(|t| t.date_naive()),
        Some(date(2023, 6, 10))
    );

    // the source carries annotations
    let sources = store
        .sources_for_incident(outcome.event_id.unwrap())
        .await
        .unwrap();
    assert_eq!(sources.len(), 1);
    assert!(sources[0].summary_bullets.is_some());
}

#[tokio::test]
async fn augment_merges_without_destroying_known_fields() {
    let store = Arc::new(MemoryStore::new());
    // Refined payload: null activity (must not erase), bogus jurisdiction
    // (must be coerced away), one SAR segment (must replace both).
    let refiner = Arc::new(MockRefiner::new().with_payload(RefinementPayload {
        jurisdiction: Some("Unknown".to_string()),
        peak_name: Some("Mount Example, near Town".to_string()),
        n_injured: Some(1),
        sar: vec![RefinedSarSegment {
            op_type: "recovery".to_string(),
            agency: Some("Example SAR".to_string()),
            started_at: date(2023, 6, 10).into(),
            ..Default::default()
        }],
        ..Default::default()
    }));

    let pipeline = pipeline_with(
        store.clone(),
        Arc::new(MockFetcher::new()),
        LedgerConfig::default().with_augment(),
    )
    .with_refiner(refiner.clone());

    let outcome = pipeline
        .ingest(IngestRequest::for_text(
            "https://news.example.com/hikers",
            SCENARIO_TEXT,
        ))
        .await
        .unwrap();
    assert_eq!(refiner.call_count(), 1);

    let event_id = outcome.event_id.unwrap();
    let record = store.get_incident(event_id).await.unwrap().unwrap();

    // deterministic values survived the null/invalid refined fields
    assert_eq!(record.n_fatalities, Some(2));
    assert_eq!(record.event_type.as_deref(), Some("fatality"));
    // refined additions landed
    assert_eq!(record.n_injured, Some(1));
    assert_eq!(record.peak_name.as_deref(), Some("Mount Example"));

    // SAR fully replaced: two deterministic segments became one refined one
    let segments = store.sar_segments(event_id).await.unwrap();
    assert_eq!(segments.len(), 1);
    assert_eq!(segments[0].op_type, SarOpType::Recovery);
    assert_eq!(segments[0].agency.as_deref(), Some("Example SAR"));
}

#[tokio::test]
async fn augment_disabled_never_calls_refiner() {
    let store = Arc::new(MemoryStore::new());
    let refiner = Arc::new(MockRefiner::new());
    let pipeline = pipeline_with(
        store,
        Arc::new(MockFetcher::new()),
        LedgerConfig::default(), // augment disabled
    )
    .with_refiner(refiner.clone());

    pipeline
        .ingest(IngestRequest::for_text(
            "https://news.example.com/hikers",
            SCENARIO_TEXT,
        ))
        .await
        .unwrap();
    assert_eq!(refiner.call_count(), 0);
}

#[tokio::test]
async fn refiner_failure_does_not_fail_pipeline() {
    let store = Arc::new(MemoryStore::new());
    let refiner = Arc::new(MockRefiner::new().failing());
    let pipeline = pipeline_with(
        store.clone(),
        Arc::new(MockFetcher::new()),
        LedgerConfig::default().with_augment(),
    )
    .with_refiner(refiner);

    let outcome = pipeline
        .ingest(IngestRequest::for_text(
            "https://news.example.com/hikers",
            SCENARIO_TEXT,
        ))
        .await
        .unwrap();

    assert_eq!(outcome.status, IngestStatus::Created);
    let record = store
        .get_incident(outcome.event_id.unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.n_fatalities, Some(2)); // deterministic pass intact
}

#[tokio::test]
async fn geocode_fills_coordinates_with_jurisdiction_hint() {
    let store = Arc::new(MemoryStore::new());
    let text = "An avalanche below Atwell Peak near Squamish killed two climbers \
                descending on March 4, 2022. Whistler crews assisted.";
    let geocoder = Arc::new(MockGeocoder::new().with_hit(
        "Atwell Peak",
        GeocodeHit {
            lat: 49.77,
            lon: -123.04,
            display_name: Some("Atwell Peak, British Columbia".to_string()),
            iso_country: Some("CA".to_string()),
            admin_area: Some("British Columbia".to_string()),
        },
    ));

    let pipeline = pipeline_with(
        store.clone(),
        Arc::new(MockFetcher::new()),
        LedgerConfig::default(),
    )
    .with_geocoder(geocoder.clone());

    let outcome = pipeline
        .ingest(IngestRequest::for_text(
            "https://news.example.com/atwell",
            text,
        ))
        .await
        .unwrap();

    let calls = geocoder.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, "Atwell Peak");
    assert_eq!(calls[0].1, Some(Jurisdiction::BC));

    let record = store
        .get_incident(outcome.event_id.unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.lat, Some(49.77));
    assert_eq!(record.lon, Some(-123.04));
    assert_eq!(record.tz_local.as_deref(), Some("America/Vancouver"));
    assert_eq!(record.activity, Some(Activity::Climbing));
}

#[tokio::test]
async fn batch_reports_per_url_statuses() {
    let store = Arc::new(MemoryStore::new());
    let fetcher = Arc::new(
        MockFetcher::new()
            .with_page("https://a.example.com/story", "<p>Two hikers went missing June 2, 2023.</p>")
            .blocking("https://b.example.com/story")
            .failing("https://c.example.com/story"),
    );
    let pipeline = Arc::new(pipeline_with(store, fetcher, LedgerConfig::default()));

    let items = run_batch(
        pipeline,
        vec![
            "https://a.example.com/story".to_string(),
            "https://b.example.com/story".to_string(),
            "https://c.example.com/story".to_string(),
        ],
        BatchConfig::new().with_concurrency(2),
    )
    .await;

    assert_eq!(items.len(), 3);
    assert_eq!(items[0].status, BatchStatus::Ok);
    assert!(items[0].event_id.is_some());
    assert_eq!(items[1].status, BatchStatus::Skipped);
    assert_eq!(items[1].detail.as_deref(), Some("robots_blocked"));
    // hard fetch errors terminate as skipped by design, not error
    assert_eq!(items[2].status, BatchStatus::Skipped);
}

/// A fetcher that never returns within the batch budget.
struct StalledFetcher;

#[async_trait]
impl Fetcher for StalledFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(FetchedPage {
            html: String::new(),
            final_url: url.to_string(),
        })
    }
}

#[tokio::test(start_paused = true)]
async fn batch_deadline_abandons_stragglers_as_timeout() {
    let store = Arc::new(MemoryStore::new());
    let pipeline = Arc::new(Pipeline::new(
        store,
        Arc::new(StalledFetcher),
        Arc::new(HtmlCleaner::new()),
        LedgerConfig::default(),
    ));

    let items = run_batch(
        pipeline,
        vec!["https://slow.example.com/story".to_string()],
        BatchConfig::new().with_timeout(Duration::from_secs(5)),
    )
    .await;

    assert_eq!(items.len(), 1);
    assert_eq!(items[0].status, BatchStatus::Timeout);
    assert_eq!(items[0].url, "https://slow.example.com/story");
}
