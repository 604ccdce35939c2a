//! Mountain-Fatality Incident Ledger
//!
//! Builds a structured ledger of mountain-fatality incidents from
//! unstructured news text: what happened, where, when, to whom, and which
//! search-and-rescue operations occurred — typed fields with provenance.
//!
//! # Design Philosophy
//!
//! - Deterministic heuristics first, LLM refinement second, and a
//!   reconciliation layer that never lets an empty refined value destroy
//!   a known fact
//! - The ingestion pipeline is an explicit state machine with first-class
//!   `skipped` and `exists` terminal states, not exception control flow
//! - Collaborators (fetcher, cleaner, refiner, geocoder, store) are
//!   traits; production implementations ship beside mocks
//! - Extraction is a pure function: no I/O, no wall-clock reads, and it
//!   never fails — malformed input degrades to null fields
//!
//! # Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use alpine_ledger::{
//!     HtmlCleaner, HttpFetcher, IngestRequest, LedgerConfig, MemoryStore, Pipeline,
//! };
//!
//! let config = LedgerConfig::from_env();
//! let pipeline = Pipeline::new(
//!     Arc::new(MemoryStore::new()),
//!     Arc::new(HttpFetcher::new(&config.user_agent, config.fetch_timeout_secs)),
//!     Arc::new(HtmlCleaner::new()),
//!     config,
//! );
//!
//! let outcome = pipeline
//!     .ingest(IngestRequest::for_url("https://news.example.com/story"))
//!     .await?;
//! ```
//!
//! # Modules
//!
//! - [`extract`] - Deterministic heuristic extraction (dates, places,
//!   taxonomies, casualties, SAR, evidence)
//! - [`pipeline`] - Ingestion state machine, reconciliation merger, batch
//!   driver
//! - [`traits`] - Collaborator trait abstractions
//! - [`fetch`] / [`clean`] / [`ai`] / [`geo`] - Production collaborators
//! - [`stores`] - Storage implementations
//! - [`testing`] - Mock collaborators for tests

pub mod ai;
pub mod clean;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod geo;
pub mod pipeline;
pub mod security;
pub mod stores;
pub mod testing;
pub mod traits;
pub mod types;

// Re-export core types at crate root
pub use error::{FetchError, LedgerError, StoreError};
pub use traits::{
    cleaner::{CleanedDocument, Cleaner},
    fetcher::{FetchedPage, Fetcher},
    geocoder::{GeocodeHit, Geocoder},
    refiner::{PublicationMeta, Refiner},
    store::IncidentStore,
};
pub use types::{
    config::{ExtractorConfig, LedgerConfig},
    extraction::{ExtractionResult, QuotedEvidence},
    incident::{
        Activity, IncidentPatch, IncidentRecord, Jurisdiction, SarOpType, SarSegment,
    },
    refinement::{Evidence, RefinedSarSegment, RefinementPayload},
    source::{NewSource, SourceDocument, SourceMetaPatch, SourceRef, WeakMetadata},
};

// Re-export the deterministic extractor
pub use extract::extract;

// Re-export pipeline components
pub use pipeline::{
    merge, needs_augment, run_batch, BatchConfig, BatchItem, BatchStatus, IngestOutcome,
    IngestRequest, IngestStatus, MergeOutcome, Pipeline,
};

// Re-export production collaborators
pub use ai::OpenAiRefiner;
pub use clean::HtmlCleaner;
pub use fetch::{canonicalize_url, HttpFetcher};
pub use geo::NominatimGeocoder;

// Re-export stores
pub use stores::MemoryStore;

#[cfg(feature = "postgres")]
pub use stores::PostgresStore;

// Re-export testing utilities
pub use testing::{MockFetcher, MockGeocoder, MockRefiner};
