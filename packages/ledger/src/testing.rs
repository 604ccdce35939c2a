//! Testing utilities including mock collaborators.
//!
//! Useful for exercising the pipeline without network or LLM calls.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::error::{FetchError, FetchResult, Result};
use crate::traits::fetcher::{FetchedPage, Fetcher};
use crate::traits::geocoder::{GeocodeHit, Geocoder};
use crate::traits::refiner::{PublicationMeta, Refiner};
use crate::types::incident::{IncidentRecord, Jurisdiction};
use crate::types::refinement::RefinementPayload;

/// A mock fetcher serving predefined pages.
#[derive(Default)]
pub struct MockFetcher {
    pages: Arc<RwLock<HashMap<String, FetchedPage>>>,
    robots_blocked: Arc<RwLock<Vec<String>>>,
    fail_urls: Arc<RwLock<Vec<String>>>,
    calls: Arc<RwLock<Vec<String>>>,
}

impl MockFetcher {
    /// Create a new mock fetcher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve HTML for a URL (final URL = requested URL).
    pub fn with_page(self, url: impl Into<String>, html: impl Into<String>) -> Self {
        let url = url.into();
        self.pages.write().unwrap().insert(
            url.clone(),
            FetchedPage {
                html: html.into(),
                final_url: url,
            },
        );
        self
    }

    /// Serve HTML for a URL that redirects to a different final URL.
    pub fn with_redirect(
        self,
        url: impl Into<String>,
        final_url: impl Into<String>,
        html: impl Into<String>,
    ) -> Self {
        self.pages.write().unwrap().insert(
            url.into(),
            FetchedPage {
                html: html.into(),
                final_url: final_url.into(),
            },
        );
        self
    }

    /// Mark a URL as robots-disallowed.
    pub fn blocking(self, url: impl Into<String>) -> Self {
        self.robots_blocked.write().unwrap().push(url.into());
        self
    }

    /// Mark a URL as failing with a generic error.
    pub fn failing(self, url: impl Into<String>) -> Self {
        self.fail_urls.write().unwrap().push(url.into());
        self
    }

    /// URLs fetched so far.
    pub fn calls(&self) -> Vec<String> {
        self.calls.read().unwrap().clone()
    }
}

#[async_trait]
impl Fetcher for MockFetcher {
    async fn fetch(&self, url: &str) -> FetchResult<FetchedPage> {
        self.calls.write().unwrap().push(url.to_string());

        if self.robots_blocked.read().unwrap().iter().any(|u| u == url) {
            return Err(FetchError::RobotsDisallowed {
                url: url.to_string(),
            });
        }
        if self.fail_urls.read().unwrap().iter().any(|u| u == url) {
            return Err(FetchError::Http("mock connection refused".into()));
        }
        self.pages
            .read()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| FetchError::Status {
                status: 404,
                url: url.to_string(),
            })
    }
}

/// A mock refiner returning a configured payload.
#[derive(Default)]
pub struct MockRefiner {
    payload: Arc<RwLock<Option<RefinementPayload>>>,
    fail: bool,
    calls: Arc<RwLock<usize>>,
}

impl MockRefiner {
    /// Refiner that returns an empty payload.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the payload every call returns.
    pub fn with_payload(self, payload: RefinementPayload) -> Self {
        *self.payload.write().unwrap() = Some(payload);
        self
    }

    /// Make every call fail.
    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    /// Number of refine calls made.
    pub fn call_count(&self) -> usize {
        *self.calls.read().unwrap()
    }
}

#[async_trait]
impl Refiner for MockRefiner {
    async fn refine(
        &self,
        _combined_text: &str,
        _meta: &PublicationMeta,
        _current: &IncidentRecord,
    ) -> Result<RefinementPayload> {
        *self.calls.write().unwrap() += 1;
        if self.fail {
            return Err(crate::error::LedgerError::Refiner("mock refiner down".into()));
        }
        Ok(self.payload.read().unwrap().clone().unwrap_or_default())
    }
}

/// A mock geocoder serving predefined hits by query.
#[derive(Default)]
pub struct MockGeocoder {
    hits: Arc<RwLock<HashMap<String, GeocodeHit>>>,
    calls: Arc<RwLock<Vec<(String, Option<Jurisdiction>)>>>,
}

impl MockGeocoder {
    /// Create a new mock geocoder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve a hit for a query.
    pub fn with_hit(self, query: impl Into<String>, hit: GeocodeHit) -> Self {
        self.hits.write().unwrap().insert(query.into(), hit);
        self
    }

    /// Queries seen so far.
    pub fn calls(&self) -> Vec<(String, Option<Jurisdiction>)> {
        self.calls.read().unwrap().clone()
    }
}

#[async_trait]
impl Geocoder for MockGeocoder {
    async fn geocode(
        &self,
        query: &str,
        jurisdiction: Option<Jurisdiction>,
    ) -> Result<Option<GeocodeHit>> {
        self.calls
            .write()
            .unwrap()
            .push((query.to_string(), jurisdiction));
        Ok(self.hits.read().unwrap().get(query).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_fetcher_pages_and_blocks() {
        let fetcher = MockFetcher::new()
            .with_page("https://a.example/story", "<p>hi</p>")
            .blocking("https://b.example/story");

        let page = fetcher.fetch("https://a.example/story").await.unwrap();
        assert_eq!(page.html, "<p>hi</p>");

        let blocked = fetcher.fetch("https://b.example/story").await;
        assert!(matches!(
            blocked,
            Err(FetchError::RobotsDisallowed { .. })
        ));

        let missing = fetcher.fetch("https://c.example/story").await;
        assert!(matches!(missing, Err(FetchError::Status { status: 404, .. })));

        assert_eq!(fetcher.calls().len(), 3);
    }

    #[tokio::test]
    async fn test_mock_refiner_counts_calls() {
        let refiner = MockRefiner::new().with_payload(RefinementPayload {
            n_fatalities: Some(2),
            ..Default::default()
        });
        let record = IncidentRecord::new(uuid::Uuid::new_v4());
        let payload = refiner
            .refine("text", &PublicationMeta::default(), &record)
            .await
            .unwrap();
        assert_eq!(payload.n_fatalities, Some(2));
        assert_eq!(refiner.call_count(), 1);
    }

    #[tokio::test]
    async fn test_mock_geocoder_miss_is_none() {
        let geocoder = MockGeocoder::new();
        let hit = geocoder.geocode("Nowhere Peak", None).await.unwrap();
        assert!(hit.is_none());
    }
}
