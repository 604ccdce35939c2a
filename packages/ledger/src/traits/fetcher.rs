//! Fetcher trait: retrieve raw HTML for a candidate article URL.

use async_trait::async_trait;

use crate::error::FetchResult;

/// A fetched page: raw HTML plus the redirect-resolved final URL.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub html: String,
    pub final_url: String,
}

/// Fetch collaborator.
///
/// Implementations must raise the distinguished
/// [`FetchError::RobotsDisallowed`](crate::error::FetchError) condition for
/// robots exclusion and a generic failure otherwise. The pipeline never
/// asks for retries; both conditions terminate ingestion as `skipped`.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch a URL, following redirects, honoring robots exclusion.
    async fn fetch(&self, url: &str) -> FetchResult<FetchedPage>;
}
