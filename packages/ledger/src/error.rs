//! Typed errors for the ledger library.
//!
//! Uses `thiserror` for library errors (not `anyhow`) to provide
//! strongly-typed, composable error handling.

use thiserror::Error;

/// Errors that can occur during ledger operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Fetch operation failed
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),

    /// Refiner service unavailable or failed
    #[error("refiner error: {0}")]
    Refiner(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Geocoding request failed
    #[error("geocode error: {0}")]
    Geocode(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Storage operation failed
    #[error("storage error: {0}")]
    Storage(#[from] StoreError),

    /// Incident record not found
    #[error("incident not found: {id}")]
    IncidentNotFound { id: uuid::Uuid },

    /// JSON parsing error
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// Configuration error
    #[error("config error: {reason}")]
    Config { reason: String },
}

/// Errors that can occur while fetching a candidate article.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Robots.txt disallows fetching this URL.
    ///
    /// Policy-skip: terminal, non-retryable. The pipeline records the
    /// reason and persists nothing.
    #[error("robots.txt disallows: {url}")]
    RobotsDisallowed { url: String },

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Non-success status code
    #[error("HTTP status {status} for {url}")]
    Status { status: u16, url: String },

    /// Invalid URL format
    #[error("invalid URL: {url}")]
    InvalidUrl { url: String },
}

impl FetchError {
    /// Whether this failure is the robots policy skip rather than a
    /// transient transport problem.
    pub fn is_policy_skip(&self) -> bool {
        matches!(self, FetchError::RobotsDisallowed { .. })
    }
}

/// Errors from the persistence layer.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Unique-URL constraint violation on source creation.
    ///
    /// Store implementations recover from this internally by re-reading
    /// the winning row; it only escapes when the re-read also fails.
    #[error("duplicate source url: {url}")]
    DuplicateUrl { url: String },

    /// Backend failure (connection, query, serialization)
    #[error("backend error: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Result type alias for ledger operations.
pub type Result<T> = std::result::Result<T, LedgerError>;

/// Result type alias for fetch operations.
pub type FetchResult<T> = std::result::Result<T, FetchError>;

/// Result type alias for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;
