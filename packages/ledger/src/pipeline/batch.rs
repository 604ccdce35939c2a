//! Batch ingestion: a bounded worker pool over the state machine.
//!
//! Each worker runs one URL's full pipeline and reports independently. A
//! global wall-clock budget bounds the batch: when it elapses, workers
//! still running are abandoned — not cancelled mid-transaction — and
//! reported as `timeout`; whatever they eventually produce is discarded.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Semaphore};
use tokio::time::Instant;
use tracing::{info, warn};
use uuid::Uuid;

use crate::pipeline::ingest::{IngestRequest, IngestStatus, Pipeline};
use crate::traits::store::IncidentStore;

/// Per-URL batch status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchStatus {
    /// Pipeline terminated in `created` or `exists`.
    Ok,
    /// Pipeline terminated in `skipped` (robots or fetch failure).
    Skipped,
    /// Pipeline returned an error.
    Error,
    /// Worker still running when the batch budget elapsed.
    Timeout,
}

impl BatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchStatus::Ok => "ok",
            BatchStatus::Skipped => "skipped",
            BatchStatus::Error => "error",
            BatchStatus::Timeout => "timeout",
        }
    }
}

/// Result row for one URL in a batch.
#[derive(Debug, Clone)]
pub struct BatchItem {
    pub url: String,
    pub status: BatchStatus,
    pub event_id: Option<Uuid>,
    pub source_id: Option<Uuid>,
    /// Skip reason or error text, when any.
    pub detail: Option<String>,
}

/// Batch driver configuration.
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Maximum concurrently running workers.
    pub concurrency: usize,
    /// Global wall-clock budget for the whole batch.
    pub timeout: Duration,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            timeout: Duration::from_secs(300),
        }
    }
}

impl BatchConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Ingest a list of URLs through a shared pipeline.
///
/// Returns one row per input URL, in input order.
pub async fn run_batch<S>(
    pipeline: Arc<Pipeline<S>>,
    urls: Vec<String>,
    config: BatchConfig,
) -> Vec<BatchItem>
where
    S: IncidentStore + 'static,
{
    if urls.is_empty() {
        return Vec::new();
    }

    info!(
        urls = urls.len(),
        concurrency = config.concurrency,
        "starting batch ingest"
    );

    let semaphore = Arc::new(Semaphore::new(config.concurrency.max(1)));
    let (tx, mut rx) = mpsc::channel::<(usize, BatchItem)>(urls.len());

    for (index, url) in urls.iter().cloned().enumerate() {
        let pipeline = Arc::clone(&pipeline);
        let semaphore = Arc::clone(&semaphore);
        let tx = tx.clone();
        // Handle deliberately dropped: an abandoned worker keeps running
        // to completion, its send just lands on a closed channel.
        tokio::spawn(async move {
            let Ok(_permit) = semaphore.acquire_owned().await else {
                return;
            };
            let item = match pipeline.ingest(IngestRequest::for_url(&url)).await {
                Ok(outcome) => BatchItem {
                    url,
                    status: match outcome.status {
                        IngestStatus::Created | IngestStatus::Exists => BatchStatus::Ok,
                        IngestStatus::Skipped => BatchStatus::Skipped,
                    },
                    event_id: outcome.event_id,
                    source_id: outcome.source_id,
                    detail: outcome.reason,
                },
                Err(e) => BatchItem {
                    url,
                    status: BatchStatus::Error,
                    event_id: None,
                    source_id: None,
                    detail: Some(e.to_string()),
                },
            };
            let _ = tx.send((index, item)).await;
        });
    }
    drop(tx);

    let deadline = Instant::now() + config.timeout;
    let mut results: Vec<Option<BatchItem>> = urls.iter().map(|_| None).collect();

    loop {
        match tokio::time::timeout_at(deadline, rx.recv()).await {
            Ok(Some((index, item))) => results[index] = Some(item),
            Ok(None) => break, // every worker reported
            Err(_) => {
                let unfinished = results.iter().filter(|r| r.is_none()).count();
                warn!(unfinished, "batch budget elapsed; abandoning running workers");
                break;
            }
        }
    }

    results
        .into_iter()
        .zip(urls)
        .map(|(item, url)| {
            item.unwrap_or(BatchItem {
                url,
                status: BatchStatus::Timeout,
                event_id: None,
                source_id: None,
                detail: None,
            })
        })
        .collect()
}
