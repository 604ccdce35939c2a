//! The ingestion pipeline: state machine, reconciliation merger, and
//! batch driver.

pub mod batch;
pub mod ingest;
pub mod merge;

pub use batch::{run_batch, BatchConfig, BatchItem, BatchStatus};
pub use ingest::{IngestOutcome, IngestRequest, IngestStatus, Pipeline};
pub use merge::{merge, needs_augment, MergeOutcome};
