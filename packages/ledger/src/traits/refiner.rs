//! Refiner trait: LLM-backed correction/completion of the deterministic
//! extraction.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::incident::IncidentRecord;
use crate::types::refinement::RefinementPayload;

/// Publication metadata handed to the refiner alongside the combined text.
#[derive(Debug, Clone, Default)]
pub struct PublicationMeta {
    pub publisher: Option<String>,
    pub article_title: Option<String>,
    pub date_published: Option<chrono::NaiveDate>,
}

impl From<&crate::types::source::SourceDocument> for PublicationMeta {
    fn from(source: &crate::types::source::SourceDocument) -> Self {
        Self {
            publisher: source.publisher.clone(),
            article_title: source.article_title.clone(),
            date_published: source.date_published,
        }
    }
}

/// Refinement collaborator.
///
/// The production implementation must return a structurally valid
/// (possibly empty/unknown-filled) payload even on its own internal
/// failure; the pipeline treats an `Err` as "no refinement this pass" and
/// continues.
#[async_trait]
pub trait Refiner: Send + Sync {
    /// Refine the current fields against the combined source text.
    async fn refine(
        &self,
        combined_text: &str,
        meta: &PublicationMeta,
        current: &IncidentRecord,
    ) -> Result<RefinementPayload>;
}
