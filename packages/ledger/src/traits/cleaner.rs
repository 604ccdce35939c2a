//! Cleaner trait: HTML to plain text plus weak metadata.

use crate::types::source::WeakMetadata;

/// A cleaned document: article text and whatever weak metadata the markup
/// gave up.
#[derive(Debug, Clone, Default)]
pub struct CleanedDocument {
    pub text: String,
    pub meta: WeakMetadata,
}

/// Clean collaborator. Infallible by contract: hopeless input yields an
/// empty document, never an error.
pub trait Cleaner: Send + Sync {
    /// Convert raw HTML into text and weak metadata.
    fn clean(&self, html: &str, url: Option<&str>) -> CleanedDocument;
}
