//! HTML cleaning: article text plus weak metadata.

mod html;

pub use html::HtmlCleaner;
