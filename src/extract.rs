//! Text extraction boundary.
//!
//! The classifier needs extracted text plus a page count; how those come out
//! of the raw document bytes is a collaborator concern. The in-tree
//! [`PlainTextExtractor`] handles UTF-8 text with form-feed page breaks,
//! which is what the check-document mode and the tests feed in. A real PDF
//! extractor plugs in behind the same trait.

use crate::error::ExtractError;

/// Extracted document content: plain text plus how many pages it spanned.
#[derive(Debug, Clone)]
pub struct DocumentText {
    pub page_count: usize,
    pub text: String,
}

/// Turns raw document bytes into text and a page count.
pub trait TextExtractor: Send + Sync {
    fn extract(&self, bytes: &[u8]) -> Result<DocumentText, ExtractError>;
}

/// UTF-8 extractor. Pages are separated by form-feed (`\x0c`) characters;
/// a document with no separators counts as a single page.
pub struct PlainTextExtractor;

impl TextExtractor for PlainTextExtractor {
    fn extract(&self, bytes: &[u8]) -> Result<DocumentText, ExtractError> {
        if bytes.is_empty() {
            return Err(ExtractError::Empty);
        }
        let text = std::str::from_utf8(bytes).map_err(|_| ExtractError::Encoding)?;
        let page_count = text.split('\x0c').count();
        Ok(DocumentText {
            page_count,
            text: text.replace('\x0c', "\n"),
        })
    }
}
