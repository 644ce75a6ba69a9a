//! Document classifier.
//!
//! The size-first rule drives everything: large documents (> 3 pages) ARE
//! the transcript, and any links inside them are ignored. Small documents
//! are pointers — their real content is a web page or media file referenced
//! by URL. Small documents with nothing actionable are classified as such,
//! never silently dropped.

use regex::Regex;
use tracing::{debug, warn};

use crate::extract::{TextExtractor, DocumentText};
use crate::model::MediaKind;

/// Documents above this page count are full transcripts.
const PAGE_THRESHOLD: usize = 3;

/// Pointer documents with fewer extractable characters than this are
/// treated as having no content at all.
const MIN_POINTER_CHARS: usize = 10;

/// Content shape of one downloaded document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// Large document; the extracted text is the transcript.
    FullContent { text: String },
    /// Small document pointing at a web page.
    PointerWebLink { url: String },
    /// Small document pointing at an audio/video file.
    PointerMediaLink { url: String, kind: MediaKind },
    /// Small document with no actionable reference.
    PointerNoContent,
    /// Text extraction failed; the document is unusable.
    Unreadable { reason: String },
}

/// Classifies downloaded documents by content shape.
pub struct Classifier {
    extractor: Box<dyn TextExtractor>,
    url_re: Regex,
    media_re: Regex,
}

impl Classifier {
    pub fn new(extractor: Box<dyn TextExtractor>) -> Self {
        Self {
            extractor,
            // file:// is accepted so local fixtures flow through the same path.
            url_re: Regex::new(r"https?://\S+|file://\S+|\bwww\.\S+").expect("valid url regex"),
            media_re: Regex::new(r"(?i)\.(mp3|mp4|wav|m4a)\b").expect("valid media regex"),
        }
    }

    /// Classify raw document bytes. Never fails: extraction errors come back
    /// as [`Classification::Unreadable`].
    pub fn classify(&self, bytes: &[u8]) -> Classification {
        let doc = match self.extractor.extract(bytes) {
            Ok(doc) => doc,
            Err(e) => {
                warn!(error = %e, "Document text extraction failed");
                return Classification::Unreadable {
                    reason: e.to_string(),
                };
            }
        };
        self.classify_text(&doc)
    }

    fn classify_text(&self, doc: &DocumentText) -> Classification {
        if doc.page_count > PAGE_THRESHOLD {
            debug!(
                pages = doc.page_count,
                chars = doc.text.len(),
                "Large document; treating as full transcript"
            );
            return Classification::FullContent {
                text: doc.text.clone(),
            };
        }

        if doc.text.len() > MIN_POINTER_CHARS {
            // URLs in small documents are frequently broken across lines by
            // the layout engine; stitch before scanning.
            let stitched = doc.text.replace('\n', "");
            let urls: Vec<String> = self
                .url_re
                .find_iter(&stitched)
                .map(|m| m.as_str().trim_end_matches(['.', ',', ';', ')']).to_string())
                .collect();

            // First media link wins over any web link.
            if let Some(url) = urls.iter().find(|u| self.media_re.is_match(u)) {
                let kind = if url.to_ascii_lowercase().contains(".mp4") {
                    MediaKind::Video
                } else {
                    MediaKind::Audio
                };
                debug!(pages = doc.page_count, url = %url, "Pointer document references media");
                return Classification::PointerMediaLink {
                    url: url.clone(),
                    kind,
                };
            }
            if let Some(url) = urls.first() {
                debug!(pages = doc.page_count, url = %url, "Pointer document references web link");
                return Classification::PointerWebLink { url: url.clone() };
            }
        }

        debug!(
            pages = doc.page_count,
            chars = doc.text.len(),
            "Small document with no actionable links or content"
        );
        Classification::PointerNoContent
    }
}
