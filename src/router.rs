//! Analysis router — the single place that branches on content shape.
//!
//! Takes a classification, drives the matching analysis path, and
//! normalizes whatever happened into one [`Outcome`]. Failures never
//! escape: every path ends in a tagged outcome the caller can persist
//! and notify on.

use std::sync::Arc;

use tracing::{info, warn};

use crate::analyze::{MediaAnalyzer, TextAnalyzer};
use crate::classify::Classification;
use crate::model::Outcome;
use crate::retry::{RetryPolicy, with_retry};
use crate::source::DocumentFetcher;

/// Stand-in when the feed has no usable name and none can be recovered.
const UNKNOWN_COMPANY: &str = "Unknown Company";

fn usable_name(name: &str) -> Option<&str> {
    let trimmed = name.trim();
    (!trimmed.is_empty() && !trimmed.eq_ignore_ascii_case("n/a")).then_some(trimmed)
}

/// Routes classified documents to the right analysis backend.
pub struct AnalysisRouter {
    text: Arc<dyn TextAnalyzer>,
    media: Arc<dyn MediaAnalyzer>,
    fetcher: Arc<dyn DocumentFetcher>,
    retry: RetryPolicy,
}

impl AnalysisRouter {
    pub fn new(
        text: Arc<dyn TextAnalyzer>,
        media: Arc<dyn MediaAnalyzer>,
        fetcher: Arc<dyn DocumentFetcher>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            text,
            media,
            fetcher,
            retry,
        }
    }

    /// Pick the company name used in prompts and notifications.
    ///
    /// Feed rows sometimes publish a blank or "N/A" name; when a full
    /// transcript is available the name is recovered from the document text
    /// by a model call, otherwise a fixed stand-in is used.
    pub async fn resolve_company_name(
        &self,
        feed_name: &str,
        classification: Option<&Classification>,
    ) -> String {
        if let Some(name) = usable_name(feed_name) {
            return name.to_string();
        }

        if let Some(Classification::FullContent { text }) = classification {
            match with_retry(self.retry, "company name extraction", || {
                self.text.extract_company_name(text)
            })
            .await
            {
                Ok(name) => {
                    if let Some(name) = usable_name(&name) {
                        info!(company = name, "Company name recovered from document text");
                        return name.to_string();
                    }
                }
                Err(e) => warn!(error = %e, "Company name extraction failed"),
            }
        }

        UNKNOWN_COMPANY.to_string()
    }

    /// Route one classification to its analysis path.
    pub async fn route(&self, classification: Classification, company_name: &str) -> Outcome {
        match classification {
            Classification::FullContent { text } => {
                match with_retry(self.retry, "text analysis", || {
                    self.text.analyze_text(company_name, &text)
                })
                .await
                {
                    Ok(report) => Outcome::Summary {
                        points: report.summary_points,
                        sentiment: report.sentiment,
                    },
                    Err(e) => {
                        warn!(company = company_name, error = %e, "Text analysis failed");
                        Outcome::Failure {
                            reason: format!("analysis failed: {e}"),
                        }
                    }
                }
            }

            Classification::PointerMediaLink { url, kind } => {
                info!(company = company_name, url = %url, "Pointer references media; starting two-stage analysis");
                let media_bytes = match with_retry(self.retry, "media fetch", || {
                    self.fetcher.fetch(&url)
                })
                .await
                {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        warn!(company = company_name, url = %url, error = %e, "Media fetch failed");
                        return Outcome::Failure {
                            reason: format!("media fetch failed: {e}"),
                        };
                    }
                };

                let mime = kind.mime_hint(&url);
                match with_retry(self.retry, "media analysis", || {
                    self.media.analyze_media(company_name, &media_bytes, mime)
                })
                .await
                {
                    Ok(report) => Outcome::MediaSummary {
                        points: report.summary_points,
                        sentiment: report.sentiment,
                        source_url: url,
                    },
                    Err(e) => {
                        warn!(company = company_name, error = %e, "Media analysis failed");
                        Outcome::Failure {
                            reason: format!("media analysis failed: {e}"),
                        }
                    }
                }
            }

            // Cheap path: record the link, no analysis call.
            Classification::PointerWebLink { url } => Outcome::LinkNotice { url },

            Classification::PointerNoContent => Outcome::Failure {
                reason: "no actionable content".into(),
            },

            Classification::Unreadable { reason } => Outcome::Failure { reason },
        }
    }
}
