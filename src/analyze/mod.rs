//! Analysis backends.
//!
//! Two seams: text analysis for full transcripts and media analysis for
//! referenced audio/video files. Both return the same [`AnalysisReport`]
//! shape so the router can normalize outcomes uniformly. The in-tree
//! implementation is the Gemini REST backend.

pub mod gemini;

use async_trait::async_trait;

use crate::error::AnalysisError;
use crate::model::AnalysisReport;

/// Summarizes a full transcript text.
#[async_trait]
pub trait TextAnalyzer: Send + Sync {
    async fn analyze_text(
        &self,
        company_name: &str,
        transcript: &str,
    ) -> Result<AnalysisReport, AnalysisError>;

    /// Identify the company a document concerns from its text. Used when
    /// the feed row carries a blank or "N/A" company name.
    async fn extract_company_name(&self, text: &str) -> Result<String, AnalysisError>;
}

/// Summarizes a downloaded media file (earnings-call audio or video).
#[async_trait]
pub trait MediaAnalyzer: Send + Sync {
    async fn analyze_media(
        &self,
        company_name: &str,
        media: &[u8],
        mime_hint: &str,
    ) -> Result<AnalysisReport, AnalysisError>;
}

pub use gemini::GeminiClient;
