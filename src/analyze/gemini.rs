//! Gemini REST backend — text and media summarization.
//!
//! Text goes straight to `generateContent`. Media is a two-stage call:
//! upload the bytes to the Files API, poll until the file leaves
//! `PROCESSING`, then generate against the file URI. The uploaded file is
//! deleted afterwards regardless of the generation result.
//!
//! The model is instructed to reply with a single JSON object; fenced
//! code blocks around it are tolerated and stripped.

use std::time::Duration;

use secrecy::ExposeSecret;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::analyze::{MediaAnalyzer, TextAnalyzer};
use crate::config::GeminiConfig;
use crate::error::AnalysisError;
use crate::model::AnalysisReport;

const API_BASE: &str = "https://generativelanguage.googleapis.com";

/// How long to wait between file-state polls.
const FILE_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Give up on an uploaded file that stays in `PROCESSING` this long.
const FILE_POLL_TIMEOUT: Duration = Duration::from_secs(300);

/// Gemini REST client implementing both analysis seams.
pub struct GeminiClient {
    config: GeminiConfig,
    client: reqwest::Client,
}

// ── Response shapes ────────────────────────────────────────────────

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Deserialize)]
struct UploadResponse {
    file: FileInfo,
}

#[derive(Deserialize)]
struct FileInfo {
    name: String,
    uri: String,
    state: String,
}

/// The JSON object the prompt asks the model to emit. `company_name` is
/// echoed back by the model but unused.
#[derive(Deserialize)]
struct ModelReply {
    summary_points: Vec<String>,
    sentiment: crate::model::Sentiment,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    fn key(&self) -> &str {
        self.config.api_key.expose_secret()
    }

    fn map_status(status: reqwest::StatusCode) -> AnalysisError {
        match status.as_u16() {
            401 | 403 => AnalysisError::Auth,
            429 => AnalysisError::RateLimited,
            code => AnalysisError::Status { code },
        }
    }

    /// Run one `generateContent` call and return the raw reply text.
    async fn generate_text(&self, parts: Vec<serde_json::Value>) -> Result<String, AnalysisError> {
        let url = format!(
            "{API_BASE}/v1beta/models/{}:generateContent?key={}",
            self.config.model,
            self.key()
        );
        let body = serde_json::json!({ "contents": [{ "parts": parts }] });

        let resp = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| AnalysisError::Http(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(Self::map_status(resp.status()));
        }

        let parsed: GenerateResponse = resp
            .json()
            .await
            .map_err(|e| AnalysisError::InvalidReply(e.to_string()))?;

        let text = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .and_then(|c| c.parts.into_iter().next())
            .and_then(|p| p.text)
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(AnalysisError::EmptyResponse);
        }

        Ok(text)
    }

    /// Run one `generateContent` call and parse the structured model reply.
    async fn generate(&self, parts: Vec<serde_json::Value>) -> Result<AnalysisReport, AnalysisError> {
        let text = self.generate_text(parts).await?;

        let reply: ModelReply = serde_json::from_str(strip_code_fences(&text))
            .map_err(|e| AnalysisError::InvalidReply(e.to_string()))?;

        if reply.summary_points.is_empty() {
            return Err(AnalysisError::InvalidReply("no summary points".into()));
        }

        Ok(AnalysisReport {
            summary_points: reply.summary_points,
            sentiment: reply.sentiment,
        })
    }

    /// Upload media bytes to the Files API and wait for it to become usable.
    async fn upload_media(&self, media: &[u8], mime_hint: &str) -> Result<FileInfo, AnalysisError> {
        let url = format!("{API_BASE}/upload/v1beta/files?key={}", self.key());

        let resp = self
            .client
            .post(&url)
            .header("X-Goog-Upload-Protocol", "raw")
            .header(reqwest::header::CONTENT_TYPE, mime_hint)
            .body(media.to_vec())
            .send()
            .await
            .map_err(|e| AnalysisError::Http(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(Self::map_status(resp.status()));
        }

        let uploaded: UploadResponse = resp
            .json()
            .await
            .map_err(|e| AnalysisError::InvalidReply(e.to_string()))?;
        let mut file = uploaded.file;
        debug!(name = %file.name, state = %file.state, "Media uploaded");

        let deadline = tokio::time::Instant::now() + FILE_POLL_TIMEOUT;
        while file.state == "PROCESSING" {
            if tokio::time::Instant::now() >= deadline {
                return Err(AnalysisError::MediaProcessing(
                    "file stuck in PROCESSING".into(),
                ));
            }
            tokio::time::sleep(FILE_POLL_INTERVAL).await;
            file = self.get_file(&file.name).await?;
        }

        if file.state == "FAILED" {
            return Err(AnalysisError::MediaProcessing(format!(
                "upload processing failed for {}",
                file.name
            )));
        }

        Ok(file)
    }

    async fn get_file(&self, name: &str) -> Result<FileInfo, AnalysisError> {
        let url = format!("{API_BASE}/v1beta/{name}?key={}", self.key());
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| AnalysisError::Http(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(Self::map_status(resp.status()));
        }

        resp.json()
            .await
            .map_err(|e| AnalysisError::InvalidReply(e.to_string()))
    }

    /// Best-effort cleanup of an uploaded file.
    async fn delete_file(&self, name: &str) {
        let url = format!("{API_BASE}/v1beta/{name}?key={}", self.key());
        if let Err(e) = self.client.delete(&url).send().await {
            warn!(name, error = %e, "Failed to delete uploaded media file");
        }
    }
}

#[async_trait::async_trait]
impl TextAnalyzer for GeminiClient {
    async fn analyze_text(
        &self,
        company_name: &str,
        transcript: &str,
    ) -> Result<AnalysisReport, AnalysisError> {
        info!(company = company_name, chars = transcript.len(), "Summarizing transcript text");
        let prompt = analysis_prompt(company_name);
        let parts = vec![serde_json::json!({
            "text": format!("{prompt}\n\n**Transcript:**\n---\n{transcript}\n---")
        })];
        self.generate(parts).await
    }

    async fn extract_company_name(&self, text: &str) -> Result<String, AnalysisError> {
        // The letterhead and subject line sit at the top of the document;
        // the opening excerpt is enough to identify the company.
        let excerpt: String = text.chars().take(2000).collect();
        let prompt = format!(
            "The following text is from a corporate stock-exchange announcement. \
Identify the company it concerns and reply with the official company name \
only, with no quotes, markup, or extra words.\n\n---\n{excerpt}\n---"
        );

        let raw = self
            .generate_text(vec![serde_json::json!({ "text": prompt })])
            .await?;
        let name = strip_code_fences(&raw).trim().trim_matches('"').trim();
        if name.is_empty() || name.len() > 120 || name.contains('\n') {
            return Err(AnalysisError::InvalidReply(format!(
                "implausible company name: {name:?}"
            )));
        }
        Ok(name.to_string())
    }
}

#[async_trait::async_trait]
impl MediaAnalyzer for GeminiClient {
    async fn analyze_media(
        &self,
        company_name: &str,
        media: &[u8],
        mime_hint: &str,
    ) -> Result<AnalysisReport, AnalysisError> {
        info!(
            company = company_name,
            bytes = media.len(),
            mime = mime_hint,
            "Summarizing media file"
        );
        let file = self.upload_media(media, mime_hint).await?;

        let parts = vec![
            serde_json::json!({ "text": analysis_prompt(company_name) }),
            serde_json::json!({
                "fileData": { "mimeType": mime_hint, "fileUri": file.uri }
            }),
        ];
        let result = self.generate(parts).await;

        self.delete_file(&file.name).await;
        result
    }
}

/// Shared analyst prompt. The same instructions work for transcript text
/// and for an attached media file.
fn analysis_prompt(company_name: &str) -> String {
    format!(
        "You are a seasoned financial analyst's assistant reviewing a corporate \
earnings-call announcement for the company '{company_name}'.

Instructions:
1. Review the full material (transcript text or attached recording).
2. Extract the key insights: revenue, margins and profitability trends; \
strategic initiatives and growth drivers; management guidance and capital \
allocation; risks and competitive positioning; market outlook.
3. Write the summary as 12-15 clear, investment-oriented sentences.
4. Conclude with a single sentiment label reflecting the company's tone \
and outlook.

Sentiment options (choose exactly one):
- Strongly Bullish
- Moderately Bullish
- Neutral
- Cautious/Bearish
- Strongly Bearish

Output format: return a single valid JSON object, nothing else:
{{
  \"company_name\": \"{company_name}\",
  \"summary_points\": [\"Sentence 1\", \"Sentence 2\", \"...\"],
  \"sentiment\": \"Strongly Bullish | Moderately Bullish | Neutral | Cautious/Bearish | Strongly Bearish\"
}}"
    )
}

/// Strip an optional ```json fence around the model reply.
fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let trimmed = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    trimmed.strip_suffix("```").unwrap_or(trimmed).trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Sentiment;

    #[test]
    fn strips_json_fences() {
        assert_eq!(strip_code_fences("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fences("```\n{}\n```"), "{}");
        assert_eq!(strip_code_fences("  {\"a\":1} "), "{\"a\":1}");
    }

    #[test]
    fn parses_model_reply_with_extra_fields() {
        let raw = r#"```json
{
  "company_name": "Acme Ltd",
  "summary_points": ["Revenue grew.", "Margins held."],
  "sentiment": "Moderately Bullish"
}
```"#;
        let reply: ModelReply = serde_json::from_str(strip_code_fences(raw)).unwrap();
        assert_eq!(reply.summary_points.len(), 2);
        assert_eq!(reply.sentiment, Sentiment::ModeratelyBullish);
    }

    #[test]
    fn prompt_names_the_company_and_labels() {
        let p = analysis_prompt("Acme Ltd");
        assert!(p.contains("Acme Ltd"));
        assert!(p.contains("Cautious/Bearish"));
    }
}
