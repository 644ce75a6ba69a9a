//! One-shot check: run a single local document through the full pipeline
//! (classification, analysis, routing) against a throwaway in-memory ledger
//! and print the stored outcome as JSON.
//!
//! Usage: check-document <path-to-document>

use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use tracing::info;

use earnings_watch::analyze::GeminiClient;
use earnings_watch::classify::Classifier;
use earnings_watch::config::{GeminiConfig, PipelineConfig};
use earnings_watch::error::{FetchError, SourceError};
use earnings_watch::extract::PlainTextExtractor;
use earnings_watch::logging;
use earnings_watch::model::{Announcement, FetchWindow};
use earnings_watch::notify::DisabledNotifier;
use earnings_watch::pipeline::Pipeline;
use earnings_watch::router::AnalysisRouter;
use earnings_watch::source::{AnnouncementSource, DocumentFetcher, HttpFetcher};
use earnings_watch::store::{Ledger, LibSqlLedger};

/// Serves the local document under check; anything else (e.g. a media link
/// the document points at) goes out over HTTP as usual.
struct LocalFileFetcher {
    http: HttpFetcher,
}

#[async_trait]
impl DocumentFetcher for LocalFileFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        if url.starts_with("http://") || url.starts_with("https://") {
            return self.http.fetch(url).await;
        }
        let path = url.strip_prefix("file://").unwrap_or(url);
        tokio::fs::read(path).await.map_err(|e| FetchError::Connection {
            url: url.to_string(),
            reason: e.to_string(),
        })
    }
}

/// No feed in check mode; the single announcement is built by hand.
struct NoSource;

#[async_trait]
impl AnnouncementSource for NoSource {
    async fn fetch_recent(&self, _window: &FetchWindow) -> Result<Vec<Announcement>, SourceError> {
        Ok(Vec::new())
    }

    async fn resolve_document_url(
        &self,
        id: &str,
        _company_id: &str,
    ) -> Result<String, SourceError> {
        Err(SourceError::MissingAttachment { id: id.to_string() })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let (_log_dir, _guard) = logging::init("CHECK")?;

    let path = std::env::args()
        .nth(1)
        .context("usage: check-document <path-to-document>")?;
    let gemini_config = GeminiConfig::from_env()?;

    let file_name = std::path::Path::new(&path)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("document")
        .to_string();
    let id = format!("check-{file_name}");

    info!(%path, "Checking document");

    let pipeline_config = PipelineConfig::default();
    let retry = pipeline_config.retry;

    let ledger: Arc<dyn Ledger> = Arc::new(LibSqlLedger::new_memory().await?);
    let fetcher = Arc::new(LocalFileFetcher {
        http: HttpFetcher::new(None),
    });
    let gemini = Arc::new(GeminiClient::new(gemini_config));

    let router = AnalysisRouter::new(gemini.clone(), gemini, fetcher.clone(), retry);
    let classifier = Classifier::new(Box::new(PlainTextExtractor));
    let pipeline = Pipeline::new(
        ledger.clone(),
        Arc::new(NoSource),
        fetcher,
        classifier,
        router,
        Arc::new(DisabledNotifier),
        pipeline_config,
    );

    let announcement = Announcement {
        id: id.clone(),
        company_id: "0".into(),
        company_name: file_name,
        document_url: Some(path),
    };
    pipeline.process_cycle(vec![announcement]).await;

    let record = ledger
        .get(&id)
        .await?
        .context("record missing after processing")?;
    println!("status: {}", record.status);
    match record.result {
        Some(outcome) => println!("{}", serde_json::to_string_pretty(&outcome)?),
        None => println!("(no result recorded)"),
    }
    Ok(())
}
