//! Backfill mode: process a historical date range in one pipeline cycle.
//!
//! START_DATE and END_DATE are inclusive, formatted YYYYMMDD. The per-cycle
//! item cap (MAX_ITEMS_TO_PROCESS) matters here: a wide range can surface
//! hundreds of announcements, and each analysis call costs quota.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use chrono::NaiveDate;
use tracing::{info, warn};

use earnings_watch::analyze::GeminiClient;
use earnings_watch::classify::Classifier;
use earnings_watch::config::{GeminiConfig, PipelineConfig, SourceConfig, TelegramConfig};
use earnings_watch::extract::PlainTextExtractor;
use earnings_watch::logging;
use earnings_watch::model::FetchWindow;
use earnings_watch::notify::{DisabledNotifier, Notifier, TelegramNotifier};
use earnings_watch::pipeline::Pipeline;
use earnings_watch::router::AnalysisRouter;
use earnings_watch::source::{AnnouncementSource, ExchangeSource, HttpFetcher};
use earnings_watch::store::{Ledger, LibSqlLedger};

fn env_date(key: &str) -> anyhow::Result<NaiveDate> {
    let raw = std::env::var(key).with_context(|| format!("{key} not set"))?;
    NaiveDate::parse_from_str(&raw, "%Y%m%d")
        .with_context(|| format!("{key} must be YYYYMMDD, got {raw:?}"))
}

fn build_notifier() -> anyhow::Result<Arc<dyn Notifier>> {
    match TelegramConfig::from_env()? {
        Some(config) => {
            info!("Telegram notifier enabled");
            Ok(Arc::new(TelegramNotifier::new(config)))
        }
        None => {
            warn!("TELEGRAM_BOT_TOKEN not set; notifications disabled");
            Ok(Arc::new(DisabledNotifier))
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let (log_dir, _guard) = logging::init("BACKFILL")?;

    let gemini_config = GeminiConfig::from_env()?;
    let from = env_date("START_DATE")?;
    let to = env_date("END_DATE")?;
    anyhow::ensure!(from <= to, "START_DATE must not be after END_DATE");

    let db_path =
        std::env::var("EARNINGS_WATCH_DB_PATH").unwrap_or_else(|_| "./data/earnings-watch.db".into());
    let max_items: usize = std::env::var("MAX_ITEMS_TO_PROCESS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);

    info!(log_dir = %log_dir.display(), %from, %to, max_items, "Starting backfill");

    let pipeline_config = PipelineConfig {
        max_items,
        ..Default::default()
    };
    let retry = pipeline_config.retry;

    let ledger: Arc<dyn Ledger> = Arc::new(
        LibSqlLedger::new_local(Path::new(&db_path))
            .await
            .with_context(|| format!("open ledger at {db_path}"))?,
    );
    let source: Arc<dyn AnnouncementSource> =
        Arc::new(ExchangeSource::new(SourceConfig::default(), retry));
    let fetcher = Arc::new(HttpFetcher::new(Some("https://www.bseindia.com/".into())));
    let gemini = Arc::new(GeminiClient::new(gemini_config));

    let router = AnalysisRouter::new(gemini.clone(), gemini, fetcher.clone(), retry);
    let classifier = Classifier::new(Box::new(PlainTextExtractor));
    let pipeline = Pipeline::new(
        ledger,
        source.clone(),
        fetcher,
        classifier,
        router,
        build_notifier()?,
        pipeline_config,
    );

    let mut announcements = source
        .fetch_recent(&FetchWindow::Range { from, to })
        .await
        .context("fetch announcement feed")?;
    // Oldest first, so notifications arrive in chronological order.
    announcements.reverse();

    let report = pipeline.process_cycle(announcements).await;
    info!(
        processed = report.processed,
        failed = report.failed,
        skipped = report.skipped,
        "Backfill complete"
    );
    Ok(())
}
