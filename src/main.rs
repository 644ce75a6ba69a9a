//! Live polling mode: fetch the lookback window on an interval, run the
//! pipeline, repeat. Ctrl-C finishes the in-flight cycle (including the
//! notification drain) before exiting.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing::{error, info, warn};

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

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Telegram notifier when credentials are present, otherwise a logging
/// no-op — the pipeline itself keeps running either way.
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
    let (log_dir, _guard) = logging::init("LIVE")?;

    let gemini_config = GeminiConfig::from_env()?;
    let db_path =
        std::env::var("EARNINGS_WATCH_DB_PATH").unwrap_or_else(|_| "./data/earnings-watch.db".into());
    let lookback_hours: u32 = env_parse("LOOKBACK_HOURS", 24);
    let poll_interval = Duration::from_secs(env_parse("POLL_INTERVAL_SECS", 60));
    let max_items: usize = env_parse("MAX_ITEMS_TO_PROCESS", 0);

    info!(log_dir = %log_dir.display(), "Starting earnings-watch live poller");
    info!(lookback_hours, interval_secs = poll_interval.as_secs(), "Live configuration");

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
    let notifier = build_notifier()?;

    let router = AnalysisRouter::new(gemini.clone(), gemini, fetcher.clone(), retry);
    let classifier = Classifier::new(Box::new(PlainTextExtractor));
    let pipeline = Pipeline::new(
        ledger,
        source.clone(),
        fetcher,
        classifier,
        router,
        notifier,
        pipeline_config,
    );

    let window = FetchWindow::LookbackHours(lookback_hours);
    let mut shutdown = Box::pin(tokio::signal::ctrl_c());

    loop {
        match source.fetch_recent(&window).await {
            Ok(mut announcements) => {
                // The feed lists newest first; process oldest first so
                // notification order matches chronology.
                announcements.reverse();
                pipeline.process_cycle(announcements).await;
            }
            Err(e) => error!(error = %e, "Feed fetch failed; will retry next cycle"),
        }

        info!(secs = poll_interval.as_secs(), "Waiting before next poll");
        tokio::select! {
            _ = &mut shutdown => {
                info!("Shutdown requested; exiting");
                break;
            }
            _ = tokio::time::sleep(poll_interval) => {}
        }
    }

    Ok(())
}
