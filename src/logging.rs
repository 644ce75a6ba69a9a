//! Run-scoped logging setup shared by the binaries.
//!
//! Console output plus a per-run log file under `logs/<LABEL>-<timestamp>/`.
//! The returned guard must stay alive for the duration of the process so
//! the non-blocking file writer flushes on exit.

use std::path::PathBuf;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Initialize tracing for one run. `label` tags the log directory
/// (e.g. "LIVE", "BACKFILL", "CHECK").
pub fn init(label: &str) -> anyhow::Result<(PathBuf, tracing_appender::non_blocking::WorkerGuard)> {
    let run_timestamp = chrono::Utc::now().format("%Y%m%d-%H%M%S");
    let log_dir = PathBuf::from("logs").join(format!("{label}-{run_timestamp}"));
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = tracing_appender::rolling::never(&log_dir, "run.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_ansi(false)
                .with_writer(file_writer),
        )
        .init();

    Ok((log_dir, guard))
}
