//! End-to-end pipeline scenarios against an in-memory ledger, with mocked
//! source, fetcher, analyzers, and notifier.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;

use earnings_watch::analyze::{MediaAnalyzer, TextAnalyzer};
use earnings_watch::classify::Classifier;
use earnings_watch::config::PipelineConfig;
use earnings_watch::error::{AnalysisError, FetchError, NotifyError, SourceError};
use earnings_watch::extract::PlainTextExtractor;
use earnings_watch::model::{
    Announcement, AnalysisReport, FetchWindow, Outcome, Sentiment, Status,
};
use earnings_watch::notify::{Notifier, NotifyChannel};
use earnings_watch::pipeline::Pipeline;
use earnings_watch::router::AnalysisRouter;
use earnings_watch::source::{AnnouncementSource, DocumentFetcher};
use earnings_watch::store::{Ledger, LibSqlLedger};

struct StaticSource;

#[async_trait]
impl AnnouncementSource for StaticSource {
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

/// Serves documents from a url->bytes map; anything else is a hard 404.
struct MapFetcher {
    documents: HashMap<String, Vec<u8>>,
    calls: AtomicU32,
}

impl MapFetcher {
    fn new(documents: HashMap<String, Vec<u8>>) -> Self {
        Self {
            documents,
            calls: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl DocumentFetcher for MapFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.documents.get(url) {
            Some(bytes) => Ok(bytes.clone()),
            None => Err(FetchError::Status {
                url: url.to_string(),
                code: 404,
            }),
        }
    }
}

#[derive(Default)]
struct CountingAnalyzer {
    text_calls: AtomicU32,
    media_calls: AtomicU32,
    name_calls: AtomicU32,
}

#[async_trait]
impl TextAnalyzer for CountingAnalyzer {
    async fn analyze_text(
        &self,
        _company: &str,
        _transcript: &str,
    ) -> Result<AnalysisReport, AnalysisError> {
        self.text_calls.fetch_add(1, Ordering::SeqCst);
        Ok(AnalysisReport {
            summary_points: vec!["Margins expanded year over year.".into()],
            sentiment: Sentiment::ModeratelyBullish,
        })
    }

    async fn extract_company_name(&self, _text: &str) -> Result<String, AnalysisError> {
        self.name_calls.fetch_add(1, Ordering::SeqCst);
        Ok("Signal Industries".into())
    }
}

#[async_trait]
impl MediaAnalyzer for CountingAnalyzer {
    async fn analyze_media(
        &self,
        _company: &str,
        _media: &[u8],
        _mime: &str,
    ) -> Result<AnalysisReport, AnalysisError> {
        self.media_calls.fetch_add(1, Ordering::SeqCst);
        Ok(AnalysisReport {
            summary_points: vec!["Management reiterated guidance.".into()],
            sentiment: Sentiment::Neutral,
        })
    }
}

#[derive(Default)]
struct RecordingNotifier {
    sent: Mutex<Vec<(NotifyChannel, String)>>,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, channel: NotifyChannel, message: &str) -> Result<(), NotifyError> {
        self.sent.lock().unwrap().push((channel, message.to_string()));
        Ok(())
    }
}

struct Harness {
    pipeline: Pipeline,
    ledger: Arc<dyn Ledger>,
    fetcher: Arc<MapFetcher>,
    analyzer: Arc<CountingAnalyzer>,
    notifier: Arc<RecordingNotifier>,
}

async fn harness(documents: HashMap<String, Vec<u8>>) -> Harness {
    let ledger: Arc<dyn Ledger> = Arc::new(LibSqlLedger::new_memory().await.unwrap());
    let fetcher = Arc::new(MapFetcher::new(documents));
    let analyzer = Arc::new(CountingAnalyzer::default());
    let notifier = Arc::new(RecordingNotifier::default());

    let config = PipelineConfig::default();
    let router = AnalysisRouter::new(
        analyzer.clone(),
        analyzer.clone(),
        fetcher.clone(),
        config.retry,
    );
    let pipeline = Pipeline::new(
        ledger.clone(),
        Arc::new(StaticSource),
        fetcher.clone(),
        Classifier::new(Box::new(PlainTextExtractor)),
        router,
        notifier.clone(),
        config,
    );

    Harness {
        pipeline,
        ledger,
        fetcher,
        analyzer,
        notifier,
    }
}

fn announcement(id: &str, company: &str, url: &str) -> Announcement {
    Announcement {
        id: id.to_string(),
        company_id: "500001".into(),
        company_name: company.to_string(),
        document_url: Some(url.to_string()),
    }
}

/// A document of `n` form-feed separated pages.
fn pages(n: usize, line: &str) -> Vec<u8> {
    vec![format!("{line}\n"); n].join("\x0c").into_bytes()
}

#[tokio::test(start_paused = true)]
async fn full_transcript_is_summarized_and_processed() {
    let url = "https://exchange.example/doc/1001.txt";
    let h = harness(HashMap::from([(
        url.to_string(),
        pages(10, "Q1 earnings call transcript for Acme Industries."),
    )]))
    .await;

    let report = h
        .pipeline
        .process_cycle(vec![announcement("1001", "Acme Industries", url)])
        .await;

    assert_eq!(report.admitted, 1);
    assert_eq!(report.processed, 1);
    assert_eq!(report.failed, 0);
    assert_eq!(report.notifications_sent, 1);
    assert_eq!(h.analyzer.text_calls.load(Ordering::SeqCst), 1);

    let record = h.ledger.get("1001").await.unwrap().unwrap();
    assert_eq!(record.status, Status::Processed);
    assert!(matches!(record.result, Some(Outcome::Summary { .. })));

    let sent = h.notifier.sent.lock().unwrap();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, NotifyChannel::Summaries);
    assert!(sent[0].1.contains("Acme Industries"));
}

#[tokio::test(start_paused = true)]
async fn web_link_pointer_skips_analysis_entirely() {
    let url = "https://exchange.example/doc/1002.txt";
    let h = harness(HashMap::from([(
        url.to_string(),
        b"Details available at https://example.com/info for shareholders.".to_vec(),
    )]))
    .await;

    let report = h
        .pipeline
        .process_cycle(vec![announcement("1002", "Beta Corp", url)])
        .await;

    assert_eq!(report.processed, 1);
    assert_eq!(h.analyzer.text_calls.load(Ordering::SeqCst), 0);
    assert_eq!(h.analyzer.media_calls.load(Ordering::SeqCst), 0);
    // Only the pointer document itself was fetched.
    assert_eq!(h.fetcher.calls.load(Ordering::SeqCst), 1);

    let record = h.ledger.get("1002").await.unwrap().unwrap();
    assert_eq!(record.status, Status::Processed);
    assert!(
        matches!(record.result, Some(Outcome::LinkNotice { url }) if url == "https://example.com/info")
    );

    let sent = h.notifier.sent.lock().unwrap();
    assert_eq!(sent[0].0, NotifyChannel::LinksAndErrors);
}

#[tokio::test(start_paused = true)]
async fn media_pointer_runs_two_stage_analysis() {
    let doc_url = "https://exchange.example/doc/1003.txt";
    let media_url = "https://cdn.example.com/call.mp3";
    let h = harness(HashMap::from([
        (
            doc_url.to_string(),
            pages(2, "Audio recording: https://cdn.example.com/call.mp3"),
        ),
        (media_url.to_string(), vec![0x49, 0x44, 0x33]),
    ]))
    .await;

    let report = h
        .pipeline
        .process_cycle(vec![announcement("1003", "Gamma Ltd", doc_url)])
        .await;

    assert_eq!(report.processed, 1);
    assert_eq!(h.analyzer.media_calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.analyzer.text_calls.load(Ordering::SeqCst), 0);
    // Pointer document plus the media file.
    assert_eq!(h.fetcher.calls.load(Ordering::SeqCst), 2);

    let record = h.ledger.get("1003").await.unwrap().unwrap();
    assert_eq!(record.status, Status::Processed);
    assert!(
        matches!(record.result, Some(Outcome::MediaSummary { source_url, .. }) if source_url == media_url)
    );
}

#[tokio::test(start_paused = true)]
async fn permanent_fetch_failure_lands_in_error_with_one_attempt() {
    let h = harness(HashMap::new()).await;

    let report = h
        .pipeline
        .process_cycle(vec![announcement(
            "1004",
            "Delta Inc",
            "https://exchange.example/doc/missing.txt",
        )])
        .await;

    assert_eq!(report.failed, 1);
    assert_eq!(report.processed, 0);
    // 404 is permanent, so no retries.
    assert_eq!(h.fetcher.calls.load(Ordering::SeqCst), 1);

    let record = h.ledger.get("1004").await.unwrap().unwrap();
    assert_eq!(record.status, Status::Error);
    match record.result {
        Some(Outcome::Failure { reason }) => {
            assert!(reason.starts_with("document fetch failed"));
        }
        other => panic!("expected Failure, got {other:?}"),
    }

    let sent = h.notifier.sent.lock().unwrap();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, NotifyChannel::LinksAndErrors);
}

#[tokio::test(start_paused = true)]
async fn second_cycle_skips_handled_announcements() {
    let url = "https://exchange.example/doc/1005.txt";
    let h = harness(HashMap::from([(
        url.to_string(),
        pages(8, "Transcript body for the idempotence check."),
    )]))
    .await;

    let batch = vec![announcement("1005", "Epsilon Plc", url)];

    let first = h.pipeline.process_cycle(batch.clone()).await;
    assert_eq!(first.admitted, 1);
    assert_eq!(first.processed, 1);

    let second = h.pipeline.process_cycle(batch).await;
    assert_eq!(second.admitted, 0);
    assert_eq!(second.skipped, 1);
    assert_eq!(second.notifications_sent, 0);

    // Exactly one notification and one analysis across both cycles.
    assert_eq!(h.notifier.sent.lock().unwrap().len(), 1);
    assert_eq!(h.analyzer.text_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn seen_record_left_by_a_crash_is_resumed() {
    let url = "https://exchange.example/doc/1006.txt";
    let h = harness(HashMap::from([(
        url.to_string(),
        pages(10, "Transcript recovered after a crash before download."),
    )]))
    .await;

    // A crash between create and the post-fetch advance leaves SEEN behind.
    h.ledger.create("1006", "500001", "Zeta Ltd").await.unwrap();

    let report = h
        .pipeline
        .process_cycle(vec![announcement("1006", "Zeta Ltd", url)])
        .await;

    assert_eq!(report.admitted, 0);
    assert_eq!(report.resumed, 1);
    assert_eq!(report.skipped, 0);
    assert_eq!(report.processed, 1);
    assert_eq!(report.faulted, 0);

    let record = h.ledger.get("1006").await.unwrap().unwrap();
    assert_eq!(record.status, Status::Processed);
    assert!(matches!(record.result, Some(Outcome::Summary { .. })));
    assert_eq!(h.notifier.sent.lock().unwrap().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn downloaded_record_left_by_a_crash_is_resumed() {
    let url = "https://exchange.example/doc/1007.txt";
    let h = harness(HashMap::from([(
        url.to_string(),
        pages(10, "Transcript recovered after a crash before analysis."),
    )]))
    .await;

    h.ledger.create("1007", "500001", "Eta Ltd").await.unwrap();
    h.ledger
        .advance("1007", Status::Downloaded, None)
        .await
        .unwrap();

    let report = h
        .pipeline
        .process_cycle(vec![announcement("1007", "Eta Ltd", url)])
        .await;

    assert_eq!(report.resumed, 1);
    assert_eq!(report.processed, 1);
    // The DOWNLOADED advance is not repeated, so no transition fault occurs.
    assert_eq!(report.faulted, 0);
    assert_eq!(h.analyzer.text_calls.load(Ordering::SeqCst), 1);

    let record = h.ledger.get("1007").await.unwrap().unwrap();
    assert_eq!(record.status, Status::Processed);
    assert_eq!(h.notifier.sent.lock().unwrap().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn blank_company_name_is_recovered_from_the_document() {
    let url = "https://exchange.example/doc/1008.txt";
    let h = harness(HashMap::from([(
        url.to_string(),
        pages(10, "Letterhead of Signal Industries."),
    )]))
    .await;

    let report = h
        .pipeline
        .process_cycle(vec![announcement("1008", "N/A", url)])
        .await;

    assert_eq!(report.processed, 1);
    assert_eq!(h.analyzer.name_calls.load(Ordering::SeqCst), 1);

    let sent = h.notifier.sent.lock().unwrap();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].1.contains("Signal Industries"));
    assert!(!sent[0].1.contains("N/A"));
}

#[tokio::test(start_paused = true)]
async fn notifications_are_delivered_in_processing_order() {
    let docs: HashMap<String, Vec<u8>> = ["A", "B", "C"]
        .iter()
        .map(|name| {
            (
                format!("https://exchange.example/doc/{name}.txt"),
                pages(6, &format!("Transcript for company {name}.")),
            )
        })
        .collect();
    let h = harness(docs).await;

    let batch = ["A", "B", "C"]
        .iter()
        .map(|name| {
            announcement(
                &format!("id-{name}"),
                &format!("Company {name}"),
                &format!("https://exchange.example/doc/{name}.txt"),
            )
        })
        .collect();

    let report = h.pipeline.process_cycle(batch).await;
    assert_eq!(report.notifications_sent, 3);

    let sent = h.notifier.sent.lock().unwrap();
    assert!(sent[0].1.contains("Company A"));
    assert!(sent[1].1.contains("Company B"));
    assert!(sent[2].1.contains("Company C"));
}

#[tokio::test(start_paused = true)]
async fn item_cap_halts_admission_but_not_earlier_items() {
    let docs: HashMap<String, Vec<u8>> = (1..=3)
        .map(|n| {
            (
                format!("https://exchange.example/doc/cap-{n}.txt"),
                pages(6, "Capped-run transcript."),
            )
        })
        .collect();

    let ledger: Arc<dyn Ledger> = Arc::new(LibSqlLedger::new_memory().await.unwrap());
    let fetcher = Arc::new(MapFetcher::new(docs));
    let analyzer = Arc::new(CountingAnalyzer::default());
    let notifier = Arc::new(RecordingNotifier::default());
    let config = PipelineConfig {
        max_items: 2,
        ..Default::default()
    };
    let router = AnalysisRouter::new(
        analyzer.clone(),
        analyzer.clone(),
        fetcher.clone(),
        config.retry,
    );
    let pipeline = Pipeline::new(
        ledger.clone(),
        Arc::new(StaticSource),
        fetcher,
        Classifier::new(Box::new(PlainTextExtractor)),
        router,
        notifier.clone(),
        config,
    );

    let batch = (1..=3)
        .map(|n| {
            announcement(
                &format!("cap-{n}"),
                &format!("Cap {n}"),
                &format!("https://exchange.example/doc/cap-{n}.txt"),
            )
        })
        .collect();

    let report = pipeline.process_cycle(batch).await;
    assert_eq!(report.admitted, 2);
    assert_eq!(report.processed, 2);

    // The third item was never admitted, so no record exists and it will be
    // picked up by a later cycle.
    assert!(ledger.get("cap-3").await.unwrap().is_none());
    assert_eq!(notifier.sent.lock().unwrap().len(), 2);
}
