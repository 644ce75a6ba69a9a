//! Core announcement-processing pipeline.
//!
//! One cycle walks the given announcements strictly sequentially:
//! admission against the ledger, document resolution and fetch, content
//! classification, analysis routing, durable status advance, and exactly
//! one queued notification per terminal outcome. Notifications are sent
//! only after the whole batch has been processed, in insertion order.
//!
//! Per-item failures — including ledger contract violations — are caught
//! at the item boundary and never abort the cycle.

use std::sync::Arc;

use tracing::{error, info, warn};

use crate::classify::{Classification, Classifier};
use crate::config::PipelineConfig;
use crate::error::StoreError;
use crate::model::{Announcement, Outcome, Status};
use crate::notify::{NotificationQueue, NotificationUnit, Notifier};
use crate::retry::with_retry;
use crate::router::AnalysisRouter;
use crate::source::{AnnouncementSource, DocumentFetcher};
use crate::store::Ledger;

/// How one announcement entered the cycle.
enum Admission {
    /// Never seen before; a fresh record was created.
    New,
    /// Left in a non-terminal status by an earlier run; work is resumed.
    Resume {
        /// The record is still in `SEEN`, so the `DOWNLOADED` advance is
        /// still owed after the document fetch.
        mark_downloaded: bool,
    },
    /// Already in a terminal status; skip entirely.
    Skip,
}

/// What happened during one cycle.
#[derive(Debug, Default, Clone, Copy)]
pub struct CycleReport {
    /// New announcements admitted.
    pub admitted: usize,
    /// Non-terminal leftovers resumed.
    pub resumed: usize,
    /// Announcements skipped as already handled.
    pub skipped: usize,
    /// Items that reached `PROCESSED`.
    pub processed: usize,
    /// Items that reached `ERROR`.
    pub failed: usize,
    /// Items aborted by a ledger fault (no terminal status reached).
    pub faulted: usize,
    /// Notifications delivered by the end-of-cycle drain.
    pub notifications_sent: usize,
}

/// The announcement-processing pipeline. All three entry modes feed this.
pub struct Pipeline {
    ledger: Arc<dyn Ledger>,
    source: Arc<dyn AnnouncementSource>,
    fetcher: Arc<dyn DocumentFetcher>,
    classifier: Classifier,
    router: AnalysisRouter,
    notifier: Arc<dyn Notifier>,
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(
        ledger: Arc<dyn Ledger>,
        source: Arc<dyn AnnouncementSource>,
        fetcher: Arc<dyn DocumentFetcher>,
        classifier: Classifier,
        router: AnalysisRouter,
        notifier: Arc<dyn Notifier>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            ledger,
            source,
            fetcher,
            classifier,
            router,
            notifier,
            config,
        }
    }

    /// Process one batch of announcements, then drain the notification queue.
    pub async fn process_cycle(&self, announcements: Vec<Announcement>) -> CycleReport {
        let mut report = CycleReport::default();
        let mut queue = NotificationQueue::new();

        info!(count = announcements.len(), "Starting pipeline cycle");

        for ann in &announcements {
            let admission = match self.admit(ann).await {
                Ok(admission) => admission,
                Err(e) => {
                    error!(id = %ann.id, error = %e, "Ledger fault during admission; skipping item");
                    report.faulted += 1;
                    continue;
                }
            };

            let mark_downloaded = match admission {
                Admission::Skip => {
                    report.skipped += 1;
                    continue;
                }
                Admission::New => {
                    if self.config.max_items > 0 && report.admitted >= self.config.max_items {
                        warn!(
                            max = self.config.max_items,
                            "Reached per-cycle item cap; halting admission"
                        );
                        break;
                    }
                    if let Err(e) = self
                        .ledger
                        .create(&ann.id, &ann.company_id, &ann.company_name)
                        .await
                    {
                        error!(id = %ann.id, error = %e, "Ledger fault creating record; skipping item");
                        report.faulted += 1;
                        continue;
                    }
                    report.admitted += 1;
                    info!(id = %ann.id, company = %ann.company_name, "New announcement");
                    true
                }
                Admission::Resume { mark_downloaded } => {
                    report.resumed += 1;
                    info!(id = %ann.id, company = %ann.company_name, "Resuming unfinished announcement");
                    mark_downloaded
                }
            };

            match self.process_item(ann, mark_downloaded, &mut queue).await {
                Ok(outcome) => {
                    if outcome.is_failure() {
                        report.failed += 1;
                    } else {
                        report.processed += 1;
                    }
                }
                Err(e) => {
                    error!(id = %ann.id, error = %e, "Ledger fault during processing; item left for next cycle");
                    report.faulted += 1;
                }
            }
        }

        report.notifications_sent = queue
            .drain(
                self.notifier.as_ref(),
                self.config.pacing,
                self.config.retry,
            )
            .await;

        info!(
            admitted = report.admitted,
            resumed = report.resumed,
            skipped = report.skipped,
            processed = report.processed,
            failed = report.failed,
            faulted = report.faulted,
            sent = report.notifications_sent,
            "Pipeline cycle complete"
        );
        report
    }

    /// Decide how an announcement enters the cycle from stored status alone.
    ///
    /// Any non-terminal record is resumed: a crash can strand a record in
    /// `SEEN` (between create and the post-fetch advance) just as well as in
    /// `DOWNLOADED`, and both must still reach a terminal status.
    async fn admit(&self, ann: &Announcement) -> Result<Admission, StoreError> {
        if !self.ledger.exists(&ann.id).await? {
            return Ok(Admission::New);
        }
        if !self.ledger.needs_processing(&ann.id).await? {
            return Ok(Admission::Skip);
        }
        let record = self
            .ledger
            .get(&ann.id)
            .await?
            .ok_or_else(|| StoreError::NotFound { id: ann.id.clone() })?;
        Ok(Admission::Resume {
            mark_downloaded: record.status == Status::Seen,
        })
    }

    /// Take one announcement from admitted to a terminal status, enqueueing
    /// exactly one notification unit. Only ledger faults propagate.
    async fn process_item(
        &self,
        ann: &Announcement,
        mark_downloaded: bool,
        queue: &mut NotificationQueue,
    ) -> Result<Outcome, StoreError> {
        // Document location: feed rows may carry it; otherwise resolve.
        let url = match &ann.document_url {
            Some(url) => url.clone(),
            None => {
                match with_retry(self.config.retry, "document resolution", || {
                    self.source.resolve_document_url(&ann.id, &ann.company_id)
                })
                .await
                {
                    Ok(url) => url,
                    Err(e) => {
                        let company = self
                            .router
                            .resolve_company_name(&ann.company_name, None)
                            .await;
                        let outcome = Outcome::Failure {
                            reason: format!("document resolution failed: {e}"),
                        };
                        return self.finish(ann, None, &company, outcome, queue).await;
                    }
                }
            }
        };

        let bytes = match with_retry(self.config.retry, "document fetch", || {
            self.fetcher.fetch(&url)
        })
        .await
        {
            Ok(bytes) => bytes,
            Err(e) => {
                let company = self
                    .router
                    .resolve_company_name(&ann.company_name, None)
                    .await;
                let outcome = Outcome::Failure {
                    reason: format!("document fetch failed: {e}"),
                };
                return self.finish(ann, Some(url), &company, outcome, queue).await;
            }
        };

        if mark_downloaded {
            self.ledger.advance(&ann.id, Status::Downloaded, None).await?;
        }

        let classification = self.classifier.classify(&bytes);
        if let Classification::FullContent { .. } = &classification {
            info!(id = %ann.id, "Classified as full transcript");
        }

        let company = self
            .router
            .resolve_company_name(&ann.company_name, Some(&classification))
            .await;
        let outcome = self.router.route(classification, &company).await;
        self.finish(ann, Some(url), &company, outcome, queue).await
    }

    /// Persist the terminal status and queue the notification.
    async fn finish(
        &self,
        ann: &Announcement,
        document_url: Option<String>,
        company_name: &str,
        outcome: Outcome,
        queue: &mut NotificationQueue,
    ) -> Result<Outcome, StoreError> {
        let status = outcome.terminal_status();
        self.ledger.advance(&ann.id, status, Some(&outcome)).await?;
        info!(id = %ann.id, status = %status, "Announcement finished");

        queue.enqueue(NotificationUnit::for_outcome(
            company_name,
            document_url,
            outcome.clone(),
        ));
        Ok(outcome)
    }
}
