//! Deferred notification delivery.
//!
//! Processing never sends anything inline. Each terminal outcome becomes a
//! [`NotificationUnit`] appended to an in-memory FIFO queue; once the cycle
//! finishes, the queue is drained strictly in insertion order with a pacing
//! delay between sends. One failed send is logged and skipped — it never
//! blocks the rest of the queue.

pub mod format;
pub mod telegram;

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{error, info, warn};

use crate::error::NotifyError;
use crate::model::Outcome;
use crate::retry::{RetryPolicy, with_retry};

pub use telegram::TelegramNotifier;

/// Delivery channel for one notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyChannel {
    /// Successful summaries.
    Summaries,
    /// Link notices and failures.
    LinksAndErrors,
}

/// A deferred "send this outcome to this channel" value.
///
/// Plain data, owned by the queue from creation until executed.
#[derive(Debug, Clone)]
pub struct NotificationUnit {
    pub channel: NotifyChannel,
    pub company_name: String,
    /// The original announcement document, when known.
    pub document_url: Option<String>,
    pub outcome: Outcome,
}

impl NotificationUnit {
    /// Build a unit for a terminal outcome, picking the channel from its kind.
    pub fn for_outcome(company_name: &str, document_url: Option<String>, outcome: Outcome) -> Self {
        let channel = match &outcome {
            Outcome::Summary { .. } | Outcome::MediaSummary { .. } => NotifyChannel::Summaries,
            Outcome::LinkNotice { .. } | Outcome::Failure { .. } => NotifyChannel::LinksAndErrors,
        };
        Self {
            channel,
            company_name: company_name.to_string(),
            document_url,
            outcome,
        }
    }
}

/// Sends pre-formatted messages to a delivery channel.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, channel: NotifyChannel, message: &str) -> Result<(), NotifyError>;
}

/// No-op notifier used when delivery credentials are absent.
/// Logs the message at info level and reports success.
pub struct DisabledNotifier;

#[async_trait]
impl Notifier for DisabledNotifier {
    async fn send(&self, channel: NotifyChannel, message: &str) -> Result<(), NotifyError> {
        info!(?channel, chars = message.len(), "Notifications disabled; dropping message");
        Ok(())
    }
}

/// FIFO queue of deferred notifications for one cycle.
#[derive(Default)]
pub struct NotificationQueue {
    units: VecDeque<NotificationUnit>,
}

impl NotificationQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&mut self, unit: NotificationUnit) {
        self.units.push_back(unit);
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Send every queued unit in insertion order, `pacing` apart.
    ///
    /// Each send gets its own retry envelope. Returns how many units were
    /// delivered successfully.
    pub async fn drain(
        &mut self,
        notifier: &dyn Notifier,
        pacing: Duration,
        retry: RetryPolicy,
    ) -> usize {
        let total = self.units.len();
        if total == 0 {
            return 0;
        }
        info!(total, "Sending notifications sequentially");

        let mut sent = 0;
        let mut index = 0;
        while let Some(unit) = self.units.pop_front() {
            index += 1;
            info!(index, total, company = %unit.company_name, "Sending notification");

            let message = format::render(&unit);
            let result = with_retry(retry, "notification send", || {
                notifier.send(unit.channel, &message)
            })
            .await;

            match result {
                Ok(()) => sent += 1,
                Err(e) => {
                    // Skip and keep draining; one bad message must not block
                    // delivery of the rest.
                    error!(company = %unit.company_name, error = %e, "Notification failed; skipping");
                }
            }

            if !self.units.is_empty() {
                tokio::time::sleep(pacing).await;
            }
        }

        if sent < total {
            warn!(sent, total, "Some notifications were not delivered");
        } else {
            info!(sent, "All notifications sent");
        }
        sent
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::model::Sentiment;

    /// Records sends; fails permanently for a named company.
    struct RecordingNotifier {
        sent: Mutex<Vec<(NotifyChannel, String)>>,
        fail_for: Option<String>,
    }

    impl RecordingNotifier {
        fn new(fail_for: Option<&str>) -> Self {
            Self {
                sent: Mutex::new(Vec::new()),
                fail_for: fail_for.map(String::from),
            }
        }
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn send(&self, channel: NotifyChannel, message: &str) -> Result<(), NotifyError> {
            if let Some(bad) = &self.fail_for {
                if message.contains(bad.as_str()) {
                    return Err(NotifyError::Rejected {
                        reason: "bad markup".into(),
                    });
                }
            }
            self.sent.lock().unwrap().push((channel, message.to_string()));
            Ok(())
        }
    }

    fn unit(company: &str, outcome: Outcome) -> NotificationUnit {
        NotificationUnit::for_outcome(company, None, outcome)
    }

    fn summary_outcome() -> Outcome {
        Outcome::Summary {
            points: vec!["Revenue grew.".into()],
            sentiment: Sentiment::Neutral,
        }
    }

    #[test]
    fn channel_follows_outcome_kind() {
        assert_eq!(unit("A", summary_outcome()).channel, NotifyChannel::Summaries);
        assert_eq!(
            unit("A", Outcome::LinkNotice { url: "https://x".into() }).channel,
            NotifyChannel::LinksAndErrors
        );
        assert_eq!(
            unit("A", Outcome::Failure { reason: "r".into() }).channel,
            NotifyChannel::LinksAndErrors
        );
    }

    #[tokio::test(start_paused = true)]
    async fn drains_in_fifo_order() {
        let notifier = RecordingNotifier::new(None);
        let mut queue = NotificationQueue::new();
        for name in ["Alpha", "Beta", "Gamma"] {
            queue.enqueue(unit(name, summary_outcome()));
        }

        let sent = queue
            .drain(&notifier, Duration::from_secs(2), RetryPolicy::default())
            .await;

        assert_eq!(sent, 3);
        let messages = notifier.sent.lock().unwrap();
        assert!(messages[0].1.contains("Alpha"));
        assert!(messages[1].1.contains("Beta"));
        assert!(messages[2].1.contains("Gamma"));
    }

    #[tokio::test(start_paused = true)]
    async fn failed_send_does_not_abort_drain() {
        let notifier = RecordingNotifier::new(Some("Beta"));
        let mut queue = NotificationQueue::new();
        for name in ["Alpha", "Beta", "Gamma"] {
            queue.enqueue(unit(name, summary_outcome()));
        }

        let sent = queue
            .drain(&notifier, Duration::from_millis(10), RetryPolicy::default())
            .await;

        assert_eq!(sent, 2);
        assert!(queue.is_empty());
        let messages = notifier.sent.lock().unwrap();
        assert_eq!(messages.len(), 2);
        assert!(messages[1].1.contains("Gamma"));
    }
}
