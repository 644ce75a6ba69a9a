//! Core domain types: announcements, processing status, and outcomes.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

// ── Announcements ───────────────────────────────────────────────────

/// One feed event referencing a company disclosure document.
///
/// Produced by an [`AnnouncementSource`](crate::source::AnnouncementSource)
/// (or built by hand in the single-document check mode).
#[derive(Debug, Clone)]
pub struct Announcement {
    /// Unique feed-native identifier.
    pub id: String,
    /// Exchange scrip/ticker code.
    pub company_id: String,
    /// Display name, as published by the feed.
    pub company_name: String,
    /// Document URL, when the feed row already carries one. `None` means
    /// the URL must be resolved through the attachment endpoint.
    pub document_url: Option<String>,
}

/// What slice of the feed a cycle should fetch.
#[derive(Debug, Clone)]
pub enum FetchWindow {
    /// Everything published in the last N hours (live mode).
    LookbackHours(u32),
    /// An explicit date range (backfill mode).
    Range { from: NaiveDate, to: NaiveDate },
}

// ── Processing status ───────────────────────────────────────────────

/// Announcement lifecycle: `Seen → Downloaded → Processed | Error`.
///
/// Transitions are monotonic; `Processed` and `Error` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Seen,
    Downloaded,
    Processed,
    Error,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Seen => "SEEN",
            Status::Downloaded => "DOWNLOADED",
            Status::Processed => "PROCESSED",
            Status::Error => "ERROR",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "SEEN" => Some(Status::Seen),
            "DOWNLOADED" => Some(Status::Downloaded),
            "PROCESSED" => Some(Status::Processed),
            "ERROR" => Some(Status::Error),
            _ => None,
        }
    }

    /// Ordering used to enforce monotonic transitions. The terminal states
    /// share a rank: neither can be reached from the other.
    pub fn rank(&self) -> u8 {
        match self {
            Status::Seen => 0,
            Status::Downloaded => 1,
            Status::Processed | Status::Error => 2,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Status::Processed | Status::Error)
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A persisted announcement row.
#[derive(Debug, Clone)]
pub struct AnnouncementRecord {
    pub id: String,
    pub company_id: String,
    pub company_name: String,
    pub created_at: DateTime<Utc>,
    pub status: Status,
    pub result: Option<Outcome>,
}

// ── Analysis results ────────────────────────────────────────────────

/// Sentiment label attached to every successful analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sentiment {
    #[serde(rename = "Strongly Bullish")]
    StronglyBullish,
    #[serde(rename = "Moderately Bullish")]
    ModeratelyBullish,
    #[serde(rename = "Neutral")]
    Neutral,
    #[serde(rename = "Cautious/Bearish")]
    CautiousBearish,
    #[serde(rename = "Strongly Bearish")]
    StronglyBearish,
}

impl std::fmt::Display for Sentiment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Sentiment::StronglyBullish => "Strongly Bullish",
            Sentiment::ModeratelyBullish => "Moderately Bullish",
            Sentiment::Neutral => "Neutral",
            Sentiment::CautiousBearish => "Cautious/Bearish",
            Sentiment::StronglyBearish => "Strongly Bearish",
        };
        f.write_str(label)
    }
}

/// What an analysis backend returns: bullet-point summary plus sentiment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub summary_points: Vec<String>,
    pub sentiment: Sentiment,
}

/// Normalized outcome of routing one classified document.
///
/// Serialized into the announcement record's result payload and rendered
/// into exactly one notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Outcome {
    /// Full-transcript analysis succeeded.
    Summary {
        points: Vec<String>,
        sentiment: Sentiment,
    },
    /// Pointer document held a plain web link; no analysis performed.
    LinkNotice { url: String },
    /// Referenced media file was fetched and analyzed.
    MediaSummary {
        points: Vec<String>,
        sentiment: Sentiment,
        source_url: String,
    },
    /// Any stage failed; `reason` names the failing stage.
    Failure { reason: String },
}

impl Outcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, Outcome::Failure { .. })
    }

    /// The terminal status this outcome maps to.
    pub fn terminal_status(&self) -> Status {
        if self.is_failure() {
            Status::Error
        } else {
            Status::Processed
        }
    }
}

/// Kind of media a pointer document references.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Audio,
    Video,
}

impl MediaKind {
    /// MIME type hint handed to the media analysis backend.
    pub fn mime_hint(&self, url: &str) -> &'static str {
        let lower = url.to_ascii_lowercase();
        match self {
            MediaKind::Video => "video/mp4",
            MediaKind::Audio => {
                if lower.contains(".wav") {
                    "audio/wav"
                } else if lower.contains(".m4a") {
                    "audio/mp4"
                } else {
                    "audio/mpeg"
                }
            }
        }
    }
}
