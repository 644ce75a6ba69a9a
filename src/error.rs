//! Error types for earnings-watch.
//!
//! Each enum carries the transient/permanent split the retry envelope keys
//! off via [`Transience`](crate::retry::Transience): transient failures
//! (timeouts, 5xx, rate limits) are retried, permanent ones (4xx, auth,
//! malformed input) surface immediately.

use crate::retry::Transience;

/// Top-level error type for the pipeline.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("Analysis error: {0}")]
    Analysis(#[from] AnalysisError),

    #[error("Notification error: {0}")]
    Notify(#[from] NotifyError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),
}

/// Ledger (state store) errors.
///
/// `DuplicateKey` and `NotFound` are contract violations: the caller is
/// expected to have checked `exists` first. They abort the current item but
/// never the cycle.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Failed to open database: {0}")]
    Open(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Announcement {id} already recorded")]
    DuplicateKey { id: String },

    #[error("Announcement {id} not found")]
    NotFound { id: String },

    #[error("Announcement {id} cannot move from {from} to {to}")]
    InvalidTransition {
        id: String,
        from: String,
        to: String,
    },

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Announcement source (feed API + attachment resolution) errors.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("Feed request failed: {0}")]
    Http(String),

    #[error("Feed returned HTTP {code}")]
    Status { code: u16 },

    #[error("Could not decode feed response: {0}")]
    InvalidResponse(String),

    #[error("No attachment URL published for announcement {id}")]
    MissingAttachment { id: String },
}

impl Transience for SourceError {
    fn is_transient(&self) -> bool {
        match self {
            SourceError::Http(_) => true,
            SourceError::Status { code } => *code == 429 || *code >= 500,
            // The feed intermittently serves truncated JSON; worth retrying.
            SourceError::InvalidResponse(_) => true,
            SourceError::MissingAttachment { .. } => false,
        }
    }
}

/// Document/media download errors.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("Request to {url} timed out")]
    Timeout { url: String },

    #[error("Request to {url} failed: {reason}")]
    Connection { url: String, reason: String },

    #[error("{url} returned HTTP {code}")]
    Status { url: String, code: u16 },

    #[error("Unsupported document location: {url}")]
    UnsupportedLocation { url: String },
}

impl Transience for FetchError {
    fn is_transient(&self) -> bool {
        match self {
            FetchError::Timeout { .. } | FetchError::Connection { .. } => true,
            FetchError::Status { code, .. } => *code == 429 || *code >= 500,
            FetchError::UnsupportedLocation { .. } => false,
        }
    }
}

/// Analysis backend errors.
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error("Analysis request failed: {0}")]
    Http(String),

    #[error("Analysis backend returned HTTP {code}")]
    Status { code: u16 },

    #[error("Analysis backend rate limited")]
    RateLimited,

    #[error("Empty response body")]
    EmptyResponse,

    #[error("Could not decode model reply: {0}")]
    InvalidReply(String),

    #[error("Authentication failed")]
    Auth,

    #[error("Media upload processing failed: {0}")]
    MediaProcessing(String),
}

impl Transience for AnalysisError {
    fn is_transient(&self) -> bool {
        match self {
            AnalysisError::Http(_) | AnalysisError::RateLimited => true,
            AnalysisError::Status { code } => *code == 429 || *code >= 500,
            // The model occasionally returns empty or non-JSON bodies; a
            // fresh generation usually succeeds.
            AnalysisError::EmptyResponse | AnalysisError::InvalidReply(_) => true,
            AnalysisError::Auth | AnalysisError::MediaProcessing(_) => false,
        }
    }
}

/// Notification delivery errors.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("Send timed out")]
    Timeout,

    #[error("Send failed: {reason}")]
    SendFailed { reason: String },

    #[error("Notification backend rejected the message: {reason}")]
    Rejected { reason: String },
}

impl Transience for NotifyError {
    fn is_transient(&self) -> bool {
        match self {
            NotifyError::Timeout | NotifyError::SendFailed { .. } => true,
            NotifyError::Rejected { .. } => false,
        }
    }
}

/// Document text extraction errors.
///
/// Local decoding, never retried; the classifier converts these into an
/// `Unreadable` classification instead of propagating.
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("Document is not valid UTF-8 text")]
    Encoding,

    #[error("Document is empty")]
    Empty,
}

/// Result type alias for the pipeline.
pub type Result<T> = std::result::Result<T, Error>;
