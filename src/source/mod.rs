//! Announcement source and document fetch seams.

pub mod exchange;
pub mod fetcher;

use async_trait::async_trait;

use crate::error::{FetchError, SourceError};
use crate::model::{Announcement, FetchWindow};

/// Where announcements come from.
#[async_trait]
pub trait AnnouncementSource: Send + Sync {
    /// Fetch all announcements published in the given window.
    async fn fetch_recent(&self, window: &FetchWindow) -> Result<Vec<Announcement>, SourceError>;

    /// Resolve the document URL for one announcement (attachment lookup).
    async fn resolve_document_url(
        &self,
        id: &str,
        company_id: &str,
    ) -> Result<String, SourceError>;
}

/// Downloads documents and media files.
#[async_trait]
pub trait DocumentFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

pub use exchange::ExchangeSource;
pub use fetcher::HttpFetcher;
