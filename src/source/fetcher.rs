//! HTTP document fetcher.
//!
//! Plain GET with browser-ish headers (the exchange rejects bare clients).
//! HTTP status codes map onto the transient/permanent error taxonomy: 5xx
//! and 429 are worth retrying, 4xx are not.

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::error::FetchError;
use crate::source::DocumentFetcher;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36";

/// reqwest-backed fetcher for documents and media files.
pub struct HttpFetcher {
    client: reqwest::Client,
    referer: Option<String>,
}

impl HttpFetcher {
    pub fn new(referer: Option<String>) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(120))
            .build()
            .unwrap_or_default();
        Self { client, referer }
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new(None)
    }
}

#[async_trait]
impl DocumentFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(FetchError::UnsupportedLocation {
                url: url.to_string(),
            });
        }

        let mut request = self.client.get(url);
        if let Some(referer) = &self.referer {
            request = request.header(reqwest::header::REFERER, referer);
        }

        let resp = request.send().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout {
                    url: url.to_string(),
                }
            } else {
                FetchError::Connection {
                    url: url.to_string(),
                    reason: e.to_string(),
                }
            }
        })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                code: status.as_u16(),
            });
        }

        let bytes = resp.bytes().await.map_err(|e| FetchError::Connection {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        debug!(url, bytes = bytes.len(), "Document fetched");
        Ok(bytes.to_vec())
    }
}
