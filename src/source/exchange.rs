//! Exchange announcement feed client.
//!
//! Two endpoints: the subcategory listing API (JSON, paginated — the first
//! page carries the total row count) and the XBRL attachment endpoint
//! (namespaced XML carrying the document URL). Both go through the retry
//! envelope per request.

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use quick_xml::Reader;
use quick_xml::events::Event;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::config::SourceConfig;
use crate::error::SourceError;
use crate::model::{Announcement, FetchWindow};
use crate::retry::{RetryPolicy, with_retry};
use crate::source::AnnouncementSource;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36";

/// Feed client for the exchange announcement API.
pub struct ExchangeSource {
    config: SourceConfig,
    retry: RetryPolicy,
    client: reqwest::Client,
}

#[derive(Deserialize)]
struct FeedPage {
    #[serde(rename = "Table", default)]
    rows: Vec<FeedRow>,
    #[serde(rename = "Table1", default)]
    summary: Vec<serde_json::Value>,
}

#[derive(Deserialize)]
struct FeedRow {
    #[serde(rename = "NEWSID")]
    id: Option<String>,
    #[serde(rename = "SCRIP_CD")]
    scrip: Option<serde_json::Value>,
    #[serde(rename = "SLONGNAME")]
    name: Option<String>,
}

impl FeedPage {
    fn total_records(&self) -> u64 {
        self.summary
            .first()
            .and_then(|v| v.get("ROWCNT"))
            .and_then(|v| {
                v.as_u64()
                    .or_else(|| v.as_str().and_then(|s| s.parse().ok()))
            })
            .unwrap_or(0)
    }
}

impl FeedRow {
    fn into_announcement(self) -> Option<Announcement> {
        let id = self.id?;
        let company_id = match self.scrip {
            Some(serde_json::Value::String(s)) => s,
            Some(serde_json::Value::Number(n)) => n.to_string(),
            _ => String::new(),
        };
        let company_name = self.name.unwrap_or_default().trim().to_string();
        Some(Announcement {
            id,
            company_id,
            company_name,
            document_url: None,
        })
    }
}

impl ExchangeSource {
    pub fn new(config: SourceConfig, retry: RetryPolicy) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(std::time::Duration::from_secs(60))
            .build()
            .unwrap_or_default();
        Self {
            config,
            retry,
            client,
        }
    }

    fn date_bounds(window: &FetchWindow) -> (String, String) {
        match window {
            FetchWindow::LookbackHours(hours) => {
                let to = Utc::now();
                let from = to - ChronoDuration::hours(i64::from(*hours));
                (from.format("%Y%m%d").to_string(), to.format("%Y%m%d").to_string())
            }
            FetchWindow::Range { from, to } => (
                from.format("%Y%m%d").to_string(),
                to.format("%Y%m%d").to_string(),
            ),
        }
    }

    async fn fetch_page(
        &self,
        from: &str,
        to: &str,
        page_no: u32,
    ) -> Result<FeedPage, SourceError> {
        let params = [
            ("pageno", page_no.to_string()),
            ("strCat", self.config.category.clone()),
            ("strPrevDate", from.to_string()),
            ("strScrip", String::new()),
            ("strSearch", "P".to_string()),
            ("strToDate", to.to_string()),
            ("strType", "C".to_string()),
            ("subcategory", self.config.subcategory.clone()),
        ];

        let resp = self
            .client
            .get(&self.config.feed_url)
            .header(reqwest::header::REFERER, "https://www.bseindia.com/")
            .header(reqwest::header::ORIGIN, "https://www.bseindia.com")
            .query(&params)
            .send()
            .await
            .map_err(|e| SourceError::Http(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(SourceError::Status {
                code: status.as_u16(),
            });
        }

        resp.json()
            .await
            .map_err(|e| SourceError::InvalidResponse(e.to_string()))
    }
}

#[async_trait]
impl AnnouncementSource for ExchangeSource {
    async fn fetch_recent(&self, window: &FetchWindow) -> Result<Vec<Announcement>, SourceError> {
        let (from, to) = Self::date_bounds(window);
        info!(%from, %to, "Fetching announcement feed");

        let first = with_retry(self.retry, "feed page 1", || self.fetch_page(&from, &to, 1)).await?;

        let total = first.total_records();
        if total == 0 {
            info!("No feed records for this window");
            return Ok(Vec::new());
        }

        let per_page = first.rows.len() as u64;
        let mut announcements: Vec<Announcement> = first
            .rows
            .into_iter()
            .filter_map(FeedRow::into_announcement)
            .collect();

        if per_page > 0 {
            let pages = total_pages(total, per_page);
            for page_no in 2..=pages {
                debug!(page = page_no, pages, "Fetching feed page");
                let desc = format!("feed page {page_no}");
                let page = match with_retry(self.retry, &desc, || {
                    self.fetch_page(&from, &to, page_no)
                })
                .await
                {
                    Ok(page) => page,
                    Err(e) => {
                        // A dropped page truncates the window; the missing
                        // items come back on a later cycle via the ledger.
                        warn!(page = page_no, error = %e, "Feed page failed; stopping pagination");
                        break;
                    }
                };
                if page.rows.is_empty() {
                    break;
                }
                announcements.extend(page.rows.into_iter().filter_map(FeedRow::into_announcement));
            }
        }

        info!(count = announcements.len(), "Feed fetch complete");
        Ok(announcements)
    }

    async fn resolve_document_url(
        &self,
        id: &str,
        company_id: &str,
    ) -> Result<String, SourceError> {
        let resp = self
            .client
            .get(&self.config.attachment_url)
            .header(reqwest::header::REFERER, "https://www.bseindia.com/")
            .query(&[("Bsenewid", id), ("Scripcode", company_id)])
            .send()
            .await
            .map_err(|e| SourceError::Http(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(SourceError::Status {
                code: status.as_u16(),
            });
        }

        let body = resp
            .text()
            .await
            .map_err(|e| SourceError::InvalidResponse(e.to_string()))?;

        attachment_url_from_xml(&body)?.ok_or_else(|| SourceError::MissingAttachment {
            id: id.to_string(),
        })
    }
}

/// Page count for the feed's ROWCNT-driven pagination. Saturates at
/// `u32::MAX` rather than truncating an absurd row count.
fn total_pages(total: u64, per_page: u64) -> u32 {
    if per_page == 0 {
        return 1;
    }
    u32::try_from(total.div_ceil(per_page)).unwrap_or(u32::MAX)
}

/// Pull the text of the first `AttachmentURL` element, ignoring namespaces.
fn attachment_url_from_xml(xml: &str) -> Result<Option<String>, SourceError> {
    let mut reader = Reader::from_str(xml);
    let mut inside = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) if e.local_name().as_ref() == b"AttachmentURL" => {
                inside = true;
            }
            Ok(Event::Text(t)) if inside => {
                let url = t
                    .unescape()
                    .map_err(|e| SourceError::InvalidResponse(e.to_string()))?
                    .trim()
                    .to_string();
                if !url.is_empty() {
                    return Ok(Some(url));
                }
            }
            Ok(Event::End(_)) => inside = false,
            Ok(Event::Eof) => return Ok(None),
            Err(e) => return Err(SourceError::InvalidResponse(e.to_string())),
            _ => {}
        }
    }
}
