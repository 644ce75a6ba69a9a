//! Telegram delivery backend.
//!
//! One bot, two chats: summaries and links/errors. Messages arrive
//! pre-escaped for MarkdownV2; if Telegram still rejects the markup the
//! send is repeated once without a parse mode so the content gets through
//! as plain text. Long messages are split at the API's 4096-char limit.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::ExposeSecret;
use tracing::{debug, warn};

use crate::config::TelegramConfig;
use crate::error::NotifyError;
use crate::notify::{Notifier, NotifyChannel};

/// Maximum message length for Telegram's sendMessage API.
const TELEGRAM_MAX_MESSAGE_LENGTH: usize = 4096;

/// Telegram Bot API notifier.
pub struct TelegramNotifier {
    config: TelegramConfig,
    client: reqwest::Client,
}

impl TelegramNotifier {
    pub fn new(config: TelegramConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .unwrap_or_default();
        Self { config, client }
    }

    fn api_url(&self, method: &str) -> String {
        format!(
            "https://api.telegram.org/bot{}/{method}",
            self.config.bot_token.expose_secret()
        )
    }

    fn chat_id(&self, channel: NotifyChannel) -> &str {
        match channel {
            NotifyChannel::Summaries => &self.config.chat_summaries,
            NotifyChannel::LinksAndErrors => &self.config.chat_links,
        }
    }

    /// Send a single chunk, MarkdownV2 first with a plain-text fallback.
    async fn send_chunk(&self, chat_id: &str, text: &str) -> Result<(), NotifyError> {
        let markdown_body = serde_json::json!({
            "chat_id": chat_id,
            "text": text,
            "parse_mode": "MarkdownV2",
            "disable_web_page_preview": true,
        });

        let resp = self.post_message(&markdown_body).await?;
        if resp.status().is_success() {
            return Ok(());
        }

        let status = resp.status();
        if status.as_u16() == 400 {
            // Markup error; retry once as plain text rather than drop the content.
            warn!(chat_id, "MarkdownV2 rejected; resending as plain text");
            let plain_body = serde_json::json!({
                "chat_id": chat_id,
                "text": text,
                "disable_web_page_preview": true,
            });
            let plain_resp = self.post_message(&plain_body).await?;
            if plain_resp.status().is_success() {
                return Ok(());
            }
            let reason = plain_resp.text().await.unwrap_or_default();
            return Err(NotifyError::Rejected { reason });
        }

        let reason = resp.text().await.unwrap_or_default();
        if status.as_u16() == 429 || status.is_server_error() {
            Err(NotifyError::SendFailed {
                reason: format!("HTTP {status}: {reason}"),
            })
        } else {
            Err(NotifyError::Rejected {
                reason: format!("HTTP {status}: {reason}"),
            })
        }
    }

    async fn post_message(
        &self,
        body: &serde_json::Value,
    ) -> Result<reqwest::Response, NotifyError> {
        self.client
            .post(self.api_url("sendMessage"))
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    NotifyError::Timeout
                } else {
                    NotifyError::SendFailed {
                        reason: e.to_string(),
                    }
                }
            })
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, channel: NotifyChannel, message: &str) -> Result<(), NotifyError> {
        let chat_id = self.chat_id(channel);
        for chunk in split_message(message, TELEGRAM_MAX_MESSAGE_LENGTH) {
            self.send_chunk(chat_id, &chunk).await?;
        }
        debug!(chat_id, chars = message.len(), "Telegram message delivered");
        Ok(())
    }
}

/// Split a message into chunks under `max_len`, preferring newline boundaries.
fn split_message(text: &str, max_len: usize) -> Vec<String> {
    if text.len() <= max_len {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut current = String::new();
    for line in text.split_inclusive('\n') {
        if current.len() + line.len() > max_len && !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
        }
        // A single oversized line is split hard at char boundaries.
        if line.len() > max_len {
            let mut rest = line;
            while rest.len() > max_len {
                let mut cut = max_len;
                while !rest.is_char_boundary(cut) {
                    cut -= 1;
                }
                let (head, tail) = rest.split_at(cut);
                chunks.push(head.to_string());
                rest = tail;
            }
            current.push_str(rest);
        } else {
            current.push_str(line);
        }
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}
