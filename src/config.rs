//! Configuration types.
//!
//! Plain structs with defaults. The binaries read environment variables,
//! build these, and hand them to the core — the core itself never branches
//! on which mode it is running in.

use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;
use crate::retry::RetryPolicy;

fn require_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Core pipeline configuration.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Cap on *new* announcements admitted per cycle (0 = unlimited).
    pub max_items: usize,
    /// Delay between successive notification sends.
    pub pacing: Duration,
    /// Retry policy applied to every external call.
    pub retry: RetryPolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_items: 0,
            pacing: Duration::from_secs(2),
            retry: RetryPolicy::default(),
        }
    }
}

/// Exchange feed endpoints and query constants.
#[derive(Debug, Clone)]
pub struct SourceConfig {
    /// Announcement listing API.
    pub feed_url: String,
    /// XBRL attachment-resolution endpoint.
    pub attachment_url: String,
    /// Feed category filter.
    pub category: String,
    /// Feed subcategory filter.
    pub subcategory: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            feed_url: "https://api.bseindia.com/BseIndiaAPI/api/AnnSubCategoryGetData/w".into(),
            attachment_url: "https://www.bseindia.com/Msource/90D/CorpXbrlGen.aspx".into(),
            category: "Company Update".into(),
            subcategory: "Earnings Call Transcript".into(),
        }
    }
}

/// Telegram delivery configuration: one bot, two channels.
#[derive(Clone)]
pub struct TelegramConfig {
    pub bot_token: SecretString,
    /// Chat receiving successful summaries.
    pub chat_summaries: String,
    /// Chat receiving link notices and failures.
    pub chat_links: String,
}

impl TelegramConfig {
    /// Read Telegram credentials from the environment.
    ///
    /// Returns `Ok(None)` when no bot token is set — delivery is optional
    /// and callers fall back to the disabled notifier. A token without both
    /// chat ids is a misconfiguration and errors out.
    pub fn from_env() -> Result<Option<Self>, ConfigError> {
        let Ok(token) = std::env::var("TELEGRAM_BOT_TOKEN") else {
            return Ok(None);
        };
        Ok(Some(Self {
            bot_token: SecretString::from(token),
            chat_summaries: require_env("TELEGRAM_CHAT_ID_SUMMARIES")?,
            chat_links: require_env("TELEGRAM_CHAT_ID_LINKS")?,
        }))
    }
}

impl std::fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("bot_token", &"<redacted>")
            .field("chat_summaries", &self.chat_summaries)
            .field("chat_links", &self.chat_links)
            .finish()
    }
}

/// Gemini analysis backend configuration.
#[derive(Clone)]
pub struct GeminiConfig {
    pub api_key: SecretString,
    pub model: String,
}

impl GeminiConfig {
    pub fn new(api_key: SecretString) -> Self {
        Self {
            api_key,
            model: "gemini-flash-lite-latest".into(),
        }
    }

    /// GEMINI_API_KEY is required; GEMINI_MODEL overrides the default model.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::new(SecretString::from(require_env("GEMINI_API_KEY")?));
        if let Ok(model) = std::env::var("GEMINI_MODEL") {
            config.model = model;
        }
        Ok(config)
    }
}

impl std::fmt::Debug for GeminiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiConfig")
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .finish()
    }
}
