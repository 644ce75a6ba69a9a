//! Message rendering for Telegram's MarkdownV2 dialect.
//!
//! All user-facing text is escaped here; the notifier receives pre-escaped
//! messages and never has to re-escape.

use chrono::{FixedOffset, Utc};

use crate::model::Outcome;
use crate::notify::NotificationUnit;

/// Characters MarkdownV2 reserves.
const ESCAPE_CHARS: &[char] = &[
    '_', '*', '[', ']', '(', ')', '~', '`', '>', '#', '+', '-', '=', '|', '{', '}', '.', '!',
];

/// Escape every reserved MarkdownV2 character.
pub fn escape_markdown(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if ESCAPE_CHARS.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Parentheses inside an inline-link URL break the link markup; percent-encode them.
fn escape_url(url: &str) -> String {
    url.replace('(', "%28").replace(')', "%29")
}

/// Render timestamp in exchange-local time (IST).
fn timestamp() -> String {
    let ist = FixedOffset::east_opt(5 * 3600 + 1800).expect("valid IST offset");
    let now = Utc::now().with_timezone(&ist);
    escape_markdown(&now.format("%Y-%m-%d %H:%M IST").to_string())
}

fn document_link(document_url: &Option<String>) -> String {
    match document_url {
        Some(url) => format!("\n*Original document:* [Link]({})", escape_url(url)),
        None => String::new(),
    }
}

/// Render one notification unit into a MarkdownV2 message.
pub fn render(unit: &NotificationUnit) -> String {
    let company = escape_markdown(unit.company_name.trim());
    let doc_link = document_link(&unit.document_url);
    let ts = timestamp();

    match &unit.outcome {
        Outcome::Summary { points, sentiment } => {
            let bullet_points: Vec<String> = points
                .iter()
                .map(|p| format!("• {}", escape_markdown(p)))
                .collect();
            format!(
                "📊 *New AI Summary: {company}*\n\n\
                 *Sentiment:* `{}`\n\n\
                 *Key Points:*\n{}{doc_link}\n\n_{ts}_",
                escape_markdown(&sentiment.to_string()),
                bullet_points.join("\n"),
            )
        }
        Outcome::MediaSummary {
            points,
            sentiment,
            source_url,
        } => {
            let bullet_points: Vec<String> = points
                .iter()
                .map(|p| format!("• {}", escape_markdown(p)))
                .collect();
            format!(
                "📊 *New AI Summary: {company}*\n\n\
                 *Sentiment:* `{}`\n\n\
                 *Key Points:*\n{}{doc_link}\n\
                 *Media:* [Link]({})\n\n_{ts}_",
                escape_markdown(&sentiment.to_string()),
                bullet_points.join("\n"),
                escape_url(source_url),
            )
        }
        Outcome::LinkNotice { url } => {
            format!(
                "🔗 *Web Link Found: {company}*\n{doc_link}\n\
                 *Web Link:* [Link]({})\n\n_{ts}_",
                escape_url(url),
            )
        }
        Outcome::Failure { reason } => {
            format!(
                "❌ *Processing Failed*\n\
                 Company: {company}\n\
                 Error: `{}`{doc_link}\n\n_{ts}_",
                escape_markdown(reason),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Sentiment;
    use crate::notify::NotificationUnit;

    #[test]
    fn escapes_all_reserved_characters() {
        let escaped = escape_markdown("a.b-c (d) [e]!");
        assert_eq!(escaped, r"a\.b\-c \(d\) \[e\]\!");
    }

    #[test]
    fn url_parentheses_are_percent_encoded() {
        assert_eq!(
            escape_url("https://x.test/doc(1).pdf"),
            "https://x.test/doc%281%29.pdf"
        );
    }

    #[test]
    fn summary_message_contains_escaped_points() {
        let unit = NotificationUnit::for_outcome(
            "Acme Ltd.",
            Some("https://x.test/a.pdf".into()),
            crate::model::Outcome::Summary {
                points: vec!["Margins improved by 2.5%.".into()],
                sentiment: Sentiment::ModeratelyBullish,
            },
        );
        let message = render(&unit);
        assert!(message.contains(r"Acme Ltd\."));
        assert!(message.contains(r"• Margins improved by 2\.5%\."));
        assert!(message.contains("Moderately Bullish"));
        assert!(message.contains("Original document"));
    }

    #[test]
    fn failure_message_names_the_reason() {
        let unit = NotificationUnit::for_outcome(
            "Acme",
            None,
            crate::model::Outcome::Failure {
                reason: "media fetch failed: HTTP 404".into(),
            },
        );
        let message = render(&unit);
        assert!(message.starts_with("❌"));
        assert!(message.contains("media fetch failed"));
        assert!(!message.contains("Original document"));
    }
}
