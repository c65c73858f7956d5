use teloxide::payloads::SendMessageSetters;
use teloxide::prelude::*;
use teloxide::types::ParseMode;
use tracing::{debug, info, warn};

use common::Signal;

/// Characters MarkdownV2 treats as markup. Backslash is handled first.
const MARKDOWN_V2_SPECIAL: &str = "_*[]()~`>#+-=|{}.!";

/// Outgoing-only Telegram channel for human-readable notifications.
///
/// Without a token and chat id the notifier stays usable but only logs what
/// it would have sent.
pub struct TelegramNotifier {
    target: Option<(Bot, ChatId)>,
}

impl TelegramNotifier {
    pub fn new(token: Option<String>, chat_id: Option<i64>) -> Self {
        match (token, chat_id) {
            (Some(token), Some(chat_id)) => {
                info!("Telegram notifier initialized");
                Self {
                    target: Some((Bot::new(token), ChatId(chat_id))),
                }
            }
            _ => {
                warn!("Telegram token or chat id not configured — notifications will only be logged");
                Self::disabled()
            }
        }
    }

    pub fn disabled() -> Self {
        Self { target: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.target.is_some()
    }

    /// Escape `message` for MarkdownV2 and send it. Failures are logged.
    pub async fn send_message(&self, message: &str) {
        let Some((bot, chat_id)) = &self.target else {
            warn!(message = %preview(message), "Telegram not configured, message not sent");
            return;
        };

        let result = bot
            .send_message(*chat_id, escape_markdown_v2(message))
            .parse_mode(ParseMode::MarkdownV2)
            .await;

        match result {
            Ok(_) => debug!(message = %preview(message), "Telegram message sent"),
            Err(e) => warn!(chat_id = ?chat_id, error = %e, "Failed to send Telegram message"),
        }
    }
}

/// Escape text so Telegram renders it literally under MarkdownV2.
pub fn escape_markdown_v2(text: &str) -> String {
    let mut out = String::with_capacity(text.len() * 2);
    for ch in text.chars() {
        if ch == '\\' || MARKDOWN_V2_SPECIAL.contains(ch) {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

/// Plain-text summary of a signal, evidence first and reason last.
pub fn format_signal(signal: &Signal) -> String {
    let mut text = format!("{} signal on {}", signal.signal_type(), signal.symbol());
    for (key, value) in signal.details() {
        if key != Signal::REASON {
            text.push_str(&format!("\n{key}: {value}"));
        }
    }
    if let Some(reason) = signal.reason() {
        text.push_str(&format!("\nReason: {reason}"));
    }
    text
}

fn preview(message: &str) -> String {
    message.chars().take(50).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::SignalType;

    #[test]
    fn escapes_every_special_character() {
        assert_eq!(
            escape_markdown_v2("Price: 1.5 (up) - done!"),
            "Price: 1\\.5 \\(up\\) \\- done\\!"
        );
        assert_eq!(
            escape_markdown_v2("a_b*c[d]e~f`g>h#i+j=k|l{m}n"),
            "a\\_b\\*c\\[d\\]e\\~f\\`g\\>h\\#i\\+j\\=k\\|l\\{m\\}n"
        );
    }

    #[test]
    fn backslash_is_escaped_once() {
        assert_eq!(escape_markdown_v2("a\\b"), "a\\\\b");
        assert_eq!(escape_markdown_v2("\\."), "\\\\\\.");
    }

    #[test]
    fn plain_text_is_untouched() {
        assert_eq!(escape_markdown_v2("Arbix started"), "Arbix started");
    }

    #[test]
    fn formats_signal_with_evidence() {
        let signal = Signal::new(SignalType::Sell, "BTCUSDT")
            .with_detail(Signal::REASON, "Bearish crossover")
            .with_detail(Signal::PRICE_AT_SIGNAL, 8.0)
            .with_detail(Signal::SHORT_SMA, 8.5)
            .with_detail(Signal::LONG_SMA, 9.0);

        assert_eq!(
            format_signal(&signal),
            "SELL signal on BTCUSDT\n\
             long_sma: 9\n\
             price_at_signal: 8\n\
             short_sma: 8.5\n\
             Reason: Bearish crossover"
        );
    }

    #[test]
    fn missing_credentials_disable_notifier() {
        assert!(!TelegramNotifier::new(Some("token".into()), None).is_enabled());
        assert!(!TelegramNotifier::new(None, Some(42)).is_enabled());
        assert!(TelegramNotifier::new(Some("123:abc".into()), Some(42)).is_enabled());
    }

    #[tokio::test]
    async fn disabled_notifier_does_not_fail() {
        TelegramNotifier::disabled().send_message("hello").await;
    }
}
