pub mod notifier;

pub use notifier::{escape_markdown_v2, format_signal, TelegramNotifier};
