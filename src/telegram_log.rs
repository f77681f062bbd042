//! Forwarding log events to a Telegram chat.
//!
//! WARN and ERROR go out at once; INFO lines are collected and sent in
//! batches so an import or a busy chat does not flood the log chat.

use std::fmt::Write as _;
use std::time::Duration;

use teloxide::prelude::*;
use teloxide::types::ChatId;
use tokio::sync::mpsc;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::Context;

const FLUSH_INTERVAL: Duration = Duration::from_secs(5);
const MAX_BUFFERED_LINES: usize = 50;
/// Telegram rejects messages over 4096 characters.
const MAX_MESSAGE_CHARS: usize = 4000;

struct LogLine {
    urgent: bool,
    text: String,
}

pub struct TelegramLogLayer {
    tx: mpsc::UnboundedSender<LogLine>,
}

impl TelegramLogLayer {
    pub fn new(bot: Bot, chat_id: ChatId) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<LogLine>();

        tokio::spawn(async move {
            let mut buffer: Vec<String> = Vec::new();
            let mut interval = tokio::time::interval(FLUSH_INTERVAL);

            loop {
                tokio::select! {
                    line = rx.recv() => match line {
                        Some(LogLine { urgent: true, text }) => send_chunks(&bot, chat_id, &text).await,
                        Some(LogLine { urgent: false, text }) => {
                            buffer.push(text);
                            if buffer.len() >= MAX_BUFFERED_LINES {
                                send_chunks(&bot, chat_id, &buffer.join("\n")).await;
                                buffer.clear();
                            }
                        }
                        None => break,
                    },
                    _ = interval.tick() => {
                        if !buffer.is_empty() {
                            send_chunks(&bot, chat_id, &buffer.join("\n")).await;
                            buffer.clear();
                        }
                    }
                }
            }
        });

        Self { tx }
    }
}

async fn send_chunks(bot: &Bot, chat_id: ChatId, text: &str) {
    for chunk in split_message(text, MAX_MESSAGE_CHARS) {
        if let Err(e) = bot.send_message(chat_id, chunk).await {
            eprintln!("Failed to send log to Telegram: {e}");
        }
    }
}

/// Split on line boundaries into pieces of at most `max_chars` characters.
/// A single overlong line is cut at the limit.
fn split_message(text: &str, max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for line in text.lines() {
        let mut chars: Vec<char> = line.chars().collect();
        chars.truncate(max_chars);
        let extra = if current_len == 0 { chars.len() } else { chars.len() + 1 };

        if current_len > 0 && current_len + extra > max_chars {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if current_len > 0 {
            current.push('\n');
            current_len += 1;
        }
        current.extend(chars.iter());
        current_len += chars.len();
    }
    if current_len > 0 {
        chunks.push(current);
    }
    chunks
}

#[derive(Default)]
struct MessageVisitor {
    message: String,
    fields: String,
}

impl Visit for MessageVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            let _ = write!(self.message, "{:?}", value);
        } else {
            let _ = write!(self.fields, " {}={:?}", field.name(), value);
        }
    }
}

impl<S: Subscriber> Layer<S> for TelegramLogLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let level = *event.metadata().level();
        if level > Level::INFO {
            return;
        }

        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);
        let body = format!("{}{}", visitor.message, visitor.fields);

        let line = match level {
            Level::ERROR => LogLine { urgent: true, text: format!("❌ {body}") },
            Level::WARN => LogLine { urgent: true, text: format!("⚠️ {body}") },
            _ => LogLine { urgent: false, text: body },
        };

        if self.tx.send(line).is_err() {
            eprintln!("Log channel closed, message dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_short_message() {
        assert_eq!(split_message("a\nb", 10), vec!["a\nb"]);
        assert!(split_message("", 10).is_empty());
    }

    #[test]
    fn test_split_on_line_boundaries() {
        assert_eq!(split_message("aaaa\nbbbb\ncc", 9), vec!["aaaa\nbbbb", "cc"]);
    }

    #[test]
    fn test_split_truncates_long_line() {
        assert_eq!(split_message("абвгдеж\nx", 4), vec!["абвг", "x"]);
    }
}
