//! Telegram client using teloxide.

use teloxide::net::Download;
use teloxide::prelude::*;
use teloxide::types::{FileId, InputFile, MessageId, ParseMode, ReplyParameters};
use tracing::{info, warn};

/// Telegram API client.
#[derive(Clone)]
pub struct TelegramClient {
    bot: Bot,
}

impl TelegramClient {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }

    /// Reply with HTML text. The caller escapes user-provided values.
    pub async fn reply_html(&self, chat_id: ChatId, reply_to: MessageId, text: &str) -> Result<(), String> {
        self.bot
            .send_message(chat_id, text)
            .parse_mode(ParseMode::Html)
            .reply_parameters(ReplyParameters::new(reply_to))
            .await
            .map(|_| ())
            .map_err(|e| {
                let msg = format!("Failed to send: {e}");
                warn!("{}", msg);
                msg
            })
    }

    /// Reply with plain text, no markup parsing.
    pub async fn reply_text(&self, chat_id: ChatId, reply_to: MessageId, text: &str) -> Result<(), String> {
        self.bot
            .send_message(chat_id, text)
            .reply_parameters(ReplyParameters::new(reply_to))
            .await
            .map(|_| ())
            .map_err(|e| {
                let msg = format!("Failed to send: {e}");
                warn!("{}", msg);
                msg
            })
    }

    /// Send a file from bytes.
    pub async fn send_document(
        &self,
        chat_id: ChatId,
        reply_to: MessageId,
        data: Vec<u8>,
        file_name: &str,
    ) -> Result<(), String> {
        info!("📄 Sending {} to chat {} ({} bytes)", file_name, chat_id, data.len());

        let input_file = InputFile::memory(data).file_name(file_name.to_string());
        self.bot
            .send_document(chat_id, input_file)
            .reply_parameters(ReplyParameters::new(reply_to))
            .await
            .map(|_| ())
            .map_err(|e| {
                let msg = format!("Failed to send document: {e}");
                warn!("{}", msg);
                msg
            })
    }

    /// Download a file by file_id.
    pub async fn download_file(&self, file_id: &FileId) -> Result<Vec<u8>, String> {
        let file = self
            .bot
            .get_file(file_id.clone())
            .await
            .map_err(|e| format!("Failed to get file info: {e}"))?;

        let mut data = Vec::new();
        self.bot
            .download_file(&file.path, &mut data)
            .await
            .map_err(|e| format!("Failed to download file: {e}"))?;

        info!("📥 Downloaded file ({} bytes)", data.len());
        Ok(data)
    }
}
