//! Update handlers wired into the teloxide dispatcher.

use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::types::{Me, User};
use tracing::{debug, error, info, warn};

use crate::bot::commands::{parse_user_id, Command};
use crate::bot::BotState;
use crate::labels::{parse_items, RenderError};
use crate::units::record::normalize;
use crate::units::Query;

const ACCESS_DENIED: &str = "⛔ У вас нет доступа.";

fn display_name(user: &User) -> &str {
    user.username.as_deref().unwrap_or(&user.first_name)
}

pub async fn handle_command(msg: Message, cmd: Command, state: Arc<BotState>) -> ResponseResult<()> {
    let Some(ref user) = msg.from else {
        return Ok(());
    };
    let tg = &state.telegram;

    match cmd {
        Command::Start => {
            let text = if state.config.is_allowed(user.id) {
                "Бот активирован и слушает."
            } else {
                ACCESS_DENIED
            };
            tg.reply_text(msg.chat.id, msg.id, text).await.ok();
        }
        Command::AddUser(arg) => {
            if !state.config.is_admin(user.id) {
                tg.reply_text(msg.chat.id, msg.id, "❌ У вас нет прав для добавления пользователей.")
                    .await
                    .ok();
                return Ok(());
            }
            let new_id = match parse_user_id(&arg) {
                Ok(id) => UserId(id),
                Err(usage) => {
                    tg.reply_text(msg.chat.id, msg.id, usage).await.ok();
                    return Ok(());
                }
            };
            match state.config.add_allowed(new_id).await {
                Ok(true) => {}
                Ok(false) => {
                    tg.reply_text(msg.chat.id, msg.id, "ℹ Этот пользователь уже есть в списке.")
                        .await
                        .ok();
                    return Ok(());
                }
                Err(e) => {
                    error!("Failed to save config: {e}");
                    tg.reply_text(msg.chat.id, msg.id, "❌ Не удалось сохранить список пользователей.")
                        .await
                        .ok();
                    return Ok(());
                }
            }
            info!("➕ {} ({}) allowed user {}", display_name(user), user.id, new_id);
            tg.reply_text(msg.chat.id, msg.id, &format!("✅ Пользователь {new_id} добавлен."))
                .await
                .ok();
        }
        Command::ListUsers => {
            if !state.config.is_admin(user.id) {
                tg.reply_text(msg.chat.id, msg.id, "❌ У вас нет прав.").await.ok();
                return Ok(());
            }
            let text = user_list(&state.config.sorted_admins(), &state.config.sorted_allowed());
            tg.reply_html(msg.chat.id, msg.id, &text).await.ok();
        }
        Command::Labels(text) => {
            if !state.config.is_allowed(user.id) {
                tg.reply_text(msg.chat.id, msg.id, ACCESS_DENIED).await.ok();
                return Ok(());
            }
            info!("🏷️ Label request from {} ({})", display_name(user), user.id);
            match render_labels(&state, &text).await {
                Ok(doc) => {
                    info!("🏷️ Sending {} ({} bytes)", doc.file_name, doc.bytes.len());
                    tg.send_document(msg.chat.id, msg.id, doc.bytes, &doc.file_name).await.ok();
                }
                Err(e) => {
                    if e.is_input_error() {
                        info!("Label request rejected: {e}");
                    } else {
                        warn!("Label render failed: {e}");
                    }
                    tg.reply_text(msg.chat.id, msg.id, &e.to_string()).await.ok();
                }
            }
        }
    }

    Ok(())
}

async fn render_labels(state: &BotState, text: &str) -> Result<crate::labels::LabelDocument, RenderError> {
    let items = parse_items(text)?;
    let renderer = state.labels.clone()?;
    tokio::task::spawn_blocking(move || renderer.render(&items))
        .await
        .map_err(|e| RenderError::Pdf(format!("render task failed: {e}")))?
}

fn user_list(admins: &[u64], allowed: &[u64]) -> String {
    let join = |ids: &[u64]| {
        ids.iter().map(|id| id.to_string()).collect::<Vec<_>>().join("\n")
    };
    format!(
        "📋 <b>Список пользователей</b>\n\n<b>Админы:</b>\n{}\n\n<b>Разрешённые пользователи:</b>\n{}",
        join(admins),
        join(allowed)
    )
}

pub async fn handle_document(msg: Message, state: Arc<BotState>) -> ResponseResult<()> {
    let (Some(user), Some(document)) = (msg.from.as_ref(), msg.document()) else {
        return Ok(());
    };
    let tg = &state.telegram;
    let file_name = document.file_name.as_deref().unwrap_or("");
    info!("📎 {} ({}) sent file: {}", display_name(user), user.id, file_name);

    if !state.config.is_allowed(user.id) {
        tg.reply_text(msg.chat.id, msg.id, ACCESS_DENIED).await.ok();
        return Ok(());
    }
    if !file_name.to_lowercase().ends_with(".xlsx") {
        tg.reply_text(msg.chat.id, msg.id, "Требуется Excel (.xlsx) файл!").await.ok();
        return Ok(());
    }

    let data = match tg.download_file(&document.file.id).await {
        Ok(data) => data,
        Err(e) => {
            warn!("{e}");
            tg.reply_text(msg.chat.id, msg.id, "❌ Не удалось скачать файл.").await.ok();
            return Ok(());
        }
    };

    let reply = match state.import(&data).await {
        Ok(count) => format!("✔ Таблица успешно обновлена! Количество ММ: {count}"),
        Err(text) => text,
    };
    tg.reply_text(msg.chat.id, msg.id, &reply).await.ok();
    Ok(())
}

pub async fn handle_text(msg: Message, me: Me, state: Arc<BotState>) -> ResponseResult<()> {
    let (Some(user), Some(text)) = (msg.from.as_ref(), msg.text()) else {
        return Ok(());
    };

    if !state.config.is_allowed(user.id) {
        info!("⛔ Access denied: {} ({})", display_name(user), user.id);
        return Ok(());
    }

    let table = state.store.snapshot();
    if table.is_empty() {
        debug!("Table is empty, skipping message");
        return Ok(());
    }

    let query = Query {
        text,
        mentions_bot: mentions(text, me.username()),
        replies_to_bot: msg
            .reply_to_message()
            .and_then(|reply| reply.from.as_ref())
            .is_some_and(|author| author.id == me.id),
    };

    if let Some(reply) = state.matcher.reply(&table, &query) {
        info!(
            "✅ Answering {} ({}) (full report: {})",
            display_name(user),
            user.id,
            reply.full_report
        );
        state.telegram.reply_html(msg.chat.id, msg.id, &reply.text).await.ok();
    }

    Ok(())
}

/// Whether the normalized message contains the bot's normalized username.
fn mentions(text: &str, bot_username: &str) -> bool {
    let name = normalize(bot_username);
    !name.is_empty() && normalize(text).contains(&name)
}
