mod bot;
mod config;
mod labels;
mod telegram_log;
mod units;

use std::sync::Arc;

use teloxide::prelude::*;
use teloxide::types::UserId;
use tracing::{error, info, warn};
use tracing_subscriber::prelude::*;

use bot::{handlers, BotState, Command};
use config::Config;

#[tokio::main]
async fn main() {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "unitbot.json".to_string());
    let mut config = match Config::load(&config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ {e}");
            std::process::exit(1);
        }
    };

    let bot = Bot::new(&config.telegram_bot_token);

    // Setup logging
    let log_dir = config.data_dir.join("logs");
    std::fs::create_dir_all(&log_dir).ok();
    let file_appender = tracing_appender::rolling::daily(&log_dir, "unitbot.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    let registry = tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stdout)
                .with_filter(
                    tracing_subscriber::EnvFilter::from_default_env()
                        .add_directive(tracing::Level::INFO.into()),
                ),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_filter(
                    tracing_subscriber::EnvFilter::from_default_env()
                        .add_directive(tracing::Level::INFO.into()),
                ),
        );

    if let Some(log_chat_id) = config.log_chat_id {
        let tg_layer = telegram_log::TelegramLogLayer::new(bot.clone(), log_chat_id);
        registry.with(tg_layer).init();
    } else {
        registry.init();
    }

    info!("🚀 Starting unitbot...");
    info!("Loaded config from {config_path}");

    if let Ok(raw) = std::env::var("PRIMARY_ADMIN_ID") {
        match raw.trim().parse::<u64>() {
            Ok(id) => {
                if config.add_primary_admin(UserId(id)) {
                    info!("✅ Primary admin {id} added to {config_path}");
                    if let Err(e) = config.save_users().await {
                        error!("Failed to save config: {e}");
                    }
                }
            }
            Err(_) => warn!("PRIMARY_ADMIN_ID is not a number: {raw}"),
        }
    }
    info!("Admins: {:?}", config.sorted_admins());

    let state = Arc::new(BotState::new(config, bot.clone()));
    state.load_saved_table();
    if state.store.snapshot().is_empty() {
        warn!("Table is empty. Upload an Excel file.");
    }

    let handler = Update::filter_message()
        .branch(
            dptree::entry()
                .filter_command::<Command>()
                .endpoint(handlers::handle_command),
        )
        .branch(
            dptree::filter(|msg: Message| msg.document().is_some())
                .endpoint(handlers::handle_document),
        )
        .branch(
            dptree::filter(|msg: Message| msg.text().is_some_and(|t| !t.starts_with('/')))
                .endpoint(handlers::handle_text),
        );

    info!("Bot is running.");
    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;
}
