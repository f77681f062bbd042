//! Telegram transport: shared state, commands and update handlers.

pub mod commands;
pub mod handlers;
pub mod telegram;

use chrono::{DateTime, Utc};
use std::sync::Arc;
use teloxide::prelude::*;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::labels::{LabelRenderer, RenderError};
use crate::units::{read_xlsx, read_xlsx_file, Matcher, TableStore};

pub use commands::Command;
pub use telegram::TelegramClient;

pub struct BotState {
    pub config: Config,
    pub store: TableStore,
    pub matcher: Matcher,
    /// Font loading may fail; `/labels` then reports the error.
    pub labels: Result<Arc<LabelRenderer>, RenderError>,
    pub telegram: TelegramClient,
    /// Serializes uploads so the table in memory and `data.xlsx` on disk
    /// always come from the same upload.
    import_lock: Mutex<()>,
}

impl BotState {
    pub fn new(config: Config, bot: Bot) -> Self {
        let matcher = Matcher::new(config.rate_limit, config.timezone);
        let labels = LabelRenderer::load(&config.fonts_dir, &config.font_family).map(Arc::new);
        match &labels {
            Ok(_) => info!("Label fonts loaded from {}", config.fonts_dir.display()),
            Err(e) => warn!("Labels disabled: {e}"),
        }

        Self {
            config,
            store: TableStore::new(),
            matcher,
            labels,
            telegram: TelegramClient::new(bot),
            import_lock: Mutex::new(()),
        }
    }

    /// Import an uploaded workbook and keep it on disk for the next start.
    /// Errors are the user-facing reply text.
    pub async fn import(&self, data: &[u8]) -> Result<usize, String> {
        let sheet = read_xlsx(data).map_err(|e| format!("❌ {e}"))?;

        let _guard = self.import_lock.lock().await;
        let count = self
            .store
            .replace(&sheet, Some(Utc::now()))
            .map_err(|e| e.to_string())?;

        let path = self.config.spreadsheet_path();
        let partial = path.with_extension("xlsx.part");
        let saved = match tokio::fs::write(&partial, data).await {
            Ok(()) => tokio::fs::rename(&partial, &path).await,
            Err(e) => Err(e),
        };
        if let Err(e) = saved {
            error!("Failed to keep spreadsheet at {}: {e}", path.display());
        }
        Ok(count)
    }

    /// Load the spreadsheet kept from the last successful upload, if any.
    pub fn load_saved_table(&self) {
        let path = self.config.spreadsheet_path();
        if !path.exists() {
            info!("📥 No saved table at {}, waiting for an upload", path.display());
            return;
        }

        let started = std::time::Instant::now();
        let modified: Option<DateTime<Utc>> = std::fs::metadata(&path)
            .and_then(|m| m.modified())
            .ok()
            .map(DateTime::<Utc>::from);

        match read_xlsx_file(&path) {
            Ok(sheet) => match self.store.replace(&sheet, modified) {
                Ok(count) => info!("✔ Loaded {count} unit(s) from {}", path.display()),
                Err(e) => warn!("Saved table rejected: {e}"),
            },
            Err(e) => warn!("Failed to read {}: {e}", path.display()),
        }
        info!("⏱ Table load took {:.2}s", started.elapsed().as_secs_f64());
    }
}
