use chrono::TimeDelta;
use chrono_tz::Tz;
use serde::Deserialize;
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use teloxide::types::{ChatId, UserId};

/// Errors that can occur when loading or saving configuration.
#[derive(Debug)]
pub enum ConfigError {
    /// Failed to read the config file.
    ReadFile { path: PathBuf, source: std::io::Error },
    /// Failed to parse JSON.
    ParseJson { path: PathBuf, source: serde_json::Error },
    /// Failed to write the config file back.
    WriteFile { path: PathBuf, source: std::io::Error },
    /// Validation error.
    Validation(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReadFile { path, source } => {
                write!(f, "failed to read config file '{}': {}", path.display(), source)
            }
            Self::ParseJson { path, source } => {
                write!(f, "failed to parse config file '{}': {}", path.display(), source)
            }
            Self::WriteFile { path, source } => {
                write!(f, "failed to write config file '{}': {}", path.display(), source)
            }
            Self::Validation(msg) => write!(f, "config validation error: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::ReadFile { source, .. } => Some(source),
            Self::ParseJson { source, .. } => Some(source),
            Self::WriteFile { source, .. } => Some(source),
            Self::Validation(_) => None,
        }
    }
}

#[derive(Deserialize)]
struct ConfigFile {
    telegram_bot_token: String,
    /// Users who can manage the allow-list.
    #[serde(default)]
    admins: Vec<u64>,
    /// Users whose messages the bot answers.
    #[serde(default)]
    allowed: Vec<u64>,
    /// Directory for logs and the uploaded spreadsheet. Defaults to current directory.
    data_dir: Option<String>,
    log_chat_id: Option<i64>,
    #[serde(default = "default_rate_limit_minutes")]
    rate_limit_minutes: u32,
    /// IANA zone used when printing the spreadsheet timestamp.
    #[serde(default = "default_timezone")]
    timezone: String,
    /// Directory with the TTF files used for label PDFs.
    fonts_dir: Option<String>,
    #[serde(default = "default_font_family")]
    font_family: String,
}

fn default_rate_limit_minutes() -> u32 {
    60
}

fn default_timezone() -> String {
    "Asia/Yekaterinburg".to_string()
}

fn default_font_family() -> String {
    "LiberationSans".to_string()
}

pub struct Config {
    /// Path to the config file (for saving changes)
    pub config_path: PathBuf,
    pub telegram_bot_token: String,
    pub admins: HashSet<UserId>,
    /// Grows at runtime through `/adduser`.
    pub allowed: RwLock<HashSet<UserId>>,
    pub data_dir: PathBuf,
    pub log_chat_id: Option<ChatId>,
    /// Minimum gap between two short replies about the same unit.
    pub rate_limit: TimeDelta,
    pub timezone: Tz,
    pub fonts_dir: PathBuf,
    pub font_family: String,
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config_path = path.as_ref().to_path_buf();
        let content = std::fs::read_to_string(&config_path)
            .map_err(|e| ConfigError::ReadFile { path: config_path.clone(), source: e })?;
        let file: ConfigFile = serde_json::from_str(&content)
            .map_err(|e| ConfigError::ParseJson { path: config_path.clone(), source: e })?;

        if file.telegram_bot_token.is_empty() {
            return Err(ConfigError::Validation("telegram_bot_token is required".into()));
        }
        // Telegram tokens are formatted as {bot_id}:{secret} where bot_id is numeric
        let token_parts: Vec<&str> = file.telegram_bot_token.split(':').collect();
        if token_parts.len() != 2 || token_parts[0].parse::<u64>().is_err() || token_parts[1].is_empty() {
            return Err(ConfigError::Validation(
                "telegram_bot_token appears invalid (expected format: 123456789:ABCdefGHI...)".into()
            ));
        }
        if file.rate_limit_minutes == 0 {
            return Err(ConfigError::Validation("rate_limit_minutes must be positive".into()));
        }
        let timezone: Tz = file.timezone.parse().map_err(|_| {
            ConfigError::Validation(format!("unknown timezone '{}'", file.timezone))
        })?;

        let data_dir = file
            .data_dir
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));
        let fonts_dir = file
            .fonts_dir
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./fonts"));

        Ok(Self {
            config_path,
            telegram_bot_token: file.telegram_bot_token,
            admins: file.admins.into_iter().map(UserId).collect(),
            allowed: RwLock::new(file.allowed.into_iter().map(UserId).collect()),
            data_dir,
            log_chat_id: file.log_chat_id.map(ChatId),
            rate_limit: TimeDelta::minutes(i64::from(file.rate_limit_minutes)),
            timezone,
            fonts_dir,
            font_family: file.font_family,
        })
    }

    /// Register the admin passed through the environment.
    /// Returns true if either list changed and the file needs saving.
    pub fn add_primary_admin(&mut self, user_id: UserId) -> bool {
        let new_admin = self.admins.insert(user_id);
        let new_allowed = self.allowed.write()
            .expect("allowed lock poisoned")
            .insert(user_id);
        new_admin || new_allowed
    }

    pub fn is_admin(&self, user_id: UserId) -> bool {
        self.admins.contains(&user_id)
    }

    /// Admins are always authorized, even if missing from `allowed`.
    pub fn is_allowed(&self, user_id: UserId) -> bool {
        self.is_admin(user_id)
            || self.allowed.read()
                .expect("allowed lock poisoned")
                .contains(&user_id)
    }

    /// Add a user to the allow-list. Returns false if already present.
    pub fn allow(&self, user_id: UserId) -> bool {
        self.allowed.write()
            .expect("allowed lock poisoned")
            .insert(user_id)
    }

    /// Allow a user and persist the lists. A failed save takes the user
    /// back out so memory never holds what the file lacks.
    /// Returns Ok(false) if the user was already allowed.
    pub async fn add_allowed(&self, user_id: UserId) -> Result<bool, ConfigError> {
        if !self.allow(user_id) {
            return Ok(false);
        }
        if let Err(e) = self.save_users().await {
            self.allowed.write()
                .expect("allowed lock poisoned")
                .remove(&user_id);
            return Err(e);
        }
        Ok(true)
    }

    pub fn sorted_admins(&self) -> Vec<u64> {
        let mut ids: Vec<u64> = self.admins.iter().map(|id| id.0).collect();
        ids.sort_unstable();
        ids
    }

    pub fn sorted_allowed(&self) -> Vec<u64> {
        let mut ids: Vec<u64> = self.allowed.read()
            .expect("allowed lock poisoned")
            .iter()
            .map(|id| id.0)
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Write the admin and allowed lists back into the config file,
    /// leaving every other key as it was.
    pub async fn save_users(&self) -> Result<(), ConfigError> {
        let path = &self.config_path;
        let content = tokio::fs::read_to_string(path).await
            .map_err(|e| ConfigError::ReadFile { path: path.clone(), source: e })?;
        let mut json: serde_json::Value = serde_json::from_str(&content)
            .map_err(|e| ConfigError::ParseJson { path: path.clone(), source: e })?;

        json["admins"] = serde_json::json!(self.sorted_admins());
        json["allowed"] = serde_json::json!(self.sorted_allowed());

        let output = serde_json::to_string_pretty(&json)
            .map_err(|e| ConfigError::ParseJson { path: path.clone(), source: e })?;
        tokio::fs::write(path, output).await
            .map_err(|e| ConfigError::WriteFile { path: path.clone(), source: e })?;

        Ok(())
    }

    pub fn spreadsheet_path(&self) -> PathBuf {
        self.data_dir.join("data.xlsx")
    }
}
