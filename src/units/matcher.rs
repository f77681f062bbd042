//! Matching chat messages to units and rendering the replies.

use chrono::{DateTime, TimeDelta, Utc};
use chrono_tz::Tz;
use regex::Regex;
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::{debug, info};

use crate::units::record::{html_escape, normalize, or_dash, UnitRecord};
use crate::units::store::Table;

/// Prefixes that turn a message into a question about a unit.
const QUESTION_PREFIXES: [&str; 3] = ["чей ", "какой ", "кто "];

const FULL_REPORT_KEYWORDS: [&str; 6] = [
    "полный отчет",
    "полностью",
    "отчет",
    "информация",
    "инфо",
    "статус",
];

/// Word-bounded patterns for one shop name.
#[derive(Debug)]
pub struct ShopPattern {
    /// Normalized shop name, also the rate-limit key.
    key: String,
    whole: Regex,
    words: Vec<Regex>,
}

impl ShopPattern {
    /// Returns None for names that normalize to nothing.
    pub fn compile(shop: &str) -> Option<Self> {
        let key = normalize(shop);
        if key.is_empty() {
            return None;
        }
        let whole = bounded(&key)?;
        let words = key.split(' ').filter_map(bounded).collect();
        Some(Self { key, whole, words })
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// `message` must already be normalized.
    pub fn matches(&self, message: &str, partial: bool) -> bool {
        self.whole.is_match(message)
            || (partial && self.words.iter().any(|w| w.is_match(message)))
    }
}

fn bounded(text: &str) -> Option<Regex> {
    Regex::new(&format!(r"\b{}\b", regex::escape(text))).ok()
}

/// An incoming chat message as seen by the matcher.
#[derive(Debug, Clone, Copy)]
pub struct Query<'a> {
    pub text: &'a str,
    pub mentions_bot: bool,
    pub replies_to_bot: bool,
}

/// HTML reply text for Telegram.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
    pub full_report: bool,
}

pub struct Matcher {
    window: TimeDelta,
    timezone: Tz,
    /// Last short reply per normalized shop name. Never pruned.
    last_short: Mutex<HashMap<String, DateTime<Utc>>>,
}

impl Matcher {
    pub fn new(window: TimeDelta, timezone: Tz) -> Self {
        Self {
            window,
            timezone,
            last_short: Mutex::new(HashMap::new()),
        }
    }

    pub fn reply(&self, table: &Table, query: &Query<'_>) -> Option<Reply> {
        self.reply_at(table, query, Utc::now())
    }

    pub fn reply_at(&self, table: &Table, query: &Query<'_>, now: DateTime<Utc>) -> Option<Reply> {
        let message = normalize(query.text);
        if message.is_empty() {
            return None;
        }

        let is_question = QUESTION_PREFIXES.iter().any(|p| message.starts_with(p));
        let partial = is_question || query.mentions_bot || query.replies_to_bot;

        let (record, key) = table.entries().iter().find_map(|entry| {
            let pattern = entry.pattern.as_ref()?;
            pattern
                .matches(&message, partial)
                .then_some((&entry.record, pattern.key()))
        })?;

        let full_report = FULL_REPORT_KEYWORDS.iter().any(|k| message.contains(k));
        if !full_report && !self.try_acquire(key, now) {
            info!("⏳ Rate limited: already answered about {}", record.shop);
            return None;
        }

        debug!("Matched {} (full report: {})", record.shop, full_report);
        let text = if full_report {
            self.full_report(record, table.modified())
        } else {
            short_reply(record)
        };
        Some(Reply { text, full_report })
    }

    /// Check and record in one critical section so two concurrent
    /// messages cannot both pass.
    fn try_acquire(&self, key: &str, now: DateTime<Utc>) -> bool {
        let mut last_short = self.last_short.lock().expect("rate limit lock poisoned");
        if let Some(last) = last_short.get(key)
            && now - *last < self.window
        {
            return false;
        }
        last_short.insert(key.to_string(), now);
        true
    }

    fn full_report(&self, record: &UnitRecord, modified: Option<DateTime<Utc>>) -> String {
        let field = |v: &str| html_escape(or_dash(Some(v)));
        let optional = |v: &Option<String>| html_escape(or_dash(v.as_deref()));

        let updated = modified
            .map(|t| t.with_timezone(&self.timezone).format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "неизвестна".to_string());

        [
            format!(
                "магазин: {} {} ({})",
                field(&record.kind),
                field(&record.shop),
                field(&record.code)
            ),
            format!("формат: {}", optional(&record.format)),
            format!("статус: {}", field(&record.status)),
            format!("филиал: {}", field(&record.branch)),
            format!("дата открытия: {}", optional(&record.opened)),
            format!("дата закрытия: {}", optional(&record.closed)),
            format!("email: {}", optional(&record.email)),
            format!(
                "фио системотехника: {} ({})",
                field(&record.technician),
                field(&record.technician_phone)
            ),
            format!("полный адрес: {}", optional(&record.address)),
            format!("Дата обновления выгрузки: {}", updated),
        ]
        .join("\n")
    }
}

fn short_reply(record: &UnitRecord) -> String {
    let field = |v: &str| html_escape(or_dash(Some(v)));

    let status = field(&record.status);
    let status = if record.status.trim().to_lowercase() == "закрыт" {
        format!("<b>{}</b>", status)
    } else {
        status
    };

    let branch_suffix = if record.branch.trim().to_lowercase() == "уфа запад" {
        format!(" ! {}", field(&record.branch))
    } else {
        String::new()
    };

    format!(
        "{} {} ({}) {}{}\n{} {}",
        field(&record.shop),
        field(&record.kind),
        field(&record.code),
        status,
        branch_suffix,
        field(&record.technician),
        field(&record.technician_phone),
    )
}
