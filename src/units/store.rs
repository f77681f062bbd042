//! Reference table store.
//!
//! The table is an immutable snapshot behind `RwLock<Arc<..>>`: an import
//! builds the whole new table first and then swaps the pointer, so readers
//! see either the old or the new table in full.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};
use tracing::{info, warn};

use crate::units::matcher::ShopPattern;
use crate::units::record::UnitRecord;
use crate::units::sheet::Sheet;

pub const COL_SHOP: &str = "магазин";
pub const COL_CODE: &str = "код";
pub const COL_STATUS: &str = "статус";
pub const COL_KIND: &str = "тип";
pub const COL_TECHNICIAN: &str = "фио системотехника";
pub const COL_PHONE: &str = "телефон системотехника";
pub const COL_BRANCH: &str = "филиал";

const REQUIRED_COLUMNS: [&str; 7] = [
    COL_SHOP,
    COL_CODE,
    COL_STATUS,
    COL_KIND,
    COL_TECHNICIAN,
    COL_PHONE,
    COL_BRANCH,
];

/// Branches served by the bot, compared trimmed and lowercased.
pub const PERMITTED_BRANCHES: [&str; 2] = ["уфа восток", "уфа запад"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportError {
    MissingColumns(Vec<String>),
    NoMatchingBranches,
    /// The candidate rows equal the current table.
    Unchanged,
}

impl fmt::Display for ImportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingColumns(cols) => {
                write!(f, "❌ Файл не содержит обязательные столбцы: {}", cols.join(", "))
            }
            Self::NoMatchingBranches => {
                write!(f, "❌ Файл не содержит строки с филиалами Уфа Восток или Уфа Запад.")
            }
            Self::Unchanged => {
                write!(f, "❌ Файл не обновлён. Данные совпадают с текущей таблицей.")
            }
        }
    }
}

impl std::error::Error for ImportError {}

/// A record together with its precompiled shop-name pattern.
#[derive(Debug)]
pub struct Entry {
    pub record: UnitRecord,
    pub pattern: Option<ShopPattern>,
}

/// One loaded version of the reference table.
#[derive(Debug, Default)]
pub struct Table {
    entries: Vec<Entry>,
    modified: Option<DateTime<Utc>>,
}

impl Table {
    fn new(records: Vec<UnitRecord>, modified: Option<DateTime<Utc>>) -> Self {
        let entries = records
            .into_iter()
            .map(|record| Entry {
                pattern: ShopPattern::compile(&record.shop),
                record,
            })
            .collect();
        Self { entries, modified }
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn records(&self) -> impl Iterator<Item = &UnitRecord> {
        self.entries.iter().map(|entry| &entry.record)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Modification time of the spreadsheet this table came from.
    pub fn modified(&self) -> Option<DateTime<Utc>> {
        self.modified
    }
}

pub struct TableStore {
    current: RwLock<Arc<Table>>,
}

impl TableStore {
    pub fn new() -> Self {
        Self { current: RwLock::new(Arc::new(Table::default())) }
    }

    pub fn snapshot(&self) -> Arc<Table> {
        self.current.read().expect("table lock poisoned").clone()
    }

    /// Validate the sheet and swap it in as the current table.
    pub fn replace(
        &self,
        sheet: &Sheet,
        modified: Option<DateTime<Utc>>,
    ) -> Result<usize, ImportError> {
        let records = parse_records(sheet)?;
        if records.is_empty() {
            warn!("Import rejected: no rows for permitted branches");
            return Err(ImportError::NoMatchingBranches);
        }

        // Holding the write lock across the comparison keeps two concurrent
        // imports from both passing the equality check.
        let mut current = self.current.write().expect("table lock poisoned");
        if current.records().eq(records.iter()) {
            info!("Import rejected: table unchanged ({} rows)", records.len());
            return Err(ImportError::Unchanged);
        }

        let count = records.len();
        *current = Arc::new(Table::new(records, modified));
        info!("✔ Table replaced: {count} unit(s)");
        Ok(count)
    }
}

impl Default for TableStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Turn sheet rows into records for the permitted branches.
fn parse_records(sheet: &Sheet) -> Result<Vec<UnitRecord>, ImportError> {
    let columns: HashMap<String, usize> = sheet
        .headers
        .iter()
        .enumerate()
        .map(|(i, h)| (h.trim().to_lowercase(), i))
        .rev() // first occurrence wins on duplicate headers
        .collect();

    let missing: Vec<String> = REQUIRED_COLUMNS
        .iter()
        .filter(|col| !columns.contains_key(**col))
        .map(|col| col.to_string())
        .collect();
    if !missing.is_empty() {
        warn!("Import rejected: missing columns {:?}", missing);
        return Err(ImportError::MissingColumns(missing));
    }

    let records = sheet
        .rows
        .iter()
        .filter_map(|row| {
            let cell = |name: &str| -> Option<String> {
                let idx = *columns.get(name)?;
                let value = row.get(idx)?.trim();
                (!value.is_empty()).then(|| value.to_string())
            };
            let required = |name: &str| cell(name).unwrap_or_default();

            let branch = required(COL_BRANCH);
            if !PERMITTED_BRANCHES.contains(&branch.to_lowercase().as_str()) {
                return None;
            }

            Some(UnitRecord {
                shop: required(COL_SHOP),
                code: required(COL_CODE),
                status: required(COL_STATUS),
                kind: required(COL_KIND),
                technician: required(COL_TECHNICIAN),
                technician_phone: required(COL_PHONE),
                branch,
                format: cell("формат"),
                opened: cell("дата открытия"),
                closed: cell("дата закрытия"),
                email: cell("email"),
                address: cell("полный адрес"),
            })
        })
        .collect();

    Ok(records)
}
