//! Barcode label PDFs.

pub mod barcode;
pub mod parse;
pub mod pdf;

use std::fmt;

pub use parse::parse_items;
pub use pdf::{LabelDocument, LabelRenderer};

/// Errors that abort a label render. No partial PDF is produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    EmptyInput,
    /// 1-based line number and the offending line.
    MalformedLine { line: usize, text: String },
    /// The code cannot be encoded as Code 128.
    Barcode { code: String, reason: String },
    Font(String),
    Pdf(String),
    Io(String),
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyInput => write!(
                f,
                "❌ Нет позиций для печати. Формат: /labels, затем строки «код магазин наименование»"
            ),
            Self::MalformedLine { line, text } => write!(
                f,
                "❌ Ошибка в строке {}: «{}». Нужно: код магазин наименование",
                line, text
            ),
            Self::Barcode { code, reason } => {
                write!(f, "❌ Не удалось построить штрихкод для «{}»: {}", code, reason)
            }
            Self::Font(reason) => write!(f, "❌ Не удалось загрузить шрифт: {}", reason),
            Self::Pdf(reason) => write!(f, "❌ Ошибка формирования PDF: {}", reason),
            Self::Io(reason) => write!(f, "❌ Ошибка записи временного файла: {}", reason),
        }
    }
}

impl std::error::Error for RenderError {}

impl RenderError {
    /// Caused by what the user typed rather than by the renderer.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            Self::EmptyInput | Self::MalformedLine { .. } | Self::Barcode { .. }
        )
    }
}
