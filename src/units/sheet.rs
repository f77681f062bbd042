//! Reading the reference spreadsheet into plain string rows.

use calamine::{Data, DataType, Reader, Xlsx};
use std::fmt;
use std::io::Cursor;
use std::path::Path;

/// First worksheet of a workbook: header row plus data rows of equal width.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sheet {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

#[derive(Debug)]
pub enum SheetError {
    /// The bytes are not a readable .xlsx workbook.
    Open(String),
    NoWorksheet,
    /// The first worksheet has no header row.
    Empty,
}

impl fmt::Display for SheetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open(reason) => write!(f, "не удалось прочитать Excel файл: {}", reason),
            Self::NoWorksheet => write!(f, "в файле нет ни одного листа"),
            Self::Empty => write!(f, "первый лист файла пуст"),
        }
    }
}

impl std::error::Error for SheetError {}

pub fn read_xlsx(data: &[u8]) -> Result<Sheet, SheetError> {
    let mut workbook: Xlsx<_> = Xlsx::new(Cursor::new(data))
        .map_err(|e| SheetError::Open(e.to_string()))?;

    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or(SheetError::NoWorksheet)?;

    let range = workbook
        .worksheet_range(&sheet_name)
        .map_err(|e| SheetError::Open(e.to_string()))?;

    let mut rows_iter = range.rows();
    let header_row = rows_iter.next().ok_or(SheetError::Empty)?;
    let headers: Vec<String> = header_row.iter().map(cell_to_string).collect();

    let mut rows = Vec::new();
    for row in rows_iter {
        let mut values: Vec<String> = row.iter().map(cell_to_string).collect();
        if values.iter().all(|v| v.is_empty()) {
            continue;
        }
        values.resize(headers.len(), String::new());
        rows.push(values);
    }

    Ok(Sheet { headers, rows })
}

pub fn read_xlsx_file(path: &Path) -> Result<Sheet, SheetError> {
    let data = std::fs::read(path).map_err(|e| SheetError::Open(e.to_string()))?;
    read_xlsx(&data)
}

/// Render a cell the way it should appear in replies.
/// Whole floats lose their fraction so phone numbers stay readable.
fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.trim().to_string(),
        Data::Float(f) if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e15 => {
            format!("{}", *f as i64)
        }
        Data::DateTime(_) => match cell.as_datetime() {
            Some(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
            None => cell.to_string(),
        },
        _ => cell.to_string().trim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_xlsxwriter::{ExcelDateTime, Format, Workbook};

    fn workbook_bytes(rows: &[&[&str]], phone: Option<f64>) -> Vec<u8> {
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        for (r, row) in rows.iter().enumerate() {
            for (c, value) in row.iter().enumerate() {
                if !value.is_empty() {
                    sheet.write_string(r as u32, c as u16, *value).unwrap();
                }
            }
        }
        if let Some(phone) = phone {
            sheet.write_number(1, rows[0].len() as u16, phone).unwrap();
        }
        workbook.save_to_buffer().unwrap()
    }

    #[test]
    fn test_reads_headers_and_rows() {
        let data = workbook_bytes(
            &[&["Магазин ", "Код"], &["Ажур", "0001"], &["", ""], &["Бриз", "0002"]],
            None,
        );
        let sheet = read_xlsx(&data).unwrap();
        assert_eq!(sheet.headers, vec!["Магазин", "Код"]);
        assert_eq!(sheet.rows, vec![vec!["Ажур", "0001"], vec!["Бриз", "0002"]]);
    }

    #[test]
    fn test_whole_float_becomes_integer_string() {
        let data = workbook_bytes(&[&["магазин"], &["Ажур"]], Some(79991234567.0));
        let sheet = read_xlsx(&data).unwrap();
        assert_eq!(sheet.rows[0][1], "79991234567");
    }

    #[test]
    fn test_date_cells_are_formatted() {
        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.write_string(0, 0, "дата открытия").unwrap();
        sheet.write_string(0, 1, "дата закрытия").unwrap();

        let opened = ExcelDateTime::from_ymd(2021, 3, 5).unwrap().and_hms(10, 30, 0).unwrap();
        let closed = ExcelDateTime::from_ymd(2024, 12, 31).unwrap();
        sheet
            .write_datetime_with_format(1, 0, &opened, &Format::new().set_num_format("yyyy-mm-dd hh:mm:ss"))
            .unwrap();
        sheet
            .write_datetime_with_format(1, 1, &closed, &Format::new().set_num_format("dd.mm.yyyy"))
            .unwrap();
        let data = workbook.save_to_buffer().unwrap();

        let sheet = read_xlsx(&data).unwrap();
        assert_eq!(sheet.rows[0], vec!["2021-03-05 10:30:00", "2024-12-31 00:00:00"]);
    }

    #[test]
    fn test_short_rows_are_padded() {
        let data = workbook_bytes(&[&["a", "b", "c"], &["1"]], None);
        let sheet = read_xlsx(&data).unwrap();
        assert_eq!(sheet.rows[0], vec!["1", "", ""]);
    }

    #[test]
    fn test_garbage_is_rejected() {
        let err = read_xlsx(b"definitely not a zip").unwrap_err();
        assert!(matches!(err, SheetError::Open(_)));
    }

    #[test]
    fn test_cell_to_string_fraction_kept() {
        assert_eq!(cell_to_string(&Data::Float(1.5)), "1.5");
        assert_eq!(cell_to_string(&Data::Int(42)), "42");
        assert_eq!(cell_to_string(&Data::String("  x ".into())), "x");
    }
}
