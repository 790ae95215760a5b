//! Tabular ingestion - spreadsheet and CSV byte streams to raw header + rows
//!
//! Workbooks (xlsx, xls, ods) are read with calamine; anything that is not a
//! recognised workbook container is parsed as UTF-8 CSV.

use crate::config::IngestionConfig;
use crate::error::{DrawError, DrawResult};
use crate::storage::dataset::Dataset;
use crate::storage::value::{parse_date, parse_datetime, Value};
use calamine::{open_workbook_auto_from_rs, Data, Reader};
use chrono::{Duration, NaiveDate, NaiveDateTime};
use std::collections::HashMap;
use std::io::Cursor;
use tracing::{debug, info};

const ZIP_MAGIC: &[u8] = b"PK\x03\x04";
const CFB_MAGIC: &[u8] = &[0xD0, 0xCF, 0x11, 0xE0];
const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// Largest integer a spreadsheet float can carry exactly
const MAX_EXACT_FLOAT_INT: f64 = 9_007_199_254_740_992.0;

/// Detected container format of an upload
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TabularFormat {
    /// Zip-based workbook (xlsx, xlsm, ods)
    Workbook,
    /// Legacy compound-file workbook (xls)
    LegacyWorkbook,
    Csv,
}

impl TabularFormat {
    pub fn detect(bytes: &[u8]) -> Self {
        if bytes.starts_with(ZIP_MAGIC) {
            TabularFormat::Workbook
        } else if bytes.starts_with(CFB_MAGIC) {
            TabularFormat::LegacyWorkbook
        } else {
            TabularFormat::Csv
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TabularFormat::Workbook => "xlsx",
            TabularFormat::LegacyWorkbook => "xls",
            TabularFormat::Csv => "csv",
        }
    }
}

/// Header row plus loosely typed rows, before column types are fixed
#[derive(Clone, Debug, Default)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl RawTable {
    pub fn num_columns(&self) -> usize {
        self.headers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Cell rendered as text, `None` for nulls
    pub fn text(&self, row: usize, col: usize) -> Option<String> {
        match self.rows.get(row).and_then(|r| r.get(col)) {
            None | Some(Value::Null) => None,
            Some(value) => Some(value.to_string()),
        }
    }
}

/// Read an upload into a raw table
pub fn load_table(bytes: &[u8], config: &IngestionConfig) -> DrawResult<RawTable> {
    if bytes.is_empty() {
        return Err(DrawError::dataset_load("the upload is empty"));
    }

    let format = TabularFormat::detect(bytes);
    debug!(format = format.as_str(), size = bytes.len(), "Reading tabular upload");

    let table = match format {
        TabularFormat::Workbook | TabularFormat::LegacyWorkbook => read_workbook(bytes, config)
            .map_err(|e| DrawError::dataset_load_with_format(e, format.as_str()))?,
        TabularFormat::Csv => read_csv(bytes, config.csv_delimiter)
            .map_err(|e| DrawError::dataset_load_with_format(e, format.as_str()))?,
    };

    info!(
        format = format.as_str(),
        columns = table.num_columns(),
        rows = table.rows.len(),
        "Loaded tabular upload"
    );
    Ok(table)
}

/// Read an upload straight into a typed dataset
pub fn load_dataset(bytes: &[u8], config: &IngestionConfig) -> DrawResult<Dataset> {
    let table = load_table(bytes, config)?;
    Dataset::from_rows(&table.headers, &table.rows)
        .map_err(|e| DrawError::dataset_load(e.to_string()))
}

fn read_workbook(bytes: &[u8], config: &IngestionConfig) -> Result<RawTable, String> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
        .map_err(|e| format!("unreadable workbook: {}", e))?;

    let sheet_names = workbook.sheet_names();
    let sheet = match &config.sheet {
        Some(name) => {
            if !sheet_names.iter().any(|s| s == name) {
                return Err(format!("sheet '{}' not found (available: {})", name, sheet_names.join(", ")));
            }
            name.clone()
        }
        None => sheet_names
            .first()
            .cloned()
            .ok_or_else(|| "workbook has no sheets".to_string())?,
    };

    let range = workbook
        .worksheet_range(&sheet)
        .map_err(|e| format!("cannot read sheet '{}': {}", sheet, e))?;

    let mut rows = range.rows();
    let header_cells = rows.next().ok_or_else(|| format!("sheet '{}' has no header row", sheet))?;
    let headers = normalize_headers(header_cells.iter().map(header_text).collect());

    let width = headers.len();
    let mut out = Vec::new();
    for row in rows {
        let mut values: Vec<Value> = row.iter().take(width).map(cell_to_value).collect();
        values.resize(width, Value::Null);
        out.push(values);
    }
    // Trailing fully blank rows are formatting residue, not data
    while out.last().map_or(false, |r| r.iter().all(Value::is_null)) {
        out.pop();
    }

    Ok(RawTable { headers, rows: out })
}

fn header_text(cell: &Data) -> String {
    match cell_to_value(cell) {
        Value::Null => String::new(),
        value => value.to_string(),
    }
}

/// Convert one workbook cell
pub(crate) fn cell_to_value(cell: &Data) -> Value {
    match cell {
        Data::Empty | Data::Error(_) => Value::Null,
        Data::Bool(v) => Value::Bool(*v),
        Data::Int(v) => Value::Int64(*v),
        Data::Float(v) => float_cell(*v),
        Data::String(v) => Value::String(v.clone()),
        Data::DateTime(v) => {
            if v.is_duration() {
                Value::Float64(v.as_f64())
            } else {
                excel_serial_to_value(v.as_f64())
            }
        }
        Data::DateTimeIso(v) => parse_datetime(v)
            .map(Value::DateTime)
            .or_else(|| parse_date(v).map(Value::Date))
            .unwrap_or_else(|| Value::String(v.clone())),
        Data::DurationIso(v) => Value::String(v.clone()),
    }
}

// Spreadsheets store every number as a float; whole numbers become integers.
fn float_cell(v: f64) -> Value {
    if v.is_finite() && v.fract() == 0.0 && v.abs() < MAX_EXACT_FLOAT_INT {
        Value::Int64(v as i64)
    } else {
        Value::Float64(v)
    }
}

/// Excel serial day number (1900 system) to a date or datetime
pub(crate) fn excel_serial_to_value(serial: f64) -> Value {
    let Some(base) = NaiveDate::from_ymd_opt(1899, 12, 30) else {
        return Value::Float64(serial);
    };
    if !serial.is_finite() {
        return Value::Null;
    }
    let days = serial.trunc() as i64;
    let millis = ((serial - serial.trunc()) * 86_400_000.0).round() as i64;
    let Some(date) = base.checked_add_signed(Duration::days(days)) else {
        return Value::Float64(serial);
    };
    if millis == 0 {
        Value::Date(date)
    } else {
        let midnight: NaiveDateTime = date.and_time(chrono::NaiveTime::MIN);
        Value::DateTime(midnight + Duration::milliseconds(millis))
    }
}

fn read_csv(bytes: &[u8], delimiter: u8) -> Result<RawTable, String> {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    if std::str::from_utf8(bytes).is_err() {
        return Err("file is neither a workbook nor UTF-8 text".to_string());
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .delimiter(delimiter)
        .from_reader(bytes);

    let headers = reader
        .headers()
        .map_err(|e| format!("invalid CSV header: {}", e))?
        .iter()
        .map(|h| h.to_string())
        .collect::<Vec<_>>();
    if headers.is_empty() || headers.iter().all(|h| h.trim().is_empty()) {
        return Err("missing header row".to_string());
    }
    let headers = normalize_headers(headers);
    let width = headers.len();

    let mut text_rows: Vec<Vec<Option<String>>> = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| format!("invalid CSV row: {}", e))?;
        let mut row: Vec<Option<String>> = record
            .iter()
            .take(width)
            .map(|field| if field.is_empty() { None } else { Some(field.to_string()) })
            .collect();
        row.resize(width, None);
        text_rows.push(row);
    }

    let kinds: Vec<CsvKind> = (0..width)
        .map(|col| CsvKind::infer(text_rows.iter().filter_map(|r| r[col].as_deref())))
        .collect();

    let rows = text_rows
        .into_iter()
        .map(|row| {
            row.into_iter()
                .zip(kinds.iter())
                .map(|(cell, kind)| match cell {
                    None => Value::Null,
                    Some(text) => kind.convert(&text),
                })
                .collect()
        })
        .collect();

    Ok(RawTable { headers, rows })
}

/// Column type chosen for a CSV column from all of its non-empty cells
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum CsvKind {
    Int,
    Float,
    Bool,
    Date,
    DateTime,
    Text,
}

impl CsvKind {
    fn infer<'a>(cells: impl Iterator<Item = &'a str> + Clone) -> Self {
        let candidates = [
            CsvKind::Int,
            CsvKind::Float,
            CsvKind::Bool,
            CsvKind::Date,
            CsvKind::DateTime,
        ];
        for kind in candidates {
            let mut cells = cells.clone().peekable();
            if cells.peek().is_none() {
                return CsvKind::Text;
            }
            if cells.all(|c| kind.accepts(c)) {
                return kind;
            }
        }
        CsvKind::Text
    }

    fn accepts(&self, cell: &str) -> bool {
        let cell = cell.trim();
        match self {
            CsvKind::Int => cell.parse::<i64>().is_ok(),
            CsvKind::Float => cell.parse::<f64>().is_ok(),
            CsvKind::Bool => matches!(cell.to_ascii_lowercase().as_str(), "true" | "false"),
            CsvKind::Date => parse_date(cell).is_some(),
            CsvKind::DateTime => parse_datetime(cell).is_some() || parse_date(cell).is_some(),
            CsvKind::Text => true,
        }
    }

    fn convert(&self, cell: &str) -> Value {
        let trimmed = cell.trim();
        let converted = match self {
            CsvKind::Int => trimmed.parse::<i64>().ok().map(Value::Int64),
            CsvKind::Float => trimmed.parse::<f64>().ok().map(Value::Float64),
            CsvKind::Bool => Some(Value::Bool(trimmed.eq_ignore_ascii_case("true"))),
            CsvKind::Date => parse_date(trimmed).map(Value::Date),
            CsvKind::DateTime => parse_datetime(trimmed)
                .map(Value::DateTime)
                .or_else(|| parse_date(trimmed).map(|d| Value::DateTime(d.and_time(chrono::NaiveTime::MIN)))),
            CsvKind::Text => None,
        };
        converted.unwrap_or_else(|| Value::String(cell.to_string()))
    }
}

/// Blank headers become `Unnamed: {i}`, duplicates get `.1`, `.2` suffixes
pub(crate) fn normalize_headers(raw: Vec<String>) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut out: Vec<String> = Vec::with_capacity(raw.len());

    for (idx, header) in raw.into_iter().enumerate() {
        let base = if header.trim().is_empty() {
            format!("Unnamed: {}", idx)
        } else {
            header
        };
        let mut name = base.clone();
        while out.contains(&name) {
            let counter = seen.entry(base.clone()).or_insert(0);
            *counter += 1;
            name = format!("{}.{}", base, counter);
        }
        out.push(name);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::datatypes::DataType;

    fn config() -> IngestionConfig {
        IngestionConfig::default()
    }

    #[test]
    fn test_detect_format_by_magic() {
        assert_eq!(TabularFormat::detect(b"PK\x03\x04rest"), TabularFormat::Workbook);
        assert_eq!(TabularFormat::detect(&[0xD0, 0xCF, 0x11, 0xE0, 0xA1]), TabularFormat::LegacyWorkbook);
        assert_eq!(TabularFormat::detect(b"name,age\n"), TabularFormat::Csv);
    }

    #[test]
    fn test_csv_column_inference() {
        let csv = "name,age,score,member,joined\nAnn,31,1.5,true,2023-01-02\nBo,,2,FALSE,2024-05-06\n";
        let ds = load_dataset(csv.as_bytes(), &config()).unwrap();
        assert_eq!(ds.column_names(), vec!["name", "age", "score", "member", "joined"]);
        assert_eq!(ds.column_type(0), DataType::Utf8);
        assert_eq!(ds.column_type(1), DataType::Int64);
        assert_eq!(ds.column_type(2), DataType::Float64);
        assert_eq!(ds.column_type(3), DataType::Boolean);
        assert_eq!(ds.column_type(4), DataType::Date32);
        assert!(ds.value(1, 1).is_null());
        assert_eq!(ds.value(1, 3), Value::Bool(false));
    }

    #[test]
    fn test_csv_bom_is_stripped_and_ragged_rows_padded() {
        let mut bytes = UTF8_BOM.to_vec();
        bytes.extend_from_slice("id,city\n1\n2,Seoul\n".as_bytes());
        let table = load_table(&bytes, &config()).unwrap();
        assert_eq!(table.headers, vec!["id", "city"]);
        assert_eq!(table.rows[0], vec![Value::Int64(1), Value::Null]);
        assert_eq!(table.text(1, 1).as_deref(), Some("Seoul"));
    }

    #[test]
    fn test_empty_and_binary_uploads_fail() {
        assert!(matches!(load_table(b"", &config()), Err(DrawError::DatasetLoad { .. })));
        let garbage = [0xFFu8, 0xFE, 0x00, 0x81];
        assert!(matches!(load_table(&garbage, &config()), Err(DrawError::DatasetLoad { .. })));
    }

    #[test]
    fn test_broken_workbook_is_a_load_error() {
        let err = load_table(b"PK\x03\x04not really a zip", &config()).unwrap_err();
        match err {
            DrawError::DatasetLoad { source_format, .. } => assert_eq!(source_format.as_deref(), Some("xlsx")),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_header_normalization() {
        let headers = normalize_headers(vec!["a".into(), "".into(), "a".into(), "a".into()]);
        assert_eq!(headers, vec!["a", "Unnamed: 1", "a.1", "a.2"]);
    }

    #[test]
    fn test_excel_serials() {
        assert_eq!(
            excel_serial_to_value(45292.0),
            Value::Date(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap())
        );
        match excel_serial_to_value(45292.5) {
            Value::DateTime(dt) => assert_eq!(dt.format("%Y-%m-%d %H:%M").to_string(), "2024-01-01 12:00"),
            other => panic!("expected datetime, got {:?}", other),
        }
    }

    #[test]
    fn test_workbook_cells() {
        assert_eq!(cell_to_value(&Data::Float(30.0)), Value::Int64(30));
        assert_eq!(cell_to_value(&Data::Float(30.5)), Value::Float64(30.5));
        assert_eq!(cell_to_value(&Data::Empty), Value::Null);
        assert_eq!(
            cell_to_value(&Data::DateTimeIso("2024-02-03".into())),
            Value::Date(NaiveDate::from_ymd_opt(2024, 2, 3).unwrap())
        );
    }
}
