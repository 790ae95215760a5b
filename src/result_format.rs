/// Result formatting
/// Text tables for prompts and previews, delimited bytes for download
use crate::error::{DrawError, DrawResult};
use crate::storage::dataset::Dataset;
use crate::storage::value::Value;
use serde::{Deserialize, Serialize};

/// UTF-8 byte order mark, so spreadsheet tools detect the encoding
pub const UTF8_BOM: &str = "\u{FEFF}";

/// Rows of a dataset rendered as strings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FormattedResult {
    /// Column names
    pub columns: Vec<String>,
    /// Rendered rows (at most the requested number)
    pub rows: Vec<Vec<String>>,
    /// Total row count of the source dataset
    pub row_count: usize,
}

impl FormattedResult {
    /// Render the first `max_rows` rows of `dataset`
    pub fn from_dataset(dataset: &Dataset, max_rows: usize) -> Self {
        let shown = dataset.head(max_rows);
        let rows = shown
            .rows()
            .into_iter()
            .map(|row| row.iter().map(display_cell).collect())
            .collect();
        Self {
            columns: dataset.column_names(),
            rows,
            row_count: dataset.num_rows(),
        }
    }

    pub fn is_truncated(&self) -> bool {
        self.rows.len() < self.row_count
    }

    /// Right-aligned columns, header first, no index
    pub fn to_text(&self) -> String {
        let widths: Vec<usize> = self
            .columns
            .iter()
            .enumerate()
            .map(|(col, name)| {
                self.rows
                    .iter()
                    .map(|row| row[col].chars().count())
                    .chain(std::iter::once(name.chars().count()))
                    .max()
                    .unwrap_or(0)
            })
            .collect();

        let render_line = |cells: &[String]| -> String {
            cells
                .iter()
                .zip(&widths)
                .map(|(cell, width)| format!("{:>width$}", cell, width = *width))
                .collect::<Vec<_>>()
                .join("  ")
        };

        let mut lines = Vec::with_capacity(self.rows.len() + 2);
        lines.push(render_line(&self.columns));
        for row in &self.rows {
            lines.push(render_line(row));
        }
        if self.is_truncated() {
            lines.push(format!("... ({} more rows)", self.row_count - self.rows.len()));
        }
        lines.join("\n")
    }
}

fn display_cell(value: &Value) -> String {
    value.to_string()
}

/// Text table of the first `max_rows` rows
pub fn render_table(dataset: &Dataset, max_rows: usize) -> String {
    FormattedResult::from_dataset(dataset, max_rows).to_text()
}

/// Delimited export; nulls are empty fields
pub fn to_delimited(dataset: &Dataset, delimiter: u8, with_bom: bool) -> DrawResult<Vec<u8>> {
    let mut out: Vec<u8> = Vec::new();
    if with_bom {
        out.extend_from_slice(UTF8_BOM.as_bytes());
    }

    {
        let mut writer = csv::WriterBuilder::new().delimiter(delimiter).from_writer(&mut out);
        writer.write_record(dataset.column_names())?;
        for row in 0..dataset.num_rows() {
            let record: Vec<String> = dataset
                .row(row)
                .iter()
                .map(Value::to_export_string)
                .collect();
            writer.write_record(&record)?;
        }
        writer
            .flush()
            .map_err(|e| DrawError::export(format!("failed to flush CSV writer: {}", e)))?;
    }

    Ok(out)
}

/// The download format: BOM-prefixed, comma-separated UTF-8
pub fn to_csv_with_bom(dataset: &Dataset) -> DrawResult<Vec<u8>> {
    to_delimited(dataset, b',', true)
}
