//! Schema Summarizer - a compact description of the dataset for the model
//!
//! Column names plus the first few rows, rendered as text. The model sees the
//! real spelling of column names and representative value formats.

use crate::result_format::render_table;
use crate::storage::dataset::Dataset;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SchemaSummary {
    /// Column names in dataset order
    pub columns: Vec<String>,
    /// Number of sample rows included
    pub sample_rows: usize,
    /// Sample rows as a text table
    pub sample_text: String,
}

impl SchemaSummary {
    pub fn from_dataset(dataset: &Dataset, max_rows: usize) -> Self {
        let sample = dataset.head(max_rows);
        Self {
            columns: dataset.column_names(),
            sample_rows: sample.num_rows(),
            sample_text: render_table(&sample, max_rows),
        }
    }

    pub fn render(&self) -> String {
        format!(
            "Columns: {}\n\nSample Data:\n{}",
            self.columns.join(", "),
            self.sample_text
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::value::Value;

    fn dataset(rows: usize) -> Dataset {
        let headers = vec!["name".to_string(), "나이".to_string()];
        let rows: Vec<Vec<Value>> = (0..rows)
            .map(|i| vec![Value::String(format!("p{}", i)), Value::Int64(20 + i as i64)])
            .collect();
        Dataset::from_rows(&headers, &rows).unwrap()
    }

    #[test]
    fn test_render_layout() {
        let summary = SchemaSummary::from_dataset(&dataset(5), 3);
        assert_eq!(summary.sample_rows, 3);
        let text = summary.render();
        assert!(text.starts_with("Columns: name, 나이\n\nSample Data:\n"));
        assert!(text.contains("p2"));
        assert!(!text.contains("p3"));
        assert!(!text.contains("more rows"));
    }

    #[test]
    fn test_fewer_rows_than_requested() {
        let summary = SchemaSummary::from_dataset(&dataset(1), 3);
        assert_eq!(summary.sample_rows, 1);
        assert_eq!(summary.sample_text.lines().count(), 2);
    }

    #[test]
    fn test_empty_dataset_still_lists_columns() {
        let summary = SchemaSummary::from_dataset(&dataset(0), 3);
        assert_eq!(summary.columns, vec!["name", "나이"]);
        assert_eq!(summary.sample_rows, 0);
    }
}
