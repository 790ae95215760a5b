//! Alias Resolver - human-friendly column names from an auxiliary mapping table
//!
//! A mapping table pairs a label (e.g. a localized column name) with the name of
//! an existing dataset column. Applying the mapping appends a copy of the
//! canonical column under the label, so the translator can refer to either name.

use crate::config::IngestionConfig;
use crate::error::{DrawError, DrawResult};
use crate::ingestion::tabular::{load_table, RawTable};
use crate::storage::dataset::Dataset;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info};

/// Recognised headers for the canonical column, highest precedence first
const CANONICAL_HEADERS: &[&str] = &["english", "eng", "en", "canonical", "column"];

/// Recognised headers for the label column, highest precedence first
const LABEL_HEADERS: &[&str] = &["korean", "kor", "ko", "alias", "label"];

/// Cell contents treated as missing
const NULL_MARKERS: &[&str] = &["nan", "none", "null", "na", "n/a"];

/// Positional layout used when the headers are not recognised
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MappingOrientation {
    /// First column is the dataset column, second the label
    #[default]
    CanonicalFirst,
    /// First column is the label, second the dataset column
    LabelFirst,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AliasEntry {
    pub label: String,
    pub canonical: String,
}

/// Ordered label -> canonical column mapping with unique labels
#[derive(Clone, Debug, Default)]
pub struct AliasMapping {
    entries: Vec<AliasEntry>,
    positions: HashMap<String, usize>,
}

/// Why an entry did not produce a column
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The canonical column is not in the dataset
    MissingCanonical,
    /// A column with the label's name already exists
    LabelExists,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedAlias {
    pub entry: AliasEntry,
    pub reason: SkipReason,
}

/// Outcome of applying a mapping, for display to the operator
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AliasReport {
    pub added: Vec<AliasEntry>,
    pub skipped: Vec<SkippedAlias>,
}

impl AliasMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite; an overwritten label keeps its original position
    pub fn insert(&mut self, label: impl Into<String>, canonical: impl Into<String>) {
        let label = label.into();
        let canonical = canonical.into();
        match self.positions.get(&label) {
            Some(&idx) => self.entries[idx].canonical = canonical,
            None => {
                self.positions.insert(label.clone(), self.entries.len());
                self.entries.push(AliasEntry { label, canonical });
            }
        }
    }

    pub fn get(&self, label: &str) -> Option<&str> {
        self.positions.get(label).map(|&idx| self.entries[idx].canonical.as_str())
    }

    pub fn entries(&self) -> &[AliasEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Parse a mapping upload (any format `load_table` accepts)
    pub fn from_bytes(bytes: &[u8], orientation: MappingOrientation, config: &IngestionConfig) -> DrawResult<Self> {
        let table = load_table(bytes, config).map_err(|e| match e {
            DrawError::DatasetLoad { message, .. } => DrawError::mapping_format(message),
            other => other,
        })?;
        Self::from_table(&table, orientation)
    }

    /// Build the mapping from an already loaded two-column table
    pub fn from_table(table: &RawTable, orientation: MappingOrientation) -> DrawResult<Self> {
        if table.num_columns() < 2 {
            return Err(DrawError::mapping_format(format!(
                "mapping table needs 2 columns, found {}",
                table.num_columns()
            )));
        }
        if table.is_empty() {
            return Err(DrawError::mapping_format("mapping table has no rows"));
        }

        let (label_col, canonical_col) = resolve_columns(&table.headers, orientation);
        debug!(
            label = %table.headers[label_col],
            canonical = %table.headers[canonical_col],
            "Resolved mapping columns"
        );

        let mut mapping = Self::new();
        for row in 0..table.rows.len() {
            let label = table.text(row, label_col);
            let canonical = table.text(row, canonical_col);
            match (clean_cell(label), clean_cell(canonical)) {
                (Some(label), Some(canonical)) => mapping.insert(label, canonical),
                _ => continue,
            }
        }
        Ok(mapping)
    }

    /// Append alias columns to the dataset; existing columns always win
    pub fn apply(&self, dataset: &Dataset) -> DrawResult<(Dataset, AliasReport)> {
        let mut augmented = dataset.clone();
        let mut report = AliasReport::default();

        for entry in &self.entries {
            let Some(source_idx) = augmented.column_index(&entry.canonical) else {
                report.skipped.push(SkippedAlias {
                    entry: entry.clone(),
                    reason: SkipReason::MissingCanonical,
                });
                continue;
            };
            if augmented.has_column(&entry.label) {
                report.skipped.push(SkippedAlias {
                    entry: entry.clone(),
                    reason: SkipReason::LabelExists,
                });
                continue;
            }
            let copy = augmented.column(source_idx).clone();
            augmented = augmented
                .with_column(&entry.label, copy)
                .map_err(|e| DrawError::mapping_format(e.to_string()))?;
            report.added.push(entry.clone());
        }

        info!(
            added = report.added.len(),
            skipped = report.skipped.len(),
            "Applied alias mapping"
        );
        Ok((augmented, report))
    }
}

/// Pick (label, canonical) column indices
fn resolve_columns(headers: &[String], orientation: MappingOrientation) -> (usize, usize) {
    let find = |candidates: &[&str]| {
        candidates.iter().find_map(|candidate| {
            headers
                .iter()
                .position(|h| h.trim().eq_ignore_ascii_case(candidate))
        })
    };

    match (find(LABEL_HEADERS), find(CANONICAL_HEADERS)) {
        (Some(label), Some(canonical)) if label != canonical => (label, canonical),
        _ => match orientation {
            MappingOrientation::CanonicalFirst => (1, 0),
            MappingOrientation::LabelFirst => (0, 1),
        },
    }
}

fn clean_cell(cell: Option<String>) -> Option<String> {
    let text = cell?.trim().to_string();
    if text.is_empty() || NULL_MARKERS.iter().any(|m| text.eq_ignore_ascii_case(m)) {
        None
    } else {
        Some(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::value::Value;
    use arrow::array::{ArrayRef, Int64Array, StringArray};
    use std::sync::Arc;

    fn table(headers: &[&str], rows: &[&[&str]]) -> RawTable {
        RawTable {
            headers: headers.iter().map(|h| h.to_string()).collect(),
            rows: rows
                .iter()
                .map(|r| {
                    r.iter()
                        .map(|c| if c.is_empty() { Value::Null } else { Value::String(c.to_string()) })
                        .collect()
                })
                .collect(),
        }
    }

    fn dataset() -> Dataset {
        Dataset::from_columns(vec![
            ("name".to_string(), Arc::new(StringArray::from(vec!["Ann", "Bo"])) as ArrayRef),
            ("age".to_string(), Arc::new(Int64Array::from(vec![31, 22])) as ArrayRef),
        ])
        .unwrap()
    }

    #[test]
    fn test_recognised_headers_beat_orientation() {
        // Label column comes first but the headers say which is which
        let t = table(&["Korean", "English"], &[&["나이", "age"]]);
        let mapping = AliasMapping::from_table(&t, MappingOrientation::CanonicalFirst).unwrap();
        assert_eq!(mapping.get("나이"), Some("age"));
    }

    #[test]
    fn test_positional_fallback() {
        let t = table(&["c1", "c2"], &[&["age", "나이"]]);
        let canonical_first = AliasMapping::from_table(&t, MappingOrientation::CanonicalFirst).unwrap();
        assert_eq!(canonical_first.get("나이"), Some("age"));

        let label_first = AliasMapping::from_table(&t, MappingOrientation::LabelFirst).unwrap();
        assert_eq!(label_first.get("age"), Some("나이"));
    }

    #[test]
    fn test_null_markers_skipped_and_last_write_wins() {
        let t = table(
            &["en", "ko"],
            &[&["age", "나이"], &["name", "NaN"], &["", "성별"], &["name", "나이"]],
        );
        let mapping = AliasMapping::from_table(&t, MappingOrientation::CanonicalFirst).unwrap();
        assert_eq!(mapping.len(), 1);
        assert_eq!(mapping.get("나이"), Some("name"));
    }

    #[test]
    fn test_single_column_table_is_a_format_error() {
        let t = table(&["only"], &[&["x"]]);
        let err = AliasMapping::from_table(&t, MappingOrientation::CanonicalFirst).unwrap_err();
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_empty_table_is_a_format_error() {
        let t = table(&["en", "ko"], &[]);
        assert!(matches!(
            AliasMapping::from_table(&t, MappingOrientation::CanonicalFirst),
            Err(DrawError::MappingFormat { .. })
        ));
    }

    #[test]
    fn test_apply_adds_and_reports() {
        let mut mapping = AliasMapping::new();
        mapping.insert("나이", "age");
        mapping.insert("name", "age");
        mapping.insert("성별", "gender");

        let (augmented, report) = mapping.apply(&dataset()).unwrap();
        assert_eq!(augmented.column_names(), vec!["name", "age", "나이"]);
        assert_eq!(augmented.value(0, 2), Value::Int64(31));
        assert_eq!(report.added.len(), 1);
        assert_eq!(report.skipped.len(), 2);
        assert_eq!(report.skipped[0].reason, SkipReason::LabelExists);
        assert_eq!(report.skipped[1].reason, SkipReason::MissingCanonical);
    }

    #[test]
    fn test_apply_twice_is_idempotent() {
        let mut mapping = AliasMapping::new();
        mapping.insert("나이", "age");
        let (once, _) = mapping.apply(&dataset()).unwrap();
        let (twice, report) = mapping.apply(&once).unwrap();
        assert_eq!(once.column_names(), twice.column_names());
        assert_eq!(once.rows(), twice.rows());
        assert!(report.added.is_empty());
    }

    #[test]
    fn test_mapping_from_csv_bytes() {
        let csv = "english,korean\nage,나이\nname,이름\n";
        let mapping = AliasMapping::from_bytes(
            csv.as_bytes(),
            MappingOrientation::LabelFirst,
            &IngestionConfig::default(),
        )
        .unwrap();
        assert_eq!(mapping.get("이름"), Some("name"));
    }
}
