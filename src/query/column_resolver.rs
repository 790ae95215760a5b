/// Column Resolution
/// Binds column references in a query to positions in the dataset
use crate::storage::dataset::Dataset;
use anyhow::{bail, Result};

/// Resolves (optionally qualified) column names against one relation
#[derive(Clone, Debug)]
pub struct ColumnResolver {
    columns: Vec<String>,
    /// Names the relation may be referred to by (its name, then an alias)
    qualifiers: Vec<String>,
}

impl ColumnResolver {
    pub fn new(dataset: &Dataset, relation_name: &str, alias: Option<&str>) -> Self {
        let mut qualifiers = vec![relation_name.to_string()];
        if let Some(alias) = alias {
            qualifiers.push(alias.to_string());
        }
        Self {
            columns: dataset.column_names(),
            qualifiers,
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn is_qualifier(&self, name: &str) -> bool {
        self.qualifiers.iter().any(|q| q.eq_ignore_ascii_case(name))
    }

    /// Resolve a bare column name
    /// Exact match first, then a unique case-insensitive match
    pub fn resolve(&self, column_name: &str) -> Result<usize> {
        if let Some(idx) = self.columns.iter().position(|c| c == column_name) {
            return Ok(idx);
        }

        let candidates: Vec<usize> = self
            .columns
            .iter()
            .enumerate()
            .filter(|(_, c)| c.eq_ignore_ascii_case(column_name))
            .map(|(idx, _)| idx)
            .collect();
        match candidates.as_slice() {
            [idx] => Ok(*idx),
            [] => bail!(
                "Unknown column '{}'. Available columns: {}",
                column_name,
                self.columns.join(", ")
            ),
            _ => bail!(
                "Column reference '{}' is ambiguous (matches {})",
                column_name,
                candidates
                    .iter()
                    .map(|idx| self.columns[*idx].as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        }
    }

    /// Resolve `qualifier.column`; the qualifier must name this relation
    pub fn resolve_qualified(&self, qualifier: &str, column_name: &str) -> Result<usize> {
        if !self.is_qualifier(qualifier) {
            bail!(
                "Unknown table '{}': queries may only read from '{}'",
                qualifier,
                self.qualifiers[0]
            );
        }
        self.resolve(column_name)
    }

    pub fn try_resolve(&self, column_name: &str) -> Option<usize> {
        self.resolve(column_name).ok()
    }
}
