//! Dataset - the uploaded table, held as a single arrow record batch
//!
//! Columns are dynamically typed (their arrow `DataType` is the runtime tag).
//! A dataset is never mutated in place: augmentation returns a new dataset
//! that shares the existing column buffers.

use crate::storage::value::{array_from_values, value_from_array, Value};
use arrow::array::{ArrayRef, UInt32Array};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use anyhow::{Context, Result};
use std::sync::Arc;

#[derive(Clone, Debug)]
pub struct Dataset {
    batch: RecordBatch,
}

impl Dataset {
    /// Wrap an existing record batch
    pub fn new(batch: RecordBatch) -> Self {
        Self { batch }
    }

    /// Build a dataset from named arrays (all the same length)
    pub fn from_columns(columns: Vec<(String, ArrayRef)>) -> Result<Self> {
        let fields: Vec<Field> = columns
            .iter()
            .map(|(name, array)| Field::new(name, array.data_type().clone(), true))
            .collect();
        let schema: SchemaRef = Arc::new(Schema::new(fields));
        let arrays: Vec<ArrayRef> = columns.into_iter().map(|(_, array)| array).collect();
        let batch = RecordBatch::try_new(schema, arrays).context("Columns do not form a valid table")?;
        Ok(Self { batch })
    }

    /// Build a dataset from row-major values, inferring one type per column
    pub fn from_rows(headers: &[String], rows: &[Vec<Value>]) -> Result<Self> {
        let mut columns = Vec::with_capacity(headers.len());
        for (col_idx, name) in headers.iter().enumerate() {
            let values: Vec<Value> = rows
                .iter()
                .map(|row| row.get(col_idx).cloned().unwrap_or(Value::Null))
                .collect();
            columns.push((name.clone(), array_from_values(&values)));
        }
        Self::from_columns(columns)
    }

    pub fn batch(&self) -> &RecordBatch {
        &self.batch
    }

    pub fn schema(&self) -> SchemaRef {
        self.batch.schema()
    }

    pub fn num_rows(&self) -> usize {
        self.batch.num_rows()
    }

    pub fn num_columns(&self) -> usize {
        self.batch.num_columns()
    }

    pub fn is_empty(&self) -> bool {
        self.num_rows() == 0
    }

    /// Column names in dataset order
    pub fn column_names(&self) -> Vec<String> {
        self.batch
            .schema()
            .fields()
            .iter()
            .map(|f| f.name().to_string())
            .collect()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.batch.schema().index_of(name).ok()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    pub fn column(&self, idx: usize) -> &ArrayRef {
        self.batch.column(idx)
    }

    pub fn column_type(&self, idx: usize) -> DataType {
        self.batch.column(idx).data_type().clone()
    }

    pub fn value(&self, row: usize, col: usize) -> Value {
        value_from_array(self.batch.column(col), row)
    }

    pub fn row(&self, row: usize) -> Vec<Value> {
        (0..self.num_columns()).map(|col| self.value(row, col)).collect()
    }

    /// All rows, row-major
    pub fn rows(&self) -> Vec<Vec<Value>> {
        (0..self.num_rows()).map(|row| self.row(row)).collect()
    }

    /// Return a new dataset with one extra column appended
    pub fn with_column(&self, name: &str, array: ArrayRef) -> Result<Self> {
        if self.has_column(name) {
            anyhow::bail!("Column '{}' already exists", name);
        }
        let mut columns: Vec<(String, ArrayRef)> = self
            .column_names()
            .into_iter()
            .zip(self.batch.columns().iter().cloned())
            .collect();
        columns.push((name.to_string(), array));
        Self::from_columns(columns)
    }

    /// Gather rows by index (repeats and reordering allowed)
    pub fn take(&self, indices: &[usize]) -> Result<Self> {
        let idx: Vec<u32> = indices
            .iter()
            .map(|i| u32::try_from(*i).context("Row index exceeds u32 range"))
            .collect::<Result<_>>()?;
        let idx = UInt32Array::from(idx);
        let arrays = self
            .batch
            .columns()
            .iter()
            .map(|col| arrow::compute::take(col.as_ref(), &idx, None).context("Failed to gather rows"))
            .collect::<Result<Vec<_>>>()?;
        let batch = RecordBatch::try_new(self.batch.schema(), arrays)?;
        Ok(Self { batch })
    }

    /// First `n` rows (zero-copy)
    pub fn head(&self, n: usize) -> Self {
        let len = n.min(self.num_rows());
        Self {
            batch: self.batch.slice(0, len),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Int64Array, StringArray};

    fn people() -> Dataset {
        Dataset::from_columns(vec![
            ("name".to_string(), Arc::new(StringArray::from(vec!["Ann", "Bo", "Cy"])) as ArrayRef),
            ("age".to_string(), Arc::new(Int64Array::from(vec![31, 22, 45])) as ArrayRef),
        ])
        .unwrap()
    }

    #[test]
    fn test_column_order_is_preserved() {
        let ds = people();
        assert_eq!(ds.column_names(), vec!["name", "age"]);
        assert_eq!(ds.num_rows(), 3);
        assert_eq!(ds.value(2, 1), Value::Int64(45));
    }

    #[test]
    fn test_with_column_is_additive() {
        let ds = people();
        let copy = ds.column(1).clone();
        let augmented = ds.with_column("years", copy).unwrap();
        assert_eq!(augmented.column_names(), vec!["name", "age", "years"]);
        assert_eq!(ds.num_columns(), 2);
        assert!(augmented.with_column("name", ds.column(0).clone()).is_err());
    }

    #[test]
    fn test_take_reorders_rows() {
        let ds = people().take(&[2, 0]).unwrap();
        assert_eq!(ds.num_rows(), 2);
        assert_eq!(ds.value(0, 0), Value::String("Cy".into()));
        assert_eq!(ds.value(1, 0), Value::String("Ann".into()));
    }

    #[test]
    fn test_from_rows_infers_types() {
        let headers = vec!["id".to_string(), "tag".to_string()];
        let rows = vec![
            vec![Value::Int64(1), Value::String("x".into())],
            vec![Value::Int64(2), Value::Null],
        ];
        let ds = Dataset::from_rows(&headers, &rows).unwrap();
        assert_eq!(ds.column_type(0), DataType::Int64);
        assert_eq!(ds.column_type(1), DataType::Utf8);
        assert!(ds.value(1, 1).is_null());
    }

    #[test]
    fn test_head_caps_at_row_count() {
        assert_eq!(people().head(10).num_rows(), 3);
        assert_eq!(people().head(1).num_rows(), 1);
    }
}
