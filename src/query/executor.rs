//! Safe Query Executor - evaluates a read-only SELECT against the in-memory dataset
//!
//! Pipeline: filter -> sort -> computed projections -> distinct ->
//! offset/limit -> materialize. Computed projections are evaluated per
//! surviving row before DISTINCT compares output rows; plain column
//! projections are gathered with arrow's `take` at the end.

use crate::error::{DrawError, DrawResult};
use crate::ingestion::tabular::normalize_headers;
use crate::query::expression::ExpressionEvaluator;
use crate::query::planner::{ProjectionSource, QueryPlanner, SelectPlan, SortKey};
use crate::storage::dataset::Dataset;
use crate::storage::value::{array_from_values, Value};
use anyhow::Result;
use arrow::array::{ArrayRef, UInt32Array};
use std::cmp::Ordering;
use std::collections::HashSet;
use std::time::Instant;
use tracing::{debug, info};

/// Rows selected by a query, plus where each came from in the source dataset
#[derive(Clone, Debug)]
pub struct FilteredResult {
    pub dataset: Dataset,
    /// Source row index for each result row
    pub source_rows: Vec<usize>,
}

impl FilteredResult {
    /// The whole dataset, unfiltered
    pub fn unfiltered(dataset: &Dataset) -> Self {
        Self {
            dataset: dataset.clone(),
            source_rows: (0..dataset.num_rows()).collect(),
        }
    }

    pub fn num_rows(&self) -> usize {
        self.dataset.num_rows()
    }

    pub fn is_empty(&self) -> bool {
        self.dataset.is_empty()
    }
}

#[derive(Clone, Debug)]
pub struct QueryExecutor {
    planner: QueryPlanner,
}

impl QueryExecutor {
    pub fn new(relation_name: impl Into<String>) -> Self {
        Self {
            planner: QueryPlanner::new(relation_name),
        }
    }

    pub fn relation_name(&self) -> &str {
        self.planner.relation_name()
    }

    /// Run `sql` against `dataset`; the dataset is never modified
    pub fn execute(&self, sql: &str, dataset: &Dataset) -> DrawResult<FilteredResult> {
        let start = Instant::now();
        let result = self
            .planner
            .plan(sql, dataset)
            .and_then(|plan| execute_plan(&plan, dataset))
            .map_err(|e| DrawError::query_execution(format!("{:#}", e)).with_query(sql))?;

        info!(
            rows = result.num_rows(),
            source_rows = dataset.num_rows(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Executed query"
        );
        Ok(result)
    }
}

pub fn execute_plan(plan: &SelectPlan, dataset: &Dataset) -> Result<FilteredResult> {
    let evaluator = ExpressionEvaluator::new(dataset);

    // 1. Filter
    let mut rows: Vec<usize> = match &plan.filter {
        Some(predicate) => {
            let mut selected = Vec::new();
            for row in 0..dataset.num_rows() {
                if evaluator.matches(predicate, row)? {
                    selected.push(row);
                }
            }
            selected
        }
        None => (0..dataset.num_rows()).collect(),
    };
    debug!(matched = rows.len(), "Filter applied");

    // 2. Sort (stable, so ties keep dataset order)
    if !plan.order_by.is_empty() {
        let mut keyed: Vec<(Vec<Value>, usize)> = Vec::with_capacity(rows.len());
        for &row in &rows {
            let keys = plan
                .order_by
                .iter()
                .map(|key| evaluator.evaluate(&key.expr, row))
                .collect::<Result<Vec<_>>>()?;
            keyed.push((keys, row));
        }
        keyed.sort_by(|(a, _), (b, _)| compare_sort_keys(a, b, &plan.order_by));
        rows = keyed.into_iter().map(|(_, row)| row).collect();
    }

    // 3. Project computed columns for the surviving rows
    let mut computed: Vec<Option<Vec<Value>>> = Vec::with_capacity(plan.projections.len());
    for projection in &plan.projections {
        match &projection.source {
            ProjectionSource::Column(_) => computed.push(None),
            ProjectionSource::Computed(expr) => {
                let values = rows
                    .iter()
                    .map(|&row| evaluator.evaluate(expr, row))
                    .collect::<Result<Vec<_>>>()?;
                computed.push(Some(values));
            }
        }
    }
    let output_value = |pos: usize, proj_idx: usize| -> Value {
        match (&plan.projections[proj_idx].source, &computed[proj_idx]) {
            (_, Some(values)) => values[pos].clone(),
            (ProjectionSource::Column(col), None) => dataset.value(rows[pos], *col),
            (ProjectionSource::Computed(_), None) => Value::Null,
        }
    };

    // 4. DISTINCT keeps the first occurrence of each output row
    let mut keep: Vec<usize> = (0..rows.len()).collect();
    if plan.distinct {
        let mut seen: HashSet<Vec<Value>> = HashSet::new();
        keep.retain(|&pos| {
            let output: Vec<Value> = (0..plan.projections.len()).map(|p| output_value(pos, p)).collect();
            seen.insert(output)
        });
    }

    // 5. OFFSET / LIMIT
    let window: Vec<usize> = keep
        .into_iter()
        .skip(plan.offset)
        .take(plan.limit.unwrap_or(usize::MAX))
        .collect();

    // 6. Materialize
    let source_rows: Vec<usize> = window.iter().map(|&pos| rows[pos]).collect();
    let take_idx = UInt32Array::from(
        source_rows
            .iter()
            .map(|&row| u32::try_from(row))
            .collect::<std::result::Result<Vec<u32>, _>>()?,
    );

    let names = normalize_headers(plan.projections.iter().map(|p| p.name.clone()).collect());
    let mut columns: Vec<(String, ArrayRef)> = Vec::with_capacity(plan.projections.len());
    for (proj_idx, (projection, name)) in plan.projections.iter().zip(names).enumerate() {
        let array = match (&projection.source, &computed[proj_idx]) {
            (ProjectionSource::Column(col), _) => {
                arrow::compute::take(dataset.column(*col).as_ref(), &take_idx, None)?
            }
            (ProjectionSource::Computed(_), Some(values)) => {
                let selected: Vec<Value> = window.iter().map(|&pos| values[pos].clone()).collect();
                array_from_values(&selected)
            }
            (ProjectionSource::Computed(_), None) => array_from_values(&vec![Value::Null; window.len()]),
        };
        columns.push((name, array));
    }

    Ok(FilteredResult {
        dataset: Dataset::from_columns(columns)?,
        source_rows,
    })
}

fn compare_sort_keys(a: &[Value], b: &[Value], keys: &[SortKey]) -> Ordering {
    for ((left, right), key) in a.iter().zip(b.iter()).zip(keys) {
        let ordering = match (left.is_null(), right.is_null()) {
            (true, true) => Ordering::Equal,
            (true, false) => {
                if key.nulls_first {
                    Ordering::Less
                } else {
                    Ordering::Greater
                }
            }
            (false, true) => {
                if key.nulls_first {
                    Ordering::Greater
                } else {
                    Ordering::Less
                }
            }
            (false, false) => {
                let ord = left.sort_cmp(right);
                if key.ascending {
                    ord
                } else {
                    ord.reverse()
                }
            }
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn people() -> Dataset {
        let headers = vec![
            "name".to_string(),
            "age".to_string(),
            "gender".to_string(),
            "joined".to_string(),
        ];
        let d = |y, m, day| Value::Date(NaiveDate::from_ymd_opt(y, m, day).unwrap());
        let rows = vec![
            vec![Value::String("Kim".into()), Value::Int64(34), Value::String("F".into()), d(2021, 3, 1)],
            vec![Value::String("Lee".into()), Value::Int64(28), Value::String("M".into()), d(2023, 7, 9)],
            vec![Value::String("Park".into()), Value::Null, Value::String("F".into()), d(2022, 1, 15)],
            vec![Value::String("Choi".into()), Value::Int64(41), Value::String("M".into()), d(2020, 11, 30)],
        ];
        Dataset::from_rows(&headers, &rows).unwrap()
    }

    fn run(sql: &str) -> DrawResult<FilteredResult> {
        QueryExecutor::new("df").execute(sql, &people())
    }

    #[test]
    fn test_filter_keeps_columns_and_source_rows() {
        let result = run("SELECT * FROM df WHERE gender = 'F'").unwrap();
        assert_eq!(result.source_rows, vec![0, 2]);
        assert_eq!(result.dataset.column_names(), people().column_names());
    }

    #[test]
    fn test_null_never_satisfies_a_comparison() {
        let result = run("SELECT name FROM df WHERE age > 30 OR age <= 30").unwrap();
        assert_eq!(result.source_rows, vec![0, 1, 3]);
    }

    #[test]
    fn test_date_string_comparison() {
        let result = run("SELECT name FROM df WHERE joined >= '2022-01-01'").unwrap();
        assert_eq!(result.source_rows, vec![1, 2]);
    }

    #[test]
    fn test_order_by_nulls_first_ascending() {
        let result = run("SELECT name, age FROM df ORDER BY age").unwrap();
        assert_eq!(result.source_rows, vec![2, 1, 0, 3]);
        let result = run("SELECT name, age FROM df ORDER BY age DESC").unwrap();
        assert_eq!(result.source_rows, vec![3, 0, 1, 2]);
    }

    #[test]
    fn test_distinct_and_limit() {
        let result = run("SELECT DISTINCT gender FROM df").unwrap();
        assert_eq!(result.num_rows(), 2);
        assert_eq!(result.source_rows, vec![0, 1]);

        let result = run("SELECT * FROM df LIMIT 2 OFFSET 1").unwrap();
        assert_eq!(result.source_rows, vec![1, 2]);
    }

    #[test]
    fn test_computed_projection() {
        let result = run("SELECT name, age + 1 AS next_age FROM df WHERE age IS NOT NULL").unwrap();
        assert_eq!(result.dataset.column_names(), vec!["name", "next_age"]);
        assert_eq!(result.dataset.value(0, 1), Value::Int64(35));
    }

    #[test]
    fn test_duplicate_output_names_are_suffixed() {
        let result = run("SELECT name, name FROM df").unwrap();
        assert_eq!(result.dataset.column_names(), vec!["name", "name.1"]);
    }

    #[test]
    fn test_errors_carry_the_query() {
        let err = run("SELECT * FROM df WHERE height > 3").unwrap_err();
        match err {
            DrawError::QueryExecution { message, query } => {
                assert!(message.contains("height"));
                assert_eq!(query.as_deref(), Some("SELECT * FROM df WHERE height > 3"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_integer_overflow_is_reported() {
        let err = run("SELECT * FROM df WHERE (-9223372036854775807 - 1) % -1 = 0").unwrap_err();
        assert!(matches!(err, DrawError::QueryExecution { ref message, .. } if message.contains("overflow")));
    }

    #[test]
    fn test_type_mismatch_is_reported() {
        assert!(run("SELECT * FROM df WHERE name > 3").is_err());
    }
}
