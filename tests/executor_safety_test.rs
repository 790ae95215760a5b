//! Read-only guarantees and result properties of the query executor
//!
//! Run with: `cargo test --test executor_safety_test`

use sql_draw_engine::ingestion::load_dataset;
use sql_draw_engine::config::IngestionConfig;
use sql_draw_engine::{Dataset, DrawError, QueryExecutor, Value};

fn members() -> Dataset {
    let csv = "member id,이름,age,vip,joined\n\
1,김민수,34,true,2021-03-01\n\
2,이서연,28,false,2023-07-09\n\
3,박지훈,,true,2022-01-15\n\
4,최유나,41,false,2020-11-30\n\
5,정하늘,30,true,2024-02-29\n";
    load_dataset(csv.as_bytes(), &IngestionConfig::default()).unwrap()
}

fn execute(sql: &str) -> Result<sql_draw_engine::FilteredResult, DrawError> {
    QueryExecutor::new("df").execute(sql, &members())
}

fn ids(sql: &str) -> Vec<usize> {
    execute(sql).unwrap().source_rows
}

#[test]
fn test_mutating_statements_are_rejected() {
    for sql in [
        "INSERT INTO df VALUES (6, 'x', 1, true, '2024-01-01')",
        "UPDATE df SET age = 0",
        "DELETE FROM df",
        "DROP TABLE df",
        "CREATE TABLE t (a INT)",
        "SELECT * FROM df; DELETE FROM df",
    ] {
        let err = execute(sql).unwrap_err();
        assert!(matches!(err, DrawError::QueryExecution { .. }), "{} was not rejected", sql);
    }
    assert_eq!(members().num_rows(), 5);
}

#[test]
fn test_only_the_bound_relation_is_addressable() {
    assert!(execute("SELECT * FROM users").is_err());
    assert!(execute("SELECT * FROM df a JOIN df b ON a.age = b.age").is_err());
    assert!(execute("SELECT * FROM df WHERE age IN (SELECT age FROM df)").is_err());
    assert!(execute("SELECT * FROM df WHERE EXISTS (SELECT 1 FROM df)").is_err());
}

#[test]
fn test_grouping_is_rejected() {
    assert!(execute("SELECT vip, COUNT(*) FROM df GROUP BY vip").is_err());
    assert!(execute("SELECT MAX(age) FROM df").is_err());
}

#[test]
fn test_quoted_and_non_ascii_identifiers() {
    assert_eq!(ids("SELECT * FROM df WHERE \"member id\" > 3"), vec![3, 4]);
    assert_eq!(ids("SELECT * FROM df WHERE 이름 LIKE '김%'"), vec![0]);
}

#[test]
fn test_boolean_and_date_dialect() {
    assert_eq!(ids("SELECT * FROM df WHERE vip = TRUE"), vec![0, 2, 4]);
    assert_eq!(ids("SELECT * FROM df WHERE vip = 1"), vec![0, 2, 4]);
    assert_eq!(ids("SELECT * FROM df WHERE vip"), vec![0, 2, 4]);
    assert_eq!(ids("SELECT * FROM df WHERE joined < '2022-01-01'"), vec![0, 3]);
    assert_eq!(ids("SELECT * FROM df WHERE joined >= DATE '2023-01-01'"), vec![1, 4]);
    assert_eq!(ids("SELECT * FROM df WHERE YEAR(joined) = 2022"), vec![2]);
}

#[test]
fn test_null_handling() {
    assert_eq!(ids("SELECT * FROM df WHERE age IS NULL"), vec![2]);
    assert_eq!(ids("SELECT * FROM df WHERE NOT (age > 30)"), vec![1, 4]);
    assert_eq!(ids("SELECT * FROM df WHERE COALESCE(age, 0) < 29"), vec![1, 2]);
}

#[test]
fn test_results_are_a_subset_of_the_source() {
    let source = members();
    let result = execute("SELECT * FROM df WHERE age BETWEEN 25 AND 40 ORDER BY age DESC").unwrap();
    for (row, &source_row) in result.source_rows.iter().enumerate() {
        assert_eq!(result.dataset.row(row), source.row(source_row));
    }
}

#[test]
fn test_execution_is_idempotent() {
    let sql = "SELECT 이름, age * 2 AS doubled FROM df WHERE vip ORDER BY doubled";
    let first = execute(sql).unwrap();
    let second = execute(sql).unwrap();
    assert_eq!(first.source_rows, second.source_rows);
    assert_eq!(first.dataset.rows(), second.dataset.rows());
    // NULL sorts first ascending
    assert!(first.dataset.value(0, 1).is_null());
    assert_eq!(first.dataset.value(1, 1), Value::Int64(60));
}

#[test]
fn test_unknown_column_fails_even_without_matches() {
    let empty = execute("SELECT * FROM df WHERE age > 1000").unwrap();
    assert!(empty.is_empty());
    let err = execute("SELECT * FROM df WHERE age > 1000 AND height > 1").unwrap_err();
    assert!(err.to_string().contains("height"));
}

#[test]
fn test_division_by_zero_is_an_execution_error() {
    let err = execute("SELECT * FROM df WHERE age / 0 > 1").unwrap_err();
    assert!(matches!(err, DrawError::QueryExecution { .. }));
}
