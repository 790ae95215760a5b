//! Dynamically typed scalar values and their mapping onto arrow arrays

use arrow::array::*;
use arrow::datatypes::{DataType, TimeUnit};
use chrono::{Datelike, NaiveDate, NaiveDateTime};
use std::cmp::Ordering;
use std::sync::Arc;

/// Days between 0001-01-01 (CE day 1) and the unix epoch
const EPOCH_DAYS_FROM_CE: i32 = 719_163;

/// A single cell of a dataset or an intermediate expression result
#[derive(Clone, Debug)]
pub enum Value {
    Int64(i64),
    Float64(f64),
    String(String),
    Bool(bool),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    Null,
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Int64(v) => write!(f, "{}", v),
            Value::Float64(v) => {
                // Keep a trailing ".0" so integral floats stay recognisable as floats
                if v.is_finite() && v.fract() == 0.0 && v.abs() < 1e16 {
                    write!(f, "{:.1}", v)
                } else {
                    write!(f, "{}", v)
                }
            }
            Value::String(v) => write!(f, "{}", v),
            Value::Bool(v) => write!(f, "{}", v),
            Value::Date(v) => write!(f, "{}", v.format("%Y-%m-%d")),
            Value::DateTime(v) => write!(f, "{}", v.format("%Y-%m-%d %H:%M:%S")),
            Value::Null => write!(f, "NULL"),
        }
    }
}

impl std::hash::Hash for Value {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        match self {
            Value::Int64(v) => {
                0u8.hash(state);
                v.hash(state);
            }
            Value::Float64(v) => {
                1u8.hash(state);
                v.to_bits().hash(state);
            }
            Value::String(v) => {
                2u8.hash(state);
                v.hash(state);
            }
            Value::Bool(v) => {
                3u8.hash(state);
                v.hash(state);
            }
            Value::Date(v) => {
                4u8.hash(state);
                v.hash(state);
            }
            Value::DateTime(v) => {
                5u8.hash(state);
                v.hash(state);
            }
            Value::Null => {
                6u8.hash(state);
            }
        }
    }
}

// Structural equality (floats by bit pattern) so rows can be deduplicated.
// SQL comparison semantics live in query::expression.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Int64(a), Value::Int64(b)) => a == b,
            (Value::Float64(a), Value::Float64(b)) => a.to_bits() == b.to_bits(),
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Date(a), Value::Date(b)) => a == b,
            (Value::DateTime(a), Value::DateTime(b)) => a == b,
            (Value::Null, Value::Null) => true,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Name used in type mismatch messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Int64(_) => "integer",
            Value::Float64(_) => "real",
            Value::String(_) => "text",
            Value::Bool(_) => "boolean",
            Value::Date(_) => "date",
            Value::DateTime(_) => "datetime",
            Value::Null => "null",
        }
    }

    /// Numeric view of the value (booleans count as 0/1)
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int64(v) => Some(*v as f64),
            Value::Float64(v) => Some(*v),
            Value::Bool(v) => Some(if *v { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    /// Text used for delimited export: nulls become empty fields
    pub fn to_export_string(&self) -> String {
        match self {
            Value::Null => String::new(),
            other => other.to_string(),
        }
    }

    /// Total order used by ORDER BY: NULL < numbers < dates < text
    pub fn sort_cmp(&self, other: &Self) -> Ordering {
        fn rank(v: &Value) -> u8 {
            match v {
                Value::Null => 0,
                Value::Bool(_) | Value::Int64(_) | Value::Float64(_) => 1,
                Value::Date(_) | Value::DateTime(_) => 2,
                Value::String(_) => 3,
            }
        }

        match (self, other) {
            (Value::Int64(a), Value::Int64(b)) => a.cmp(b),
            (Value::String(a), Value::String(b)) => a.cmp(b),
            (Value::Date(a), Value::Date(b)) => a.cmp(b),
            (Value::DateTime(a), Value::DateTime(b)) => a.cmp(b),
            (Value::Date(a), Value::DateTime(b)) => a.and_time(chrono::NaiveTime::MIN).cmp(b),
            (Value::DateTime(a), Value::Date(b)) => a.cmp(&b.and_time(chrono::NaiveTime::MIN)),
            (a, b) if rank(a) == 1 && rank(b) == 1 => {
                let (x, y) = (a.as_f64().unwrap_or(0.0), b.as_f64().unwrap_or(0.0));
                x.total_cmp(&y)
            }
            (a, b) => rank(a).cmp(&rank(b)),
        }
    }
}

/// Parse `YYYY-MM-DD` (also `/` and `.` separated) dates
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    ["%Y-%m-%d", "%Y/%m/%d", "%Y.%m.%d"]
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
}

/// Parse `YYYY-MM-DD HH:MM:SS` style timestamps (space or `T` separated)
pub fn parse_datetime(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    [
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
    ]
    .iter()
    .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
}

pub(crate) fn date_to_days(date: NaiveDate) -> i32 {
    date.num_days_from_ce() - EPOCH_DAYS_FROM_CE
}

/// Read one cell out of an arrow array
pub fn value_from_array(array: &ArrayRef, idx: usize) -> Value {
    if array.is_null(idx) {
        return Value::Null;
    }

    match array.data_type() {
        DataType::Int64 => match array.as_any().downcast_ref::<Int64Array>() {
            Some(arr) => Value::Int64(arr.value(idx)),
            None => Value::Null,
        },
        DataType::Float64 => match array.as_any().downcast_ref::<Float64Array>() {
            Some(arr) => Value::Float64(arr.value(idx)),
            None => Value::Null,
        },
        DataType::Utf8 => match array.as_any().downcast_ref::<StringArray>() {
            Some(arr) => Value::String(arr.value(idx).to_string()),
            None => Value::Null,
        },
        DataType::Boolean => match array.as_any().downcast_ref::<BooleanArray>() {
            Some(arr) => Value::Bool(arr.value(idx)),
            None => Value::Null,
        },
        DataType::Date32 => array
            .as_any()
            .downcast_ref::<Date32Array>()
            .and_then(|arr| arr.value_as_date(idx))
            .map(Value::Date)
            .unwrap_or(Value::Null),
        DataType::Timestamp(TimeUnit::Millisecond, _) => array
            .as_any()
            .downcast_ref::<TimestampMillisecondArray>()
            .and_then(|arr| arr.value_as_datetime(idx))
            .map(Value::DateTime)
            .unwrap_or(Value::Null),
        _ => match arrow::util::display::array_value_to_string(array, idx) {
            Ok(text) => Value::String(text),
            Err(_) => Value::Null,
        },
    }
}

/// Pick the narrowest arrow type able to hold every non-null value
pub fn infer_data_type(values: &[Value]) -> DataType {
    let mut has_int = false;
    let mut has_float = false;
    let mut has_bool = false;
    let mut has_date = false;
    let mut has_datetime = false;
    let mut has_text = false;

    for value in values {
        match value {
            Value::Int64(_) => has_int = true,
            Value::Float64(_) => has_float = true,
            Value::Bool(_) => has_bool = true,
            Value::Date(_) => has_date = true,
            Value::DateTime(_) => has_datetime = true,
            Value::String(_) => has_text = true,
            Value::Null => {}
        }
    }

    let numeric = has_int || has_float;
    let temporal = has_date || has_datetime;
    let families = [numeric, has_bool, temporal, has_text]
        .iter()
        .filter(|present| **present)
        .count();

    if families != 1 {
        // Mixed families (or all null) fall back to text
        return DataType::Utf8;
    }
    if numeric {
        if has_float {
            DataType::Float64
        } else {
            DataType::Int64
        }
    } else if has_bool {
        DataType::Boolean
    } else if temporal {
        if has_datetime {
            DataType::Timestamp(TimeUnit::Millisecond, None)
        } else {
            DataType::Date32
        }
    } else {
        DataType::Utf8
    }
}

/// Build an arrow array from a column of values, inferring its type
pub fn array_from_values(values: &[Value]) -> ArrayRef {
    match infer_data_type(values) {
        DataType::Int64 => {
            let arr: Vec<Option<i64>> = values
                .iter()
                .map(|v| match v {
                    Value::Int64(i) => Some(*i),
                    _ => None,
                })
                .collect();
            Arc::new(Int64Array::from(arr))
        }
        DataType::Float64 => {
            let arr: Vec<Option<f64>> = values
                .iter()
                .map(|v| match v {
                    Value::Int64(_) | Value::Float64(_) => v.as_f64(),
                    _ => None,
                })
                .collect();
            Arc::new(Float64Array::from(arr))
        }
        DataType::Boolean => {
            let arr: Vec<Option<bool>> = values
                .iter()
                .map(|v| match v {
                    Value::Bool(b) => Some(*b),
                    _ => None,
                })
                .collect();
            Arc::new(BooleanArray::from(arr))
        }
        DataType::Date32 => {
            let arr: Vec<Option<i32>> = values
                .iter()
                .map(|v| match v {
                    Value::Date(d) => Some(date_to_days(*d)),
                    _ => None,
                })
                .collect();
            Arc::new(Date32Array::from(arr))
        }
        DataType::Timestamp(_, _) => {
            let arr: Vec<Option<i64>> = values
                .iter()
                .map(|v| match v {
                    Value::Date(d) => Some(d.and_time(chrono::NaiveTime::MIN).and_utc().timestamp_millis()),
                    Value::DateTime(dt) => Some(dt.and_utc().timestamp_millis()),
                    _ => None,
                })
                .collect();
            Arc::new(TimestampMillisecondArray::from(arr))
        }
        _ => {
            let arr: Vec<Option<String>> = values
                .iter()
                .map(|v| match v {
                    Value::Null => None,
                    other => Some(other.to_string()),
                })
                .collect();
            Arc::new(StringArray::from(arr))
        }
    }
}
