/// SQL Expression Evaluation
/// Row-at-a-time evaluation of bound filter/projection expressions with SQL
/// three-valued logic
use crate::storage::dataset::Dataset;
use crate::storage::value::{parse_date, parse_datetime, Value};
use anyhow::Result;
use chrono::{Datelike, NaiveDateTime, NaiveTime};
use regex::Regex;
use std::cmp::Ordering;

/// Bound SQL expression (column references are resolved to dataset indices)
#[derive(Clone, Debug)]
pub enum Expression {
    /// Column reference by position in the dataset
    Column(usize),
    /// Literal value
    Literal(Value),
    /// Binary operation (left op right)
    BinaryOp {
        left: Box<Expression>,
        op: BinaryOperator,
        right: Box<Expression>,
    },
    /// Unary operation (op expr)
    UnaryOp {
        op: UnaryOperator,
        expr: Box<Expression>,
    },
    /// Scalar function call
    Function {
        name: String,
        args: Vec<Expression>,
    },
    /// CASE expression
    Case {
        operand: Option<Box<Expression>>,
        conditions: Vec<(Expression, Expression)>, // (condition, result)
        else_result: Option<Box<Expression>>,
    },
    /// IN list
    In {
        expr: Box<Expression>,
        list: Vec<Expression>,
        negated: bool,
    },
    /// BETWEEN low AND high
    Between {
        expr: Box<Expression>,
        low: Box<Expression>,
        high: Box<Expression>,
        negated: bool,
    },
    /// LIKE / ILIKE; `compiled` is set when the pattern is a literal
    Like {
        expr: Box<Expression>,
        pattern: Box<Expression>,
        escape: Option<char>,
        negated: bool,
        compiled: Option<Regex>,
    },
    /// IS [NOT] NULL
    IsNull {
        expr: Box<Expression>,
        negated: bool,
    },
    /// IS TRUE / IS FALSE (never null)
    IsBool {
        expr: Box<Expression>,
        value: bool,
    },
    /// CAST expression
    Cast {
        expr: Box<Expression>,
        target: CastType,
    },
    /// EXTRACT(part FROM expr)
    Extract {
        part: DatePart,
        expr: Box<Expression>,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinaryOperator {
    // Arithmetic
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    // Comparison
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    // Logical
    And,
    Or,
    // String
    Concat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnaryOperator {
    Not,
    Negate,
    Plus,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CastType {
    Integer,
    Real,
    Text,
    Boolean,
    Date,
    DateTime,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DatePart {
    Year,
    Month,
    Day,
}

/// Evaluates expressions against rows of one dataset
pub struct ExpressionEvaluator<'a> {
    dataset: &'a Dataset,
}

impl<'a> ExpressionEvaluator<'a> {
    pub fn new(dataset: &'a Dataset) -> Self {
        Self { dataset }
    }

    /// Evaluate expression for a single row
    pub fn evaluate(&self, expr: &Expression, row_idx: usize) -> Result<Value> {
        match expr {
            Expression::Column(col_idx) => Ok(self.dataset.value(row_idx, *col_idx)),
            Expression::Literal(val) => Ok(val.clone()),
            Expression::BinaryOp { left, op, right } => {
                let left_val = self.evaluate(left, row_idx)?;
                // Short-circuit where the result is already decided
                if matches!(op, BinaryOperator::And | BinaryOperator::Or) {
                    match (op, truth(&left_val)?) {
                        (BinaryOperator::And, Some(false)) => return Ok(Value::Bool(false)),
                        (BinaryOperator::Or, Some(true)) => return Ok(Value::Bool(true)),
                        _ => {}
                    }
                }
                let right_val = self.evaluate(right, row_idx)?;
                evaluate_binary_op(*op, &left_val, &right_val)
            }
            Expression::UnaryOp { op, expr } => {
                let val = self.evaluate(expr, row_idx)?;
                evaluate_unary_op(*op, &val)
            }
            Expression::Function { name, args } => {
                let arg_values = args
                    .iter()
                    .map(|arg| self.evaluate(arg, row_idx))
                    .collect::<Result<Vec<Value>>>()?;
                evaluate_function(name, &arg_values)
            }
            Expression::Case { operand, conditions, else_result } => {
                let operand_val = operand
                    .as_ref()
                    .map(|e| self.evaluate(e, row_idx))
                    .transpose()?;
                for (condition, result) in conditions {
                    let cond_val = self.evaluate(condition, row_idx)?;
                    let matched = match &operand_val {
                        Some(op_val) => compare_values(op_val, &cond_val)? == Some(Ordering::Equal),
                        None => truth(&cond_val)? == Some(true),
                    };
                    if matched {
                        return self.evaluate(result, row_idx);
                    }
                }
                match else_result {
                    Some(e) => self.evaluate(e, row_idx),
                    None => Ok(Value::Null),
                }
            }
            Expression::In { expr, list, negated } => {
                let expr_val = self.evaluate(expr, row_idx)?;
                if expr_val.is_null() {
                    return Ok(Value::Null);
                }
                let mut saw_null = false;
                for item in list {
                    let item_val = self.evaluate(item, row_idx)?;
                    match compare_values(&expr_val, &item_val)? {
                        Some(Ordering::Equal) => return Ok(Value::Bool(!negated)),
                        None => saw_null = true,
                        Some(_) => {}
                    }
                }
                if saw_null {
                    Ok(Value::Null)
                } else {
                    Ok(Value::Bool(*negated))
                }
            }
            Expression::Between { expr, low, high, negated } => {
                let val = self.evaluate(expr, row_idx)?;
                let low_val = self.evaluate(low, row_idx)?;
                let high_val = self.evaluate(high, row_idx)?;
                let above_low = compare_values(&val, &low_val)?.map(|o| o != Ordering::Less);
                let below_high = compare_values(&val, &high_val)?.map(|o| o != Ordering::Greater);
                let inside = kleene_and(above_low, below_high);
                Ok(match inside {
                    Some(b) => Value::Bool(b != *negated),
                    None => Value::Null,
                })
            }
            Expression::Like { expr, pattern, escape, negated, compiled } => {
                let val = self.evaluate(expr, row_idx)?;
                if val.is_null() {
                    return Ok(Value::Null);
                }
                let text = val.to_string();
                let matched = match compiled {
                    Some(regex) => regex.is_match(&text),
                    None => {
                        let pattern_val = self.evaluate(pattern, row_idx)?;
                        if pattern_val.is_null() {
                            return Ok(Value::Null);
                        }
                        like_regex(&pattern_val.to_string(), *escape)?.is_match(&text)
                    }
                };
                Ok(Value::Bool(matched != *negated))
            }
            Expression::IsNull { expr, negated } => {
                let val = self.evaluate(expr, row_idx)?;
                Ok(Value::Bool(val.is_null() != *negated))
            }
            Expression::IsBool { expr, value } => {
                let val = self.evaluate(expr, row_idx)?;
                Ok(Value::Bool(truth(&val)? == Some(*value)))
            }
            Expression::Cast { expr, target } => {
                let val = self.evaluate(expr, row_idx)?;
                cast_value(&val, *target)
            }
            Expression::Extract { part, expr } => {
                let val = self.evaluate(expr, row_idx)?;
                extract_part(&val, *part)
            }
        }
    }

    /// Evaluate a WHERE predicate; only TRUE keeps the row
    pub fn matches(&self, predicate: &Expression, row_idx: usize) -> Result<bool> {
        let val = self.evaluate(predicate, row_idx)?;
        Ok(truth(&val)? == Some(true))
    }
}

/// SQL truthiness: NULL is unknown, numbers are true when non-zero
pub fn truth(val: &Value) -> Result<Option<bool>> {
    match val {
        Value::Null => Ok(None),
        Value::Bool(b) => Ok(Some(*b)),
        Value::Int64(i) => Ok(Some(*i != 0)),
        Value::Float64(f) => Ok(Some(*f != 0.0)),
        other => anyhow::bail!(
            "Type mismatch: expected a boolean condition, got {} '{}'",
            other.type_name(),
            other
        ),
    }
}

fn kleene_and(a: Option<bool>, b: Option<bool>) -> Option<bool> {
    match (a, b) {
        (Some(false), _) | (_, Some(false)) => Some(false),
        (Some(true), Some(true)) => Some(true),
        _ => None,
    }
}

fn kleene_or(a: Option<bool>, b: Option<bool>) -> Option<bool> {
    match (a, b) {
        (Some(true), _) | (_, Some(true)) => Some(true),
        (Some(false), Some(false)) => Some(false),
        _ => None,
    }
}

fn is_numeric(val: &Value) -> bool {
    matches!(val, Value::Int64(_) | Value::Float64(_) | Value::Bool(_))
}

fn as_datetime(val: &Value) -> Option<NaiveDateTime> {
    match val {
        Value::Date(d) => Some(d.and_time(NaiveTime::MIN)),
        Value::DateTime(dt) => Some(*dt),
        Value::String(s) => parse_datetime(s).or_else(|| parse_date(s).map(|d| d.and_time(NaiveTime::MIN))),
        _ => None,
    }
}

fn mismatch(left: &Value, right: &Value) -> anyhow::Error {
    anyhow::anyhow!(
        "Type mismatch: cannot compare {} '{}' with {} '{}'",
        left.type_name(),
        left,
        right.type_name(),
        right
    )
}

/// SQL comparison with the documented coercions; `None` when either side is NULL
pub fn compare_values(left: &Value, right: &Value) -> Result<Option<Ordering>> {
    match (left, right) {
        (Value::Null, _) | (_, Value::Null) => Ok(None),
        (Value::Int64(a), Value::Int64(b)) => Ok(Some(a.cmp(b))),
        (a, b) if is_numeric(a) && is_numeric(b) => {
            let (x, y) = (a.as_f64().unwrap_or(f64::NAN), b.as_f64().unwrap_or(f64::NAN));
            Ok(x.partial_cmp(&y))
        }
        (Value::String(a), Value::String(b)) => Ok(Some(a.cmp(b))),
        (Value::Date(a), Value::Date(b)) => Ok(Some(a.cmp(b))),
        (Value::Date(_) | Value::DateTime(_), Value::Date(_) | Value::DateTime(_) | Value::String(_))
        | (Value::String(_), Value::Date(_) | Value::DateTime(_)) => {
            match (as_datetime(left), as_datetime(right)) {
                (Some(a), Some(b)) => Ok(Some(a.cmp(&b))),
                _ => Err(mismatch(left, right)),
            }
        }
        (num, Value::String(s)) if is_numeric(num) => match s.trim().parse::<f64>() {
            Ok(parsed) => Ok(num.as_f64().and_then(|n| n.partial_cmp(&parsed))),
            Err(_) => Err(mismatch(left, right)),
        },
        (Value::String(s), num) if is_numeric(num) => match s.trim().parse::<f64>() {
            Ok(parsed) => Ok(num.as_f64().and_then(|n| parsed.partial_cmp(&n))),
            Err(_) => Err(mismatch(left, right)),
        },
        _ => Err(mismatch(left, right)),
    }
}

fn evaluate_binary_op(op: BinaryOperator, left: &Value, right: &Value) -> Result<Value> {
    match op {
        BinaryOperator::Add | BinaryOperator::Subtract | BinaryOperator::Multiply => {
            if left.is_null() || right.is_null() {
                return Ok(Value::Null);
            }
            match (left, right) {
                (Value::Int64(a), Value::Int64(b)) => {
                    let result = match op {
                        BinaryOperator::Add => a.checked_add(*b),
                        BinaryOperator::Subtract => a.checked_sub(*b),
                        _ => a.checked_mul(*b),
                    };
                    result
                        .map(Value::Int64)
                        .ok_or_else(|| anyhow::anyhow!("Integer overflow"))
                }
                (a, b) => {
                    let (x, y) = numeric_operands(a, b, op)?;
                    Ok(Value::Float64(match op {
                        BinaryOperator::Add => x + y,
                        BinaryOperator::Subtract => x - y,
                        _ => x * y,
                    }))
                }
            }
        }
        BinaryOperator::Divide => {
            if left.is_null() || right.is_null() {
                return Ok(Value::Null);
            }
            let (x, y) = numeric_operands(left, right, op)?;
            if y == 0.0 {
                anyhow::bail!("Division by zero")
            }
            Ok(Value::Float64(x / y))
        }
        BinaryOperator::Modulo => {
            if left.is_null() || right.is_null() {
                return Ok(Value::Null);
            }
            match (left, right) {
                (Value::Int64(a), Value::Int64(b)) => {
                    if *b == 0 {
                        anyhow::bail!("Modulo by zero")
                    }
                    a.checked_rem(*b)
                        .map(Value::Int64)
                        .ok_or_else(|| anyhow::anyhow!("Integer overflow"))
                }
                (a, b) => {
                    let (x, y) = numeric_operands(a, b, op)?;
                    if y == 0.0 {
                        anyhow::bail!("Modulo by zero")
                    }
                    Ok(Value::Float64(x % y))
                }
            }
        }
        BinaryOperator::Eq
        | BinaryOperator::Ne
        | BinaryOperator::Lt
        | BinaryOperator::Le
        | BinaryOperator::Gt
        | BinaryOperator::Ge => {
            let ordering = compare_values(left, right)?;
            Ok(match ordering {
                None => Value::Null,
                Some(o) => Value::Bool(match op {
                    BinaryOperator::Eq => o == Ordering::Equal,
                    BinaryOperator::Ne => o != Ordering::Equal,
                    BinaryOperator::Lt => o == Ordering::Less,
                    BinaryOperator::Le => o != Ordering::Greater,
                    BinaryOperator::Gt => o == Ordering::Greater,
                    _ => o != Ordering::Less,
                }),
            })
        }
        BinaryOperator::And => Ok(kleene_and(truth(left)?, truth(right)?)
            .map(Value::Bool)
            .unwrap_or(Value::Null)),
        BinaryOperator::Or => Ok(kleene_or(truth(left)?, truth(right)?)
            .map(Value::Bool)
            .unwrap_or(Value::Null)),
        BinaryOperator::Concat => {
            if left.is_null() || right.is_null() {
                return Ok(Value::Null);
            }
            Ok(Value::String(format!("{}{}", left, right)))
        }
    }
}

fn numeric_operands(left: &Value, right: &Value, op: BinaryOperator) -> Result<(f64, f64)> {
    let as_number = |v: &Value| match v {
        Value::String(s) => s.trim().parse::<f64>().ok(),
        other => other.as_f64(),
    };
    match (as_number(left), as_number(right)) {
        (Some(x), Some(y)) => Ok((x, y)),
        _ => anyhow::bail!(
            "Type mismatch: invalid operands for {:?}: {} '{}' and {} '{}'",
            op,
            left.type_name(),
            left,
            right.type_name(),
            right
        ),
    }
}

fn evaluate_unary_op(op: UnaryOperator, val: &Value) -> Result<Value> {
    match op {
        UnaryOperator::Not => Ok(truth(val)?.map(|b| Value::Bool(!b)).unwrap_or(Value::Null)),
        UnaryOperator::Negate => match val {
            Value::Int64(i) => i
                .checked_neg()
                .map(Value::Int64)
                .ok_or_else(|| anyhow::anyhow!("Integer overflow")),
            Value::Float64(f) => Ok(Value::Float64(-f)),
            Value::Null => Ok(Value::Null),
            other => anyhow::bail!("Cannot negate {} '{}'", other.type_name(), other),
        },
        UnaryOperator::Plus => Ok(val.clone()),
    }
}

/// Names the binder rejects: they would collapse rows instead of selecting them
pub const AGGREGATE_FUNCTIONS: &[&str] = &[
    "COUNT", "SUM", "AVG", "MIN", "MAX", "TOTAL", "GROUP_CONCAT", "STRING_AGG",
];

/// Scalar functions the evaluator knows, with their accepted argument counts
pub fn function_arity(name: &str) -> Option<(usize, usize)> {
    let arity = match name {
        "UPPER" | "LOWER" | "LENGTH" | "TRIM" | "LTRIM" | "RTRIM" | "ABS" | "DATE" | "YEAR"
        | "MONTH" | "DAY" => (1, 1),
        "SUBSTR" | "SUBSTRING" => (2, 3),
        "REPLACE" => (3, 3),
        "ROUND" => (1, 2),
        "COALESCE" => (1, usize::MAX),
        "IFNULL" | "NULLIF" | "INSTR" => (2, 2),
        _ => return None,
    };
    Some(arity)
}

fn text_arg<'v>(name: &str, val: &'v Value) -> Result<std::borrow::Cow<'v, str>> {
    match val {
        Value::String(s) => Ok(std::borrow::Cow::Borrowed(s.as_str())),
        Value::Null => anyhow::bail!("{} received NULL", name),
        other => Ok(std::borrow::Cow::Owned(other.to_string())),
    }
}

fn int_arg(name: &str, val: &Value) -> Result<i64> {
    match val {
        Value::Int64(i) => Ok(*i),
        Value::Float64(f) if f.fract() == 0.0 => Ok(*f as i64),
        other => anyhow::bail!("{} expects an integer argument, got {} '{}'", name, other.type_name(), other),
    }
}

/// Character window `(skip, take)` for SUBSTR with SQLite position rules
///
/// Positions are 1-based; a negative start counts from the end and a
/// negative length takes the characters before the start.
fn substr_window(char_count: i64, start: i64, len: Option<i64>) -> (usize, usize) {
    let mut p1 = start;
    let mut p2 = len.map(i64::saturating_abs).unwrap_or(i64::MAX);
    if p1 < 0 {
        p1 = p1.saturating_add(char_count);
        if p1 < 0 {
            p2 = p2.saturating_add(p1).max(0);
            p1 = 0;
        }
    } else if p1 > 0 {
        p1 -= 1;
    } else if p2 > 0 {
        p2 -= 1;
    }
    if len.is_some_and(|l| l < 0) {
        p1 = p1.saturating_sub(p2);
        if p1 < 0 {
            p2 = p2.saturating_add(p1);
            p1 = 0;
        }
    }
    if p1.saturating_add(p2) > char_count {
        p2 = (char_count - p1).max(0);
    }
    (
        usize::try_from(p1).unwrap_or(usize::MAX),
        usize::try_from(p2).unwrap_or(0),
    )
}

fn evaluate_function(name: &str, args: &[Value]) -> Result<Value> {
    // NULL in -> NULL out, except for the null-handling functions
    if !matches!(name, "COALESCE" | "IFNULL" | "NULLIF") && args.iter().any(Value::is_null) {
        return Ok(Value::Null);
    }

    match name {
        "UPPER" => Ok(Value::String(text_arg(name, &args[0])?.to_uppercase())),
        "LOWER" => Ok(Value::String(text_arg(name, &args[0])?.to_lowercase())),
        "LENGTH" => Ok(Value::Int64(text_arg(name, &args[0])?.chars().count() as i64)),
        "TRIM" => Ok(Value::String(text_arg(name, &args[0])?.trim().to_string())),
        "LTRIM" => Ok(Value::String(text_arg(name, &args[0])?.trim_start().to_string())),
        "RTRIM" => Ok(Value::String(text_arg(name, &args[0])?.trim_end().to_string())),
        "SUBSTR" | "SUBSTRING" => {
            let text = text_arg(name, &args[0])?;
            let start = int_arg(name, &args[1])?;
            let len = args.get(2).map(|len| int_arg(name, len)).transpose()?;
            let (skip, take) = substr_window(text.chars().count() as i64, start, len);
            Ok(Value::String(text.chars().skip(skip).take(take).collect()))
        }
        "REPLACE" => {
            let text = text_arg(name, &args[0])?;
            let from = text_arg(name, &args[1])?;
            let to = text_arg(name, &args[2])?;
            if from.is_empty() {
                return Ok(Value::String(text.into_owned()));
            }
            Ok(Value::String(text.replace(from.as_ref(), to.as_ref())))
        }
        "INSTR" => {
            let text = text_arg(name, &args[0])?;
            let needle = text_arg(name, &args[1])?;
            let position = text
                .find(needle.as_ref())
                .map(|byte_idx| text[..byte_idx].chars().count() as i64 + 1)
                .unwrap_or(0);
            Ok(Value::Int64(position))
        }
        "ABS" => match &args[0] {
            Value::Int64(i) => i
                .checked_abs()
                .map(Value::Int64)
                .ok_or_else(|| anyhow::anyhow!("Integer overflow")),
            Value::Float64(f) => Ok(Value::Float64(f.abs())),
            other => anyhow::bail!("ABS expects a number, got {} '{}'", other.type_name(), other),
        },
        "ROUND" => {
            let digits = match args.get(1) {
                Some(d) => int_arg(name, d)?,
                None => 0,
            };
            let x = args[0]
                .as_f64()
                .ok_or_else(|| anyhow::anyhow!("ROUND expects a number, got {} '{}'", args[0].type_name(), args[0]))?;
            let factor = 10f64.powi(i32::try_from(digits).unwrap_or(0));
            Ok(Value::Float64((x * factor).round() / factor))
        }
        "COALESCE" | "IFNULL" => Ok(args.iter().find(|v| !v.is_null()).cloned().unwrap_or(Value::Null)),
        "NULLIF" => {
            if compare_values(&args[0], &args[1])? == Some(Ordering::Equal) {
                Ok(Value::Null)
            } else {
                Ok(args[0].clone())
            }
        }
        "DATE" => cast_value(&args[0], CastType::Date),
        "YEAR" => extract_part(&args[0], DatePart::Year),
        "MONTH" => extract_part(&args[0], DatePart::Month),
        "DAY" => extract_part(&args[0], DatePart::Day),
        _ => anyhow::bail!("Unknown function: {}", name),
    }
}

fn extract_part(val: &Value, part: DatePart) -> Result<Value> {
    if val.is_null() {
        return Ok(Value::Null);
    }
    let dt = as_datetime(val).ok_or_else(|| {
        anyhow::anyhow!("Cannot extract {:?} from {} '{}'", part, val.type_name(), val)
    })?;
    let n = match part {
        DatePart::Year => dt.year() as i64,
        DatePart::Month => dt.month() as i64,
        DatePart::Day => dt.day() as i64,
    };
    Ok(Value::Int64(n))
}

pub fn cast_value(val: &Value, target: CastType) -> Result<Value> {
    if val.is_null() {
        return Ok(Value::Null);
    }
    let fail = || anyhow::anyhow!("Cannot cast {} '{}' to {:?}", val.type_name(), val, target);

    match target {
        CastType::Integer => match val {
            Value::Int64(i) => Ok(Value::Int64(*i)),
            Value::Float64(f) => Ok(Value::Int64(f.trunc() as i64)),
            Value::Bool(b) => Ok(Value::Int64(*b as i64)),
            Value::String(s) => {
                let s = s.trim();
                s.parse::<i64>()
                    .map(Value::Int64)
                    .or_else(|_| s.parse::<f64>().map(|f| Value::Int64(f.trunc() as i64)))
                    .map_err(|_| fail())
            }
            _ => Err(fail()),
        },
        CastType::Real => match val {
            Value::String(s) => s.trim().parse::<f64>().map(Value::Float64).map_err(|_| fail()),
            other => other.as_f64().map(Value::Float64).ok_or_else(fail),
        },
        CastType::Text => Ok(Value::String(val.to_string())),
        CastType::Boolean => match val {
            Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "t" | "yes" | "1" => Ok(Value::Bool(true)),
                "false" | "f" | "no" | "0" => Ok(Value::Bool(false)),
                _ => Err(fail()),
            },
            other => truth(other)?.map(Value::Bool).ok_or_else(fail),
        },
        CastType::Date => match val {
            Value::Date(d) => Ok(Value::Date(*d)),
            Value::DateTime(dt) => Ok(Value::Date(dt.date())),
            Value::String(s) => parse_date(s)
                .or_else(|| parse_datetime(s).map(|dt| dt.date()))
                .map(Value::Date)
                .ok_or_else(fail),
            _ => Err(fail()),
        },
        CastType::DateTime => as_datetime(val).map(Value::DateTime).ok_or_else(fail),
    }
}

/// Translate a SQL LIKE pattern into an anchored, case-insensitive regex
pub fn like_regex(pattern: &str, escape: Option<char>) -> Result<Regex> {
    let mut out = String::from("(?is)^");
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        if Some(c) == escape {
            match chars.next() {
                Some(literal) => out.push_str(&regex::escape(&literal.to_string())),
                None => anyhow::bail!("LIKE pattern ends with the escape character"),
            }
            continue;
        }
        match c {
            '%' => out.push_str(".*"),
            '_' => out.push('.'),
            other => out.push_str(&regex::escape(&other.to_string())),
        }
    }
    out.push('$');
    Ok(Regex::new(&out)?)
}
